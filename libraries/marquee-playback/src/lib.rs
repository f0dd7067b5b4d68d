//! Marquee - Playback
//!
//! The looping, crossfading playlist behind a kiosk's background audio.
//!
//! This crate provides:
//! - [`AudioEngine`]: init, play, stop, update, destroy, volume and mute
//! - [`BufferCache`]: fetch-and-decode once per track URL
//! - [`PlaylistSequencer`]: ordered or shuffled traversal, reshuffled on wrap
//! - [`HttpFetcher`]: HTTP(S) and filesystem track sources
//! - Broadcast [`PlaybackEvent`]s for front-ends
//!
//! # Architecture
//!
//! Rendering lives in `marquee-audio`; this crate only schedules. Every
//! track change is a pair of gain ramps on the audio clock plus a tokio
//! timer for the next step, so the render path never waits on the
//! scheduler.
//!
//! # Example
//!
//! ```rust,no_run
//! use marquee_audio::OutputKind;
//! use marquee_core::{AudioConfig, Track};
//! use marquee_playback::{AudioEngine, HttpFetcher};
//! use std::sync::Arc;
//!
//! # async fn run() {
//! let config = AudioConfig {
//!     tracks: vec![Track::new("Lobby", "https://cdn.example.com/lobby.mp3")],
//!     ..AudioConfig::default()
//! };
//! let engine = AudioEngine::new(config, Arc::new(HttpFetcher::new()), OutputKind::default());
//!
//! engine.init().await;
//! engine.play().await;
//! engine.set_volume(0.5);
//! # }
//! ```

mod cache;
mod engine;
mod error;
mod events;
mod fetch;
mod playlist;
mod slots;
mod volume;

// Public exports
pub use cache::{BufferCache, PreloadReport};
pub use engine::AudioEngine;
pub use error::{PlaybackError, Result};
pub use events::{PlaybackEvent, PlaybackPhase, EVENT_CHANNEL_CAPACITY};
pub use fetch::{FetchTarget, HttpFetcher};
pub use playlist::{shuffled_order, PlaylistSequencer, RandomSource, ScriptedRandom, StdRandom};
pub use volume::{VolumeControl, MUTE_RAMP, VOLUME_RAMP, VOLUME_STEP};
