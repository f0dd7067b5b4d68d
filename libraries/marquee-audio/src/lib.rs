//! Marquee Audio
//!
//! Everything between encoded track bytes and the speaker:
//!
//! - Decoding via Symphonia into stereo [`DecodedBuffer`]s, resampled with
//!   rubato to the output rate
//! - [`GainAutomation`]: set-points and linear ramps on the audio clock
//! - A mix graph of voices feeding one master bus, with recording taps
//! - Destinations: a CPAL device, or a headless sink clocked by tokio
//!
//! # Example
//!
//! ```no_run
//! use marquee_audio::{AudioContext, OutputKind, DEFAULT_TAP_CAPACITY};
//! use std::sync::Arc;
//!
//! # fn example(bytes: Vec<u8>) -> Result<(), Box<dyn std::error::Error>> {
//! let ctx = AudioContext::open(&OutputKind::default())?;
//! let buffer = Arc::new(ctx.decoder().decode(bytes, Some("mp3"))?);
//!
//! // Fade in over two seconds
//! let voice = ctx.start_voice(buffer, 0.0);
//! voice.gain().fade(0.0, 0.8, ctx.current_time(), 2.0);
//!
//! // Record what comes out
//! let tap = ctx.attach_tap(DEFAULT_TAP_CAPACITY);
//! # let _ = tap;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod buffer;
mod context;
mod decoder;
mod error;
mod graph;
pub mod output;
mod param;
mod resampler;
mod tap;
mod voice;

pub use buffer::{DecodedBuffer, MIX_CHANNELS};
pub use context::AudioContext;
pub use decoder::{extension_hint, TrackDecoder};
pub use error::{AudioError, Result};
pub use graph::{FrameClock, MixGraph, SharedGraph};
pub use output::{list_output_devices, AudioDestination, OutputKind};
pub use param::{GainAutomation, GainEvent, GainHandle};
pub use resampler::{resample_stereo, ResamplingQuality};
pub use tap::{TapId, TapStream, DEFAULT_TAP_CAPACITY};
pub use voice::{VoiceHandle, VoiceId};
