//! Marquee Core
//!
//! Platform-agnostic core types, traits, and error handling for Marquee, the audio
//! layer of an unattended kiosk display.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Domain Types**: `Track`, `AudioConfig`, `SampleRate`, `AudioFormat`
//! - **Core Traits**: `TrackFetcher` (raw track bytes from a URL)
//! - **Error Handling**: Unified `MarqueeError` and `Result` types
//!
//! # Example
//!
//! ```rust
//! use marquee_core::{AudioConfig, Track};
//!
//! let config = AudioConfig {
//!     tracks: vec![
//!         Track::new("Morning", "/audio/morning.mp3"),
//!         Track::new("Noon", "/audio/noon.mp3"),
//!     ],
//!     volume: 0.8,
//!     crossfade_duration_s: 3.0,
//!     ..AudioConfig::default()
//! };
//!
//! assert_eq!(config.tracks.len(), 2);
//! assert_eq!(config.crossfade_duration().as_secs(), 3);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use error::{MarqueeError, Result};
pub use traits::TrackFetcher;
pub use types::{clamp_volume, AudioConfig, AudioFormat, SampleRate, Track};
