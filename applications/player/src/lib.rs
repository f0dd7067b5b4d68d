//! Marquee Player - headless kiosk shell
//!
//! Hosts an [`AudioEngine`](marquee_playback::AudioEngine) for real
//! deployments: configuration from file and environment, operator commands
//! on stdin, and optional WAV recording of the mix.

pub mod commands;
pub mod config;
pub mod error;
pub mod recorder;

pub use commands::Command;
pub use config::PlayerConfig;
pub use error::{PlayerError, Result};
pub use recorder::Recorder;
