/// Domain types for Marquee
mod audio;
mod config;
mod track;

pub use audio::{AudioFormat, SampleRate};
pub use config::{clamp_volume, AudioConfig};
pub use track::Track;
