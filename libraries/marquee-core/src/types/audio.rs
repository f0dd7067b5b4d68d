/// Audio-related types
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Sample rate in Hz
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SampleRate(pub u32);

impl SampleRate {
    /// Common sample rates
    pub const CD_QUALITY: Self = Self(44_100);
    pub const DVD_QUALITY: Self = Self(48_000);

    /// Create a new sample rate
    #[must_use]
    pub fn new(hz: u32) -> Self {
        Self(hz)
    }

    /// Get the sample rate as Hz
    pub fn as_hz(&self) -> u32 {
        self.0
    }

    /// Number of frames covering `duration` (rounded down)
    pub fn frames_in(&self, duration: Duration) -> u64 {
        (duration.as_secs_f64() * f64::from(self.0)) as u64
    }

    /// Time covered by `frames` frames, in seconds
    pub fn seconds_for(&self, frames: u64) -> f64 {
        if self.0 == 0 {
            return 0.0;
        }
        frames as f64 / f64::from(self.0)
    }
}

impl Default for SampleRate {
    fn default() -> Self {
        Self::DVD_QUALITY
    }
}

/// Interleaved PCM stream layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    /// Sample rate
    pub sample_rate: SampleRate,

    /// Number of channels (1 = mono, 2 = stereo, etc.)
    pub channels: u16,
}

impl AudioFormat {
    /// Create a new audio format
    pub fn new(sample_rate: SampleRate, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// Stereo at the given rate, the layout the mix bus works in
    pub fn stereo(sample_rate: SampleRate) -> Self {
        Self::new(sample_rate, 2)
    }
}
