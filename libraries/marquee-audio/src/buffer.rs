/// Decoded, ready-to-mix audio
use marquee_core::{AudioFormat, SampleRate};
use std::time::Duration;

/// Channel count of every buffer and of the mix bus
pub const MIX_CHANNELS: usize = 2;

/// A fully decoded track: interleaved stereo `f32` at the context rate
///
/// Buffers are immutable once built and shared behind `Arc` between the
/// cache and any voices playing them.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBuffer {
    samples: Vec<f32>,
    sample_rate: SampleRate,
}

impl DecodedBuffer {
    /// Wrap interleaved stereo samples
    ///
    /// A trailing half frame is dropped.
    pub fn new(mut samples: Vec<f32>, sample_rate: SampleRate) -> Self {
        let whole = samples.len() - samples.len() % MIX_CHANNELS;
        samples.truncate(whole);
        Self {
            samples,
            sample_rate,
        }
    }

    /// Interleaved samples
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Number of stereo frames
    pub fn frames(&self) -> usize {
        self.samples.len() / MIX_CHANNELS
    }

    pub fn sample_rate(&self) -> SampleRate {
        self.sample_rate
    }

    pub fn format(&self) -> AudioFormat {
        AudioFormat::stereo(self.sample_rate)
    }

    /// Playing time in seconds
    pub fn duration_secs(&self) -> f64 {
        self.sample_rate.seconds_for(self.frames() as u64)
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.duration_secs())
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// The stereo frame at `index`, if any
    pub fn frame(&self, index: usize) -> Option<(f32, f32)> {
        let base = index.checked_mul(MIX_CHANNELS)?;
        match self.samples.get(base..base + MIX_CHANNELS) {
            Some([l, r]) => Some((*l, *r)),
            _ => None,
        }
    }
}
