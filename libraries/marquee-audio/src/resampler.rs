/// Whole-buffer sample rate conversion
use crate::buffer::MIX_CHANNELS;
use crate::error::{AudioError, Result};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

/// Resampling quality preset
///
/// Tracks are converted once at load time, so the cost is paid off the
/// render path. `Balanced` is plenty for kiosk speakers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResamplingQuality {
    /// 64 taps, 0.90 cutoff
    Fast,
    /// 128 taps, 0.95 cutoff
    #[default]
    Balanced,
    /// 256 taps, 0.99 cutoff
    High,
}

impl ResamplingQuality {
    /// Sinc filter length
    pub fn sinc_len(&self) -> usize {
        match self {
            Self::Fast => 64,
            Self::Balanced => 128,
            Self::High => 256,
        }
    }

    /// Frequency cutoff (relative to Nyquist)
    pub fn f_cutoff(&self) -> f32 {
        match self {
            Self::Fast => 0.90,
            Self::Balanced => 0.95,
            Self::High => 0.99,
        }
    }

    pub fn oversampling_factor(&self) -> usize {
        match self {
            Self::Fast => 128,
            Self::Balanced => 256,
            Self::High => 512,
        }
    }

    fn interpolation(&self) -> SincInterpolationType {
        match self {
            Self::Fast => SincInterpolationType::Linear,
            _ => SincInterpolationType::Cubic,
        }
    }
}

/// Convert interleaved stereo from `source_rate` to `target_rate`
///
/// The whole buffer goes through a single `SincFixedIn` pass.
pub fn resample_stereo(
    samples: &[f32],
    source_rate: u32,
    target_rate: u32,
    quality: ResamplingQuality,
) -> Result<Vec<f32>> {
    if source_rate == 0 || target_rate == 0 {
        return Err(AudioError::ResampleError(format!(
            "invalid rates {source_rate} -> {target_rate}"
        )));
    }

    let frames = samples.len() / MIX_CHANNELS;
    if source_rate == target_rate || frames == 0 {
        return Ok(samples[..frames * MIX_CHANNELS].to_vec());
    }

    let params = SincInterpolationParameters {
        sinc_len: quality.sinc_len(),
        f_cutoff: quality.f_cutoff(),
        interpolation: quality.interpolation(),
        oversampling_factor: quality.oversampling_factor(),
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(
        f64::from(target_rate) / f64::from(source_rate),
        2.0,
        params,
        frames,
        MIX_CHANNELS,
    )
    .map_err(|e| AudioError::ResampleError(e.to_string()))?;

    let mut planes = vec![Vec::with_capacity(frames); MIX_CHANNELS];
    for frame in samples.chunks_exact(MIX_CHANNELS) {
        for (plane, sample) in planes.iter_mut().zip(frame) {
            plane.push(*sample);
        }
    }

    let resampled = resampler
        .process(&planes, None)
        .map_err(|e| AudioError::ResampleError(e.to_string()))?;

    let out_frames = resampled.first().map_or(0, Vec::len);
    let mut interleaved = Vec::with_capacity(out_frames * MIX_CHANNELS);
    for i in 0..out_frames {
        for plane in &resampled {
            interleaved.push(plane[i]);
        }
    }

    Ok(interleaved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_rate_is_passthrough() {
        let input = vec![0.1, -0.1, 0.2, -0.2];
        let out = resample_stereo(&input, 44_100, 44_100, ResamplingQuality::Fast).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn upsampling_scales_length() {
        let frames = 8_000;
        let input: Vec<f32> = (0..frames)
            .flat_map(|i| {
                let s = (i as f32 * 0.05).sin() * 0.5;
                [s, s]
            })
            .collect();

        let out = resample_stereo(&input, 8_000, 16_000, ResamplingQuality::Fast).unwrap();
        let out_frames = out.len() / 2;

        // Roughly double, allowing for filter delay at the edges
        assert!(out_frames > frames * 19 / 10, "got {out_frames} frames");
        assert!(out_frames <= frames * 2 + 1, "got {out_frames} frames");
    }

    #[test]
    fn zero_rate_is_rejected() {
        assert!(resample_stereo(&[0.0, 0.0], 0, 48_000, ResamplingQuality::Fast).is_err());
    }
}
