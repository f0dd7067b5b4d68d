/// Track decoding using Symphonia
use crate::buffer::{DecodedBuffer, MIX_CHANNELS};
use crate::error::{AudioError, Result};
use crate::resampler::{resample_stereo, ResamplingQuality};
use marquee_core::SampleRate;
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, trace};

/// ITU-R BS.775 coefficient for center and surround channels (-3 dB)
const SURROUND_MIX: f32 = 0.707;

/// Decodes whole tracks into [`DecodedBuffer`]s at a fixed target rate
///
/// Supports whatever Symphonia's default registry supports (MP3, FLAC,
/// OGG/Vorbis, WAV, AAC, ...).
#[derive(Debug, Clone, Copy)]
pub struct TrackDecoder {
    target_rate: SampleRate,
    quality: ResamplingQuality,
}

impl TrackDecoder {
    pub fn new(target_rate: SampleRate) -> Self {
        Self {
            target_rate,
            quality: ResamplingQuality::default(),
        }
    }

    #[must_use]
    pub fn with_quality(mut self, quality: ResamplingQuality) -> Self {
        self.quality = quality;
        self
    }

    pub fn target_rate(&self) -> SampleRate {
        self.target_rate
    }

    /// Decode an in-memory file
    ///
    /// `extension` (e.g. `"mp3"`) helps the prober pick a format; it is
    /// only a hint. Blocking and CPU-bound: call from `spawn_blocking`.
    ///
    /// # Errors
    /// Fails when the container or codec is unsupported, when the stream
    /// has no audio track, or when it decodes to zero frames.
    pub fn decode(&self, bytes: Vec<u8>, extension: Option<&str>) -> Result<DecodedBuffer> {
        let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = extension {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe().format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )?;
        let mut format = probed.format;

        let track = format
            .default_track()
            .ok_or_else(|| AudioError::DecodeError("no audio track found".to_string()))?;
        let track_id = track.id;
        let mut source_rate = track.codec_params.sample_rate.unwrap_or(0);

        let mut decoder =
            symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

        let mut stereo = Vec::new();
        let mut scratch: Option<SampleBuffer<f32>> = None;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(e.into()),
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(msg)) => {
                    // Corrupt frame; skip it and keep going
                    trace!(error = msg, "skipping undecodable packet");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let spec = *decoded.spec();
            source_rate = spec.rate;
            let channels = spec.channels.count();

            let needed = decoded.capacity() * channels;
            if scratch.as_ref().map_or(true, |buf| buf.capacity() < needed) {
                scratch = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
            }
            let Some(buf) = scratch.as_mut() else {
                continue;
            };
            buf.copy_interleaved_ref(decoded);

            downmix_to_stereo(buf.samples(), channels, &mut stereo);
        }

        if stereo.is_empty() {
            return Err(AudioError::DecodeError("stream decoded to no audio".to_string()));
        }
        if source_rate == 0 {
            return Err(AudioError::UnsupportedFormat("unknown sample rate".to_string()));
        }

        let target = self.target_rate.as_hz();
        let samples = if source_rate == target {
            stereo
        } else {
            debug!(from = source_rate, to = target, "resampling decoded track");
            resample_stereo(&stereo, source_rate, target, self.quality)?
        };

        Ok(DecodedBuffer::new(samples, self.target_rate))
    }
}

/// File extension of a URL or path, ignoring any query or fragment
pub fn extension_hint(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let file = path.rsplit('/').next().unwrap_or(path);
    let (stem, ext) = file.rsplit_once('.')?;
    (!stem.is_empty() && !ext.is_empty()).then_some(ext)
}

/// Append interleaved `channels`-wide samples to `out` as interleaved stereo
///
/// Mono is duplicated, stereo passes through, and wider layouts are folded
/// down with BS.775 coefficients:
/// - `L = FL + 0.707*C + 0.707*SL`
/// - `R = FR + 0.707*C + 0.707*SR`
///
/// The LFE channel of 5.1+ layouts is dropped.
fn downmix_to_stereo(input: &[f32], channels: usize, out: &mut Vec<f32>) {
    if channels == 0 {
        return;
    }
    out.reserve(input.len() / channels * MIX_CHANNELS);

    for frame in input.chunks_exact(channels) {
        let (l, r) = match *frame {
            [mono] => (mono, mono),
            [l, r] => (l, r),
            [l, r, c] => (l + c * SURROUND_MIX, r + c * SURROUND_MIX),
            [l, r, sl, sr] => (l + sl * SURROUND_MIX, r + sr * SURROUND_MIX),
            [l, r, c, sl, sr] => (
                l + (c + sl) * SURROUND_MIX,
                r + (c + sr) * SURROUND_MIX,
            ),
            // FL FR C LFE SL SR [...]
            [l, r, c, _lfe, sl, sr, ..] => (
                l + (c + sl) * SURROUND_MIX,
                r + (c + sr) * SURROUND_MIX,
            ),
            [] => continue,
        };
        out.push(l.clamp(-1.0, 1.0));
        out.push(r.clamp(-1.0, 1.0));
    }
}
