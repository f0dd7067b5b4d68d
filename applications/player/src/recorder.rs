/// WAV recorder for the engine's export tap
use crate::error::{PlayerError, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use marquee_audio::TapStream;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use tracing::{debug, info};

/// Writes tap blocks to a 32-bit float WAV file on a dedicated thread
///
/// The thread runs until the tap disconnects (the engine detached it or
/// was destroyed), then finalizes the file.
pub struct Recorder {
    path: PathBuf,
    thread: JoinHandle<Result<u64>>,
}

impl Recorder {
    /// Create `path` and start writing `tap` into it
    pub fn start(path: &Path, tap: TapStream) -> Result<Self> {
        let format = tap.format();
        let spec = WavSpec {
            channels: format.channels,
            sample_rate: format.sample_rate.as_hz(),
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let writer = WavWriter::create(path, spec)?;
        let channels = u64::from(format.channels.max(1));

        let thread = std::thread::Builder::new()
            .name("marquee-recorder".to_string())
            .spawn(move || write_blocks(writer, tap, channels))?;

        info!(path = %path.display(), "recording started");
        Ok(Self {
            path: path.to_path_buf(),
            thread,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait for the writer to finish; returns the number of frames written
    ///
    /// Call after the tap has been detached, or this blocks until it is.
    pub fn finish(self) -> Result<u64> {
        let frames = self
            .thread
            .join()
            .map_err(|_| PlayerError::Recorder("recorder thread panicked".to_string()))??;
        info!(path = %self.path.display(), frames, "recording finished");
        Ok(frames)
    }
}

fn write_blocks(
    mut writer: WavWriter<BufWriter<File>>,
    tap: TapStream,
    channels: u64,
) -> Result<u64> {
    let mut samples = 0u64;
    for block in tap.into_receiver() {
        for sample in &block {
            writer.write_sample(*sample)?;
        }
        samples += block.len() as u64;
    }
    writer.finalize()?;
    debug!(samples, "tap disconnected, recorder finalized");
    Ok(samples / channels)
}
