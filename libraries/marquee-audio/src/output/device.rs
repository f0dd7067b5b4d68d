/// CPAL device destination (audio thread + command channel)
use super::AudioDestination;
use crate::buffer::MIX_CHANNELS;
use crate::error::{AudioError, Result};
use crate::graph::{lock_graph, SharedGraph};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, SizedSample, Stream, StreamConfig, SupportedStreamConfig};
use crossbeam_channel::{bounded, Receiver, Sender};
use marquee_core::SampleRate;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info};

/// Commands sent to the audio thread
enum DestinationCommand {
    Shutdown,
}

/// Names of the host's output devices
pub fn list_output_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    Ok(host
        .output_devices()?
        .filter_map(|device| device.name().ok())
        .collect())
}

/// Plays the mix bus on a system output device
///
/// **Architecture**: a dedicated audio thread owns the CPAL `Stream`, which
/// is not `Send` on every platform. The destination talks to that thread
/// over a channel.
pub struct CpalDestination {
    device: Option<Device>,
    config: SupportedStreamConfig,
    name: String,
    command_tx: Option<Sender<DestinationCommand>>,
    audio_thread: Option<JoinHandle<()>>,
}

impl CpalDestination {
    /// Select an output device by name, or the host default for `None`
    ///
    /// # Errors
    /// Returns `DeviceNotFound` if no matching device exists.
    pub fn open(name: Option<&str>) -> Result<Self> {
        let host = cpal::default_host();
        let device = match name {
            None => host
                .default_output_device()
                .ok_or_else(|| AudioError::DeviceNotFound("default output".to_string()))?,
            Some(wanted) => host
                .output_devices()?
                .find(|device| device.name().is_ok_and(|n| n == wanted))
                .ok_or_else(|| AudioError::DeviceNotFound(wanted.to_string()))?,
        };

        let config = device.default_output_config()?;
        let name = device.name().unwrap_or_else(|_| "unknown device".to_string());
        debug!(
            device = %name,
            sample_rate = config.sample_rate().0,
            channels = config.channels(),
            format = ?config.sample_format(),
            "selected output device"
        );

        Ok(Self {
            device: Some(device),
            config,
            name,
            command_tx: None,
            audio_thread: None,
        })
    }

    /// Audio thread main loop
    ///
    /// Builds and owns the stream, reports whether that worked, then parks
    /// on the command channel until told to shut down.
    fn audio_thread_run(
        device: Device,
        config: SupportedStreamConfig,
        graph: SharedGraph,
        command_rx: Receiver<DestinationCommand>,
        ready_tx: Sender<Result<()>>,
    ) {
        let stream = match build_stream(&device, &config, graph) {
            Ok(stream) => stream,
            Err(e) => {
                let _ = ready_tx.send(Err(e));
                return;
            }
        };
        if let Err(e) = stream.play() {
            let _ = ready_tx.send(Err(e.into()));
            return;
        }
        let _ = ready_tx.send(Ok(()));

        // Park until shutdown is requested or the destination goes away
        let _ = command_rx.recv();
        drop(stream);
    }
}

impl AudioDestination for CpalDestination {
    fn name(&self) -> &str {
        &self.name
    }

    fn sample_rate(&self) -> SampleRate {
        SampleRate::new(self.config.sample_rate().0)
    }

    fn start(&mut self, graph: SharedGraph) -> Result<()> {
        let device = self
            .device
            .take()
            .ok_or_else(|| AudioError::DeviceError("destination already started".to_string()))?;
        let config = self.config.clone();

        let (command_tx, command_rx) = bounded::<DestinationCommand>(8);
        let (ready_tx, ready_rx) = bounded::<Result<()>>(1);

        let audio_thread = thread::Builder::new()
            .name("marquee-audio".to_string())
            .spawn(move || Self::audio_thread_run(device, config, graph, command_rx, ready_tx))
            .map_err(|e| AudioError::DeviceError(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!(device = %self.name, "output stream started");
                self.command_tx = Some(command_tx);
                self.audio_thread = Some(audio_thread);
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = audio_thread.join();
                Err(e)
            }
            Err(_) => Err(AudioError::DeviceError(
                "audio thread exited before starting".to_string(),
            )),
        }
    }

    fn close(&mut self) {
        if let Some(tx) = self.command_tx.take() {
            let _ = tx.send(DestinationCommand::Shutdown);
        }
        if let Some(handle) = self.audio_thread.take() {
            let _ = handle.join();
            debug!(device = %self.name, "output stream closed");
        }
    }
}

impl Drop for CpalDestination {
    fn drop(&mut self) {
        self.close();
    }
}

fn build_stream(
    device: &Device,
    supported: &SupportedStreamConfig,
    graph: SharedGraph,
) -> Result<Stream> {
    let config = supported.config();
    match supported.sample_format() {
        SampleFormat::F32 => build_typed_stream::<f32>(device, &config, graph),
        SampleFormat::F64 => build_typed_stream::<f64>(device, &config, graph),
        SampleFormat::I16 => build_typed_stream::<i16>(device, &config, graph),
        SampleFormat::I32 => build_typed_stream::<i32>(device, &config, graph),
        SampleFormat::U16 => build_typed_stream::<u16>(device, &config, graph),
        other => Err(AudioError::UnsupportedFormat(format!(
            "device sample format {other:?}"
        ))),
    }
}

fn build_typed_stream<T>(device: &Device, config: &StreamConfig, graph: SharedGraph) -> Result<Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = usize::from(config.channels).max(1);
    let mut scratch: Vec<f32> = Vec::new();

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let frames = data.len() / channels;
            scratch.resize(frames * MIX_CHANNELS, 0.0);
            lock_graph(&graph).render(&mut scratch);
            write_device_frames(data, channels, &scratch);
        },
        |err| error!(error = %err, "output stream error"),
        None,
    )?;

    Ok(stream)
}

/// Map stereo frames onto the device's channel layout
///
/// Mono devices get the average; channels beyond the first two are silent.
fn write_device_frames<T>(out: &mut [T], channels: usize, stereo: &[f32])
where
    T: SizedSample + FromSample<f32>,
{
    for (frame, src) in out
        .chunks_exact_mut(channels)
        .zip(stereo.chunks_exact(MIX_CHANNELS))
    {
        if let [mono] = frame {
            *mono = T::from_sample((src[0] + src[1]) * 0.5);
            continue;
        }
        for (i, sample) in frame.iter_mut().enumerate() {
            *sample = T::from_sample(src.get(i).copied().unwrap_or(0.0));
        }
    }
}
