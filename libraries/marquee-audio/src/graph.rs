//! The mix graph: voices -> master gain -> destination (+ taps)
//!
//! The graph is shared between control code and whichever thread renders
//! it. Rendering is the only thing that advances the audio clock.

use crate::buffer::{DecodedBuffer, MIX_CHANNELS};
use crate::param::GainHandle;
use crate::tap::TapId;
use crate::voice::{VoiceFlags, VoiceId};
use crossbeam_channel::{Sender, TrySendError};
use marquee_core::SampleRate;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::UnboundedSender;
use tracing::trace;

/// Frames rendered so far; the audio clock
#[derive(Debug, Clone)]
pub struct FrameClock {
    frames: Arc<AtomicU64>,
    sample_rate: SampleRate,
}

impl FrameClock {
    pub fn new(sample_rate: SampleRate) -> Self {
        Self {
            frames: Arc::new(AtomicU64::new(0)),
            sample_rate,
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }

    /// Seconds of audio rendered
    pub fn now(&self) -> f64 {
        self.sample_rate.seconds_for(self.frames())
    }

    pub fn sample_rate(&self) -> SampleRate {
        self.sample_rate
    }

    fn advance(&self, frames: u64) {
        self.frames.fetch_add(frames, Ordering::AcqRel);
    }
}

struct Voice {
    id: VoiceId,
    buffer: Arc<DecodedBuffer>,
    cursor: usize,
    gain: GainHandle,
    flags: Arc<VoiceFlags>,
}

struct Tap {
    id: TapId,
    tx: Sender<Vec<f32>>,
}

/// Voices, master gain and taps, rendered block by block
pub struct MixGraph {
    voices: Vec<Voice>,
    master: GainHandle,
    taps: Vec<Tap>,
    clock: FrameClock,
    ended_tx: Option<UnboundedSender<VoiceId>>,
}

/// The graph as shared between control code and the renderer
pub type SharedGraph = Arc<Mutex<MixGraph>>;

/// Lock a shared graph, recovering from a poisoned lock
pub(crate) fn lock_graph(graph: &SharedGraph) -> MutexGuard<'_, MixGraph> {
    graph.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MixGraph {
    pub fn new(clock: FrameClock) -> Self {
        Self {
            voices: Vec::new(),
            master: GainHandle::new(1.0),
            taps: Vec::new(),
            clock,
            ended_tx: None,
        }
    }

    /// Report voices that play to the end on `tx`
    pub fn set_ended_sender(&mut self, tx: UnboundedSender<VoiceId>) {
        self.ended_tx = Some(tx);
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    pub fn master(&self) -> &GainHandle {
        &self.master
    }

    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    pub fn tap_count(&self) -> usize {
        self.taps.len()
    }

    pub(crate) fn add_voice(
        &mut self,
        id: VoiceId,
        buffer: Arc<DecodedBuffer>,
        gain: GainHandle,
        flags: Arc<VoiceFlags>,
    ) {
        self.voices.push(Voice {
            id,
            buffer,
            cursor: 0,
            gain,
            flags,
        });
    }

    pub(crate) fn add_tap(&mut self, id: TapId, tx: Sender<Vec<f32>>) {
        self.taps.push(Tap { id, tx });
    }

    /// Detach a tap; dropping its sender lets the receiver drain and disconnect
    pub(crate) fn remove_tap(&mut self, id: TapId) -> bool {
        let before = self.taps.len();
        self.taps.retain(|tap| tap.id != id);
        self.taps.len() != before
    }

    /// Stop every voice and drop every tap
    pub(crate) fn clear(&mut self) {
        self.voices.clear();
        self.taps.clear();
    }

    /// Render `out.len() / 2` stereo frames into `out` and advance the clock
    pub fn render(&mut self, out: &mut [f32]) {
        out.fill(0.0);
        let frames = out.len() / MIX_CHANNELS;
        if frames == 0 {
            return;
        }

        let start = self.clock.frames();
        let rate = f64::from(self.clock.sample_rate().as_hz());
        let frame_time = |i: usize| (start + i as u64) as f64 / rate;

        for voice in &mut self.voices {
            if voice.flags.is_stopped() {
                continue;
            }

            let mut gain = voice.gain.lock();
            gain.prune_before(frame_time(0));

            let remaining = voice.buffer.frames().saturating_sub(voice.cursor);
            let n = remaining.min(frames);
            let src = &voice.buffer.samples()[voice.cursor * MIX_CHANNELS..];

            for (i, (dst, frame)) in out
                .chunks_exact_mut(MIX_CHANNELS)
                .zip(src.chunks_exact(MIX_CHANNELS))
                .take(n)
                .enumerate()
            {
                let g = gain.value_at(frame_time(i));
                for (d, s) in dst.iter_mut().zip(frame) {
                    *d += s * g;
                }
            }
            voice.cursor += n;
        }

        let ended_tx = self.ended_tx.as_ref();
        self.voices.retain(|voice| {
            if voice.flags.is_stopped() {
                return false;
            }
            if voice.cursor >= voice.buffer.frames() {
                voice.flags.mark_ended();
                trace!(voice = %voice.id, "voice reached end of buffer");
                if let Some(tx) = ended_tx {
                    let _ = tx.send(voice.id);
                }
                return false;
            }
            true
        });

        {
            let mut master = self.master.lock();
            master.prune_before(frame_time(0));
            for (i, frame) in out.chunks_exact_mut(MIX_CHANNELS).enumerate() {
                let g = master.value_at(frame_time(i));
                for s in frame {
                    *s *= g;
                }
            }
        }

        self.taps.retain(|tap| match tap.tx.try_send(out.to_vec()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                trace!(tap = tap.id.0, "tap consumer behind, dropping block");
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });

        self.clock.advance(frames as u64);
    }
}
