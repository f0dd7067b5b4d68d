/// The audio context: one mix graph bound to one destination
use crate::buffer::DecodedBuffer;
use crate::decoder::TrackDecoder;
use crate::error::Result;
use crate::graph::{lock_graph, FrameClock, MixGraph, SharedGraph};
use crate::output::{AudioDestination, OutputKind};
use crate::param::GainHandle;
use crate::tap::{TapId, TapStream};
use crate::voice::{VoiceFlags, VoiceHandle, VoiceId};
use crossbeam_channel::bounded;
use marquee_core::{AudioFormat, SampleRate};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tracing::{debug, info};

/// An open output with its mix bus
///
/// Owned explicitly by whoever plays audio; there is no global context.
/// Closing (or dropping) the context stops the destination and releases
/// every voice and tap.
pub struct AudioContext {
    graph: SharedGraph,
    clock: FrameClock,
    destination: Box<dyn AudioDestination>,
    ended_rx: Option<UnboundedReceiver<VoiceId>>,
    next_id: AtomicU64,
    closed: bool,
}

impl AudioContext {
    /// Open `kind` and start rendering
    pub fn open(kind: &OutputKind) -> Result<Self> {
        Self::with_destination(kind.open()?)
    }

    /// Start rendering into an already opened destination
    pub fn with_destination(mut destination: Box<dyn AudioDestination>) -> Result<Self> {
        let clock = FrameClock::new(destination.sample_rate());
        let (ended_tx, ended_rx) = unbounded_channel();

        let mut graph = MixGraph::new(clock.clone());
        graph.set_ended_sender(ended_tx);
        let graph = Arc::new(Mutex::new(graph));

        destination.start(Arc::clone(&graph))?;
        info!(
            destination = destination.name(),
            sample_rate = clock.sample_rate().as_hz(),
            "audio context opened"
        );

        Ok(Self {
            graph,
            clock,
            destination,
            ended_rx: Some(ended_rx),
            next_id: AtomicU64::new(1),
            closed: false,
        })
    }

    /// Audio clock in seconds: frames rendered over the sample rate
    pub fn current_time(&self) -> f64 {
        self.clock.now()
    }

    pub fn sample_rate(&self) -> SampleRate {
        self.clock.sample_rate()
    }

    /// Layout of the mix bus (and of every tap)
    pub fn format(&self) -> AudioFormat {
        AudioFormat::stereo(self.sample_rate())
    }

    /// A decoder producing buffers that play at this context's rate
    pub fn decoder(&self) -> TrackDecoder {
        TrackDecoder::new(self.sample_rate())
    }

    /// Gain applied after all voices are summed
    pub fn master_gain(&self) -> GainHandle {
        lock_graph(&self.graph).master().clone()
    }

    /// Start playing `buffer` immediately at a constant `gain`
    pub fn start_voice(&self, buffer: Arc<DecodedBuffer>, gain: f32) -> VoiceHandle {
        let id = VoiceId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let gain = GainHandle::new(gain);
        let flags = Arc::new(VoiceFlags::default());

        lock_graph(&self.graph).add_voice(id, buffer, gain.clone(), Arc::clone(&flags));
        debug!(voice = %id, "voice started");

        VoiceHandle::new(id, gain, flags)
    }

    /// Voices still in the mix
    pub fn active_voices(&self) -> usize {
        lock_graph(&self.graph).voice_count()
    }

    /// Attach a tap holding up to `capacity` blocks
    pub fn attach_tap(&self, capacity: usize) -> TapStream {
        let id = TapId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = bounded(capacity.max(1));
        lock_graph(&self.graph).add_tap(id, tx);
        debug!(tap = id.0, capacity, "tap attached");
        TapStream::new(id, rx, self.format())
    }

    /// Detach a tap; returns whether it was attached
    pub fn detach_tap(&self, id: TapId) -> bool {
        let removed = lock_graph(&self.graph).remove_tap(id);
        if removed {
            debug!(tap = id.0, "tap detached");
        }
        removed
    }

    /// Receiver of voices that played to the end; can be taken once
    pub fn take_ended_receiver(&mut self) -> Option<UnboundedReceiver<VoiceId>> {
        self.ended_rx.take()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Stop the destination and release every voice and tap; idempotent
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.destination.close();
        lock_graph(&self.graph).clear();
        info!(destination = self.destination.name(), "audio context closed");
    }
}

impl Drop for AudioContext {
    fn drop(&mut self) {
        self.close();
    }
}
