//! Playback slots: what is currently sounding

use crate::events::PlaybackPhase;
use marquee_audio::{VoiceHandle, VoiceId};
use marquee_core::Track;
use std::mem;
use std::time::Duration;
use tracing::trace;

/// One sounding track: its voice, gain and metadata
///
/// Slots are single use. Once stopped, a slot is dropped.
#[derive(Debug)]
pub(crate) struct Slot {
    pub voice: VoiceHandle,
    pub track: Track,
    pub duration: Duration,
}

impl Slot {
    pub fn new(voice: VoiceHandle, track: Track, duration: Duration) -> Self {
        Self {
            voice,
            track,
            duration,
        }
    }

    /// Stop the voice, tolerating one that already stopped or ended
    pub fn stop_quietly(self) {
        if let Err(e) = self.voice.stop() {
            trace!(track = %self.track.name, error = %e, "voice was already stopped");
        }
    }
}

/// Active slots; crossfading always means exactly two
#[derive(Debug, Default)]
pub(crate) enum Slots {
    #[default]
    Empty,
    Single(Slot),
    Crossfading {
        outgoing: Slot,
        incoming: Slot,
        /// Audio-clock time the fade completes
        ends_at: f64,
    },
}

impl Slots {
    pub fn take(&mut self) -> Slots {
        mem::take(self)
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::Single(_) => 1,
            Self::Crossfading { .. } => 2,
        }
    }

    pub fn phase(&self) -> PlaybackPhase {
        match self {
            Self::Empty => PlaybackPhase::Stopped,
            Self::Single(_) => PlaybackPhase::PlayingSingle,
            Self::Crossfading { .. } => PlaybackPhase::Crossfading,
        }
    }

    /// The slot the playlist considers current (the incoming one mid-fade)
    pub fn current(&self) -> Option<&Slot> {
        match self {
            Self::Empty => None,
            Self::Single(slot) | Self::Crossfading { incoming: slot, .. } => Some(slot),
        }
    }

    /// Whether `id` is the voice of a lone current slot
    pub fn is_single_voice(&self, id: VoiceId) -> bool {
        matches!(self, Self::Single(slot) if slot.voice.id() == id)
    }

    /// Stop and discard every slot
    pub fn stop_all(&mut self) {
        match self.take() {
            Self::Empty => {}
            Self::Single(slot) => slot.stop_quietly(),
            Self::Crossfading {
                outgoing, incoming, ..
            } => {
                outgoing.stop_quietly();
                incoming.stop_quietly();
            }
        }
    }
}
