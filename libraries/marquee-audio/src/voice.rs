/// Voices: one playing buffer each
use crate::error::{AudioError, Result};
use crate::param::GainHandle;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Identifies a voice for the lifetime of its context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceId(pub u64);

impl fmt::Display for VoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Flags shared between a [`VoiceHandle`] and the render thread
#[derive(Debug, Default)]
pub(crate) struct VoiceFlags {
    /// Set by `VoiceHandle::stop`; the renderer drops the voice on its next block
    stopped: AtomicBool,
    /// Set by the renderer when the buffer ran out
    ended: AtomicBool,
}

impl VoiceFlags {
    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    pub(crate) fn mark_ended(&self) {
        self.ended.store(true, Ordering::Release);
    }
}

/// Control side of a playing voice
///
/// Voices start playing the moment they are created and cannot be
/// restarted: a stopped voice is gone for good.
#[derive(Debug, Clone)]
pub struct VoiceHandle {
    id: VoiceId,
    gain: GainHandle,
    flags: Arc<VoiceFlags>,
}

impl VoiceHandle {
    pub(crate) fn new(id: VoiceId, gain: GainHandle, flags: Arc<VoiceFlags>) -> Self {
        Self { id, gain, flags }
    }

    pub fn id(&self) -> VoiceId {
        self.id
    }

    /// The voice's gain timeline
    pub fn gain(&self) -> &GainHandle {
        &self.gain
    }

    /// Whether the voice played its buffer to the end
    pub fn has_ended(&self) -> bool {
        self.flags.ended.load(Ordering::Acquire)
    }

    /// Whether the voice still produces sound
    pub fn is_active(&self) -> bool {
        !self.has_ended() && !self.flags.is_stopped()
    }

    /// Silence the voice and release it from the mix
    ///
    /// # Errors
    /// Returns `AudioError::VoiceAlreadyStopped` if the voice was already
    /// stopped or has played to the end.
    pub fn stop(&self) -> Result<()> {
        if self.has_ended() || self.flags.stopped.swap(true, Ordering::AcqRel) {
            return Err(AudioError::VoiceAlreadyStopped(self.id));
        }
        Ok(())
    }
}
