/// Recording taps on the mix bus
use crossbeam_channel::{Receiver, RecvTimeoutError};
use marquee_core::AudioFormat;
use std::time::Duration;

/// Blocks buffered per tap before the renderer starts dropping
pub const DEFAULT_TAP_CAPACITY: usize = 64;

/// Identifies an attached tap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TapId(pub u64);

/// Receiving end of a mix-bus tap
///
/// Yields the post-master mix as interleaved blocks in [`TapStream::format`].
/// Blocks are dropped, never queued without bound, when the consumer falls
/// behind. After the tap is detached the channel drains and then
/// disconnects.
#[derive(Debug)]
pub struct TapStream {
    id: TapId,
    receiver: Receiver<Vec<f32>>,
    format: AudioFormat,
}

impl TapStream {
    pub(crate) fn new(id: TapId, receiver: Receiver<Vec<f32>>, format: AudioFormat) -> Self {
        Self {
            id,
            receiver,
            format,
        }
    }

    pub fn id(&self) -> TapId {
        self.id
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn receiver(&self) -> &Receiver<Vec<f32>> {
        &self.receiver
    }

    pub fn into_receiver(self) -> Receiver<Vec<f32>> {
        self.receiver
    }

    /// Wait up to `timeout` for the next block
    ///
    /// `Err(Disconnected)` means the tap was detached and fully drained.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Vec<f32>, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// All blocks available right now
    pub fn drain(&self) -> Vec<Vec<f32>> {
        self.receiver.try_iter().collect()
    }
}
