//! Output destinations
//!
//! A destination pulls rendered blocks out of the shared
//! [`MixGraph`](crate::graph::MixGraph) at its own pace, and that pace is
//! the pace of the audio clock.

mod device;
mod null;

pub use self::device::{list_output_devices, CpalDestination};
pub use self::null::NullDestination;

use crate::error::Result;
use crate::graph::SharedGraph;
use marquee_core::SampleRate;

/// Where the mix bus ends up
pub trait AudioDestination: Send {
    /// Human-readable name, for logs
    fn name(&self) -> &str;

    /// Rate the destination consumes frames at
    fn sample_rate(&self) -> SampleRate;

    /// Begin rendering `graph`
    ///
    /// # Errors
    /// Fails if the underlying stream or clock cannot be started.
    fn start(&mut self, graph: SharedGraph) -> Result<()>;

    /// Stop rendering; idempotent
    fn close(&mut self);
}

/// Which destination to open
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputKind {
    /// A system output device; `None` picks the default device
    Device { name: Option<String> },
    /// No sound; the clock is driven by tokio timers
    Null { sample_rate: SampleRate },
}

impl Default for OutputKind {
    fn default() -> Self {
        Self::Device { name: None }
    }
}

impl OutputKind {
    /// Open (but do not start) the destination
    pub fn open(&self) -> Result<Box<dyn AudioDestination>> {
        match self {
            Self::Device { name } => Ok(Box::new(CpalDestination::open(name.as_deref())?)),
            Self::Null { sample_rate } => Ok(Box::new(NullDestination::new(*sample_rate))),
        }
    }
}
