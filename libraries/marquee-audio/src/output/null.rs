/// Headless destination driven by tokio time
use super::AudioDestination;
use crate::buffer::MIX_CHANNELS;
use crate::error::{AudioError, Result};
use crate::graph::{lock_graph, SharedGraph};
use marquee_core::SampleRate;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::debug;

/// How often the null destination renders
pub const RENDER_INTERVAL: Duration = Duration::from_millis(10);

/// Renders the mix into the void at real-time pace
///
/// Each tick renders however many frames tokio's clock says are due, so
/// the audio clock tracks tokio time. Under a paused test runtime the
/// audio clock advances exactly as far as the test advances time.
pub struct NullDestination {
    sample_rate: SampleRate,
    task: Option<JoinHandle<()>>,
}

impl NullDestination {
    pub fn new(sample_rate: SampleRate) -> Self {
        Self {
            sample_rate,
            task: None,
        }
    }

    async fn run_clock(graph: SharedGraph, sample_rate: SampleRate) {
        let origin = Instant::now();
        let mut ticker = interval(RENDER_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut block = Vec::new();

        loop {
            ticker.tick().await;
            let due = sample_rate.frames_in(origin.elapsed());
            render_due(&graph, due, &mut block);
        }
    }
}

/// Render until the clock reaches `due` frames
fn render_due(graph: &SharedGraph, due: u64, block: &mut Vec<f32>) {
    let mut graph = lock_graph(graph);
    let rendered = graph.clock().frames();
    if due <= rendered {
        return;
    }
    let frames = (due - rendered) as usize;
    block.resize(frames * MIX_CHANNELS, 0.0);
    graph.render(block);
}

impl AudioDestination for NullDestination {
    fn name(&self) -> &str {
        "null"
    }

    fn sample_rate(&self) -> SampleRate {
        self.sample_rate
    }

    fn start(&mut self, graph: SharedGraph) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| AudioError::NoRuntime)?;
        self.close();
        self.task = Some(runtime.spawn(Self::run_clock(graph, self.sample_rate)));
        debug!(sample_rate = self.sample_rate.as_hz(), "null destination started");
        Ok(())
    }

    fn close(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for NullDestination {
    fn drop(&mut self) {
        self.close();
    }
}
