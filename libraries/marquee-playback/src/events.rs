//! Playback Events
//!
//! Broadcast to any number of subscribers (see `AudioEngine::subscribe`).
//! Events are emitted at key points:
//! - Track starts, crossfades and cutovers
//! - Tracks skipped because they failed to load
//! - Volume and mute changes

use marquee_core::Track;
use serde::{Deserialize, Serialize};

/// Capacity of the event channel; slow subscribers see `Lagged`
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Events emitted by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlaybackEvent {
    /// A track started on its own (no crossfade into it)
    TrackStarted { track: Track },

    /// A crossfade began
    CrossfadeStarted {
        from: Track,
        to: Track,
        duration_ms: u64,
    },

    /// The outgoing track of a crossfade was released
    CutoverCompleted { track: Track },

    /// A track failed to load and was passed over
    TrackSkipped { track: Track },

    /// The only playing track reached its end before any crossfade
    TrackEnded { track: Track },

    /// No track in the playlist could be loaded
    PlaylistExhausted { attempts: usize },

    /// Playback was stopped
    Stopped,

    /// Volume or mute changed
    VolumeChanged { volume: f32, muted: bool },
}

/// Observable projection of the engine's state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackPhase {
    /// No audio context
    Idle,
    /// Context open, nothing sounding
    Stopped,
    /// One track sounding
    PlayingSingle,
    /// Two tracks overlapping
    Crossfading,
}

impl std::fmt::Display for PlaybackPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Stopped => "stopped",
            Self::PlayingSingle => "playing",
            Self::Crossfading => "crossfading",
        };
        f.write_str(name)
    }
}
