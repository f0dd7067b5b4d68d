//! Error types for playback management

use marquee_audio::AudioError;
use marquee_core::MarqueeError;
use thiserror::Error;

/// Playback errors
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// Track bytes could not be fetched
    #[error("Failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: MarqueeError,
    },

    /// Decoding or output error
    #[error(transparent)]
    Audio(#[from] AudioError),

    /// The blocking decode task panicked or was cancelled
    #[error("Decode task failed: {0}")]
    DecodeTask(String),
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
