/// Core traits for Marquee
use crate::error::Result;
use async_trait::async_trait;

/// Source of raw track bytes
///
/// Implementers resolve a track URL to its undecoded bytes. The playback
/// engine never inspects the URL itself; local paths, `file://` URLs and
/// HTTP endpoints are all the fetcher's business.
///
/// Failures are returned, not logged. The caller decides whether a failed
/// fetch is worth a warning.
#[async_trait]
pub trait TrackFetcher: Send + Sync {
    /// Fetch the full contents behind `url`
    ///
    /// # Errors
    /// Returns `MarqueeError::HttpStatus` for non-success responses, and
    /// `Network`/`Io` for transport failures.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}
