//! Track buffer cache
//!
//! Decoded buffers keyed by track URL. Entries live until `clear()`; a URL
//! that is cached is never fetched again. Loads still in flight when the
//! cache is cleared return their buffer but do not store it.

use crate::error::{PlaybackError, Result};
use futures_util::future::join_all;
use marquee_audio::{extension_hint, DecodedBuffer, TrackDecoder};
use marquee_core::{Track, TrackFetcher};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Outcome of [`BufferCache::preload`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreloadReport {
    /// URLs now in the cache
    pub loaded: Vec<String>,
    /// URLs that failed to fetch or decode
    pub failed: Vec<String>,
}

/// URL -> decoded buffer
///
/// The map lock is never held while fetching or decoding, so two loads of
/// the same URL can race. Both decode; the later insert wins.
pub struct BufferCache {
    entries: Mutex<HashMap<String, Arc<DecodedBuffer>>>,
    /// Bumped by `clear()`, under the entries lock
    epoch: AtomicU64,
    fetcher: Arc<dyn TrackFetcher>,
}

impl BufferCache {
    pub fn new(fetcher: Arc<dyn TrackFetcher>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            epoch: AtomicU64::new(0),
            fetcher,
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Arc<DecodedBuffer>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cached buffer for `url`, if any
    pub fn get(&self, url: &str) -> Option<Arc<DecodedBuffer>> {
        self.entries().get(url).cloned()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entries().contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Drop every entry and disown loads in flight
    pub fn clear(&self) {
        let mut entries = self.entries();
        entries.clear();
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }

    /// Cached or freshly loaded buffer for `track`
    ///
    /// Failures are logged and reported as `None`.
    pub async fn load(&self, track: &Track, decoder: TrackDecoder) -> Option<Arc<DecodedBuffer>> {
        match self.try_load(track, decoder).await {
            Ok(buffer) => Some(buffer),
            Err(e) => {
                warn!(track = %track.name, url = %track.url, error = %e, "failed to load track");
                None
            }
        }
    }

    /// Like [`load`](Self::load), but returns the failure
    pub async fn try_load(&self, track: &Track, decoder: TrackDecoder) -> Result<Arc<DecodedBuffer>> {
        let epoch = {
            let entries = self.entries();
            if let Some(buffer) = entries.get(&track.url) {
                return Ok(Arc::clone(buffer));
            }
            self.epoch.load(Ordering::SeqCst)
        };

        let bytes = self
            .fetcher
            .fetch(&track.url)
            .await
            .map_err(|source| PlaybackError::Fetch {
                url: track.url.clone(),
                source,
            })?;
        debug!(url = %track.url, bytes = bytes.len(), "fetched track");

        let extension = extension_hint(&track.url).map(str::to_owned);
        let buffer = tokio::task::spawn_blocking(move || decoder.decode(bytes, extension.as_deref()))
            .await
            .map_err(|e| PlaybackError::DecodeTask(e.to_string()))??;

        let buffer = Arc::new(buffer);
        debug!(
            url = %track.url,
            seconds = buffer.duration_secs(),
            "decoded track"
        );

        let mut entries = self.entries();
        if self.epoch.load(Ordering::SeqCst) == epoch {
            entries.insert(track.url.clone(), Arc::clone(&buffer));
        } else {
            debug!(url = %track.url, "cache cleared during load, not storing");
        }
        Ok(buffer)
    }

    /// Load every track concurrently; never fails as a whole
    pub async fn preload(&self, tracks: &[Track], decoder: TrackDecoder) -> PreloadReport {
        let outcomes = join_all(tracks.iter().map(|track| async move {
            (track.url.clone(), self.load(track, decoder).await.is_some())
        }))
        .await;

        let mut report = PreloadReport::default();
        for (url, ok) in outcomes {
            if ok {
                report.loaded.push(url);
            } else {
                report.failed.push(url);
            }
        }
        report
    }
}

impl std::fmt::Debug for BufferCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferCache")
            .field("entries", &self.len())
            .finish_non_exhaustive()
    }
}
