//! Default track fetcher: HTTP(S) plus local files

use async_trait::async_trait;
use marquee_core::{MarqueeError, Result, TrackFetcher};
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Where a track URL actually points
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchTarget {
    Http(Url),
    File(PathBuf),
}

/// Fetches `http(s)://` URLs with reqwest and everything else from disk
///
/// Relative URLs (`/audio/a.mp3`, `audio/a.mp3`) are joined onto the
/// configured base URL when there is one; otherwise they are filesystem
/// paths.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    base_url: Option<Url>,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: None,
        }
    }

    /// Fetcher with a base URL for relative tracks and a request timeout
    pub fn with_settings(base_url: Option<Url>, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| MarqueeError::config(format!("HTTP client: {e}")))?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// Decide how `url` will be fetched
    pub fn resolve(&self, url: &str) -> Result<FetchTarget> {
        match Url::parse(url) {
            Ok(parsed) => Self::classify(parsed, url),
            Err(url::ParseError::RelativeUrlWithoutBase) => match &self.base_url {
                Some(base) => {
                    let joined = base
                        .join(url)
                        .map_err(|e| MarqueeError::invalid_input(format!("{url}: {e}")))?;
                    Self::classify(joined, url)
                }
                None => Ok(FetchTarget::File(PathBuf::from(url))),
            },
            // Not URL-shaped at all (e.g. a Windows path); treat as a path
            Err(_) => Ok(FetchTarget::File(PathBuf::from(url))),
        }
    }

    fn classify(parsed: Url, raw: &str) -> Result<FetchTarget> {
        match parsed.scheme() {
            "http" | "https" => Ok(FetchTarget::Http(parsed)),
            "file" => parsed.to_file_path().map(FetchTarget::File).map_err(|()| {
                MarqueeError::invalid_input(format!("not a local file URL: {raw}"))
            }),
            // Single-letter schemes are drive letters (C:\audio\a.mp3)
            scheme if scheme.len() == 1 => Ok(FetchTarget::File(PathBuf::from(raw))),
            other => Err(MarqueeError::invalid_input(format!(
                "unsupported URL scheme '{other}' in {raw}"
            ))),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TrackFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        match self.resolve(url)? {
            FetchTarget::Http(target) => {
                debug!(url = %target, "fetching track over HTTP");
                let response = self
                    .client
                    .get(target.clone())
                    .send()
                    .await
                    .map_err(|e| MarqueeError::network(e.to_string()))?;

                let status = response.status();
                if !status.is_success() {
                    return Err(MarqueeError::HttpStatus {
                        url: url.to_string(),
                        status: status.as_u16(),
                    });
                }

                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| MarqueeError::network(e.to_string()))?;
                Ok(bytes.to_vec())
            }
            FetchTarget::File(path) => {
                debug!(path = %path.display(), "reading track from disk");
                Ok(tokio::fs::read(&path).await?)
            }
        }
    }
}
