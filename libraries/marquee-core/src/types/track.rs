/// Track type
use serde::{Deserialize, Serialize};
use std::fmt;

/// One entry of the kiosk playlist
///
/// The URL is the track's identity: two tracks with the same URL share a
/// cache entry no matter what they are called.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Track {
    /// Display name, used only in logs and events
    pub name: String,

    /// Location of the audio bytes (absolute, relative, or `file://`)
    pub url: String,
}

impl Track {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.url)
    }
}
