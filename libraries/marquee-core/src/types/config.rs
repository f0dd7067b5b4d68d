/// Audio configuration
use crate::types::Track;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Audio section of the kiosk configuration
///
/// Field names are snake_case; `crossfadeDurationS` is accepted as an alias
/// so JSON written by the presentation shell deserializes unchanged.
/// Values are taken as given. Range handling happens where they are used
/// (see [`AudioConfig::clamped_volume`] and [`AudioConfig::crossfade_duration`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub tracks: Vec<Track>,

    #[serde(default = "default_volume")]
    pub volume: f32,

    #[serde(default)]
    pub shuffle: bool,

    #[serde(default = "default_crossfade", alias = "crossfadeDurationS")]
    pub crossfade_duration_s: f64,

    #[serde(default)]
    pub autoplay: bool,
}

fn default_enabled() -> bool {
    true
}

fn default_volume() -> f32 {
    0.8
}

fn default_crossfade() -> f64 {
    3.0
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            tracks: Vec::new(),
            volume: default_volume(),
            shuffle: false,
            crossfade_duration_s: default_crossfade(),
            autoplay: false,
        }
    }
}

impl AudioConfig {
    /// Volume clamped to `[0, 1]`; NaN becomes 0
    pub fn clamped_volume(&self) -> f32 {
        clamp_volume(self.volume)
    }

    /// Crossfade length; negative or non-finite values collapse to zero
    pub fn crossfade_duration(&self) -> Duration {
        let secs = self.crossfade_duration_s;
        if secs.is_finite() && secs > 0.0 {
            Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
        } else {
            Duration::ZERO
        }
    }

    /// Whether the shell should start playback on its own
    pub fn should_autoplay(&self) -> bool {
        self.enabled && self.autoplay
    }
}

/// Clamp a volume to `[0, 1]`, mapping NaN to 0
pub fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config: AudioConfig = serde_json::from_str(r#"{"tracks": []}"#).unwrap();
        assert!(config.enabled);
        assert_eq!(config.volume, 0.8);
        assert_eq!(config.crossfade_duration_s, 3.0);
        assert!(!config.shuffle);
        assert!(!config.autoplay);
    }

    #[test]
    fn accepts_camel_case_crossfade() {
        let json = r#"{
            "enabled": true,
            "tracks": [{"name": "A", "url": "/a.mp3"}],
            "volume": 0.5,
            "crossfadeDurationS": 1.5,
            "autoplay": true
        }"#;
        let config: AudioConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.crossfade_duration_s, 1.5);
        assert_eq!(config.tracks[0], Track::new("A", "/a.mp3"));
        assert!(config.should_autoplay());
    }

    #[test]
    fn crossfade_duration_rejects_bad_values() {
        let mut config = AudioConfig {
            crossfade_duration_s: -2.0,
            ..AudioConfig::default()
        };
        assert_eq!(config.crossfade_duration(), Duration::ZERO);

        config.crossfade_duration_s = f64::NAN;
        assert_eq!(config.crossfade_duration(), Duration::ZERO);

        config.crossfade_duration_s = f64::INFINITY;
        assert_eq!(config.crossfade_duration(), Duration::ZERO);

        config.crossfade_duration_s = 0.25;
        assert_eq!(config.crossfade_duration(), Duration::from_millis(250));
    }

    #[test]
    fn volume_is_clamped() {
        let mut config = AudioConfig {
            volume: 1.7,
            ..AudioConfig::default()
        };
        assert_eq!(config.clamped_volume(), 1.0);
        config.volume = -0.2;
        assert_eq!(config.clamped_volume(), 0.0);
        config.volume = f32::NAN;
        assert_eq!(config.clamped_volume(), 0.0);
    }

    #[test]
    fn autoplay_requires_enabled() {
        let config = AudioConfig {
            enabled: false,
            autoplay: true,
            ..AudioConfig::default()
        };
        assert!(!config.should_autoplay());
    }
}
