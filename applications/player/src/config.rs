/// Player configuration
use crate::error::{PlayerError, Result};
use marquee_audio::OutputKind;
use marquee_core::{AudioConfig, SampleRate};
use marquee_playback::HttpFetcher;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// File read when `--config` is not given, if it exists
pub const DEFAULT_CONFIG_FILE: &str = "marquee.toml";

/// Prefix of environment overrides (`MARQUEE__AUDIO__VOLUME=0.5`)
pub const ENV_PREFIX: &str = "MARQUEE";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PlayerConfig {
    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub output: OutputSettings,

    #[serde(default)]
    pub fetch: FetchSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputSettings {
    /// Output device name; the host default when unset
    #[serde(default)]
    pub device: Option<String>,

    /// Render to a clock-driven null sink instead of a device
    #[serde(default)]
    pub headless: bool,

    /// Mix rate of the headless sink
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetchSettings {
    /// Base URL that relative track URLs are resolved against
    #[serde(default)]
    pub base_url: Option<String>,

    /// Per-request timeout in seconds; 0 disables it
    #[serde(default = "default_timeout_s")]
    pub timeout_s: u64,
}

impl PlayerConfig {
    /// Load configuration from file and environment
    ///
    /// An explicit `path` must exist; otherwise [`DEFAULT_CONFIG_FILE`] is
    /// read when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::from_sources(
            path,
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
    }

    /// Merge a config file (see [`load`](Self::load)) with `env` on top
    pub fn from_sources(path: Option<&Path>, env: config::Environment) -> Result<Self> {
        let mut settings = config::Config::builder();

        settings = match path {
            Some(path) => settings.add_source(config::File::from(path.to_path_buf())),
            None => settings
                .add_source(config::File::from(PathBuf::from(DEFAULT_CONFIG_FILE)).required(false)),
        };
        settings = settings.add_source(env);

        let config = settings.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Validate output settings
    ///
    /// Audio values are clamped where used; they are never rejected.
    pub fn validate(&self) -> Result<()> {
        if self.output.headless && !(8_000..=192_000).contains(&self.output.sample_rate) {
            return Err(PlayerError::Config(format!(
                "Headless sample rate {} Hz is outside 8000..=192000",
                self.output.sample_rate
            )));
        }

        if matches!(self.output.device.as_deref(), Some(name) if name.trim().is_empty()) {
            return Err(PlayerError::Config(
                "Output device name is empty (unset it to use the default device)".to_string(),
            ));
        }

        Ok(())
    }
}

impl OutputSettings {
    pub fn kind(&self) -> OutputKind {
        if self.headless {
            OutputKind::Null {
                sample_rate: SampleRate::new(self.sample_rate),
            }
        } else {
            OutputKind::Device {
                name: self.device.clone(),
            }
        }
    }
}

impl FetchSettings {
    /// Build the fetcher these settings describe
    pub fn fetcher(&self) -> Result<HttpFetcher> {
        let base_url = self
            .base_url
            .as_deref()
            .map(|raw| {
                Url::parse(raw)
                    .map_err(|e| PlayerError::Config(format!("Invalid fetch.base_url '{raw}': {e}")))
            })
            .transpose()?;
        let timeout = (self.timeout_s > 0).then(|| Duration::from_secs(self.timeout_s));

        Ok(HttpFetcher::with_settings(base_url, timeout)?)
    }
}

// Default values
fn default_sample_rate() -> u32 {
    SampleRate::DVD_QUALITY.as_hz()
}

fn default_timeout_s() -> u64 {
    30
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            device: None,
            headless: false,
            sample_rate: default_sample_rate(),
        }
    }
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_s: default_timeout_s(),
        }
    }
}
