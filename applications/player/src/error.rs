/// Player error types
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PlayerError>;

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Bad argument for '{command}': {reason}")]
    BadArgument {
        command: &'static str,
        reason: String,
    },

    #[error("Recorder error: {0}")]
    Recorder(String),

    #[error("Engine error: {0}")]
    Core(#[from] marquee_core::MarqueeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for PlayerError {
    fn from(err: config::ConfigError) -> Self {
        PlayerError::Config(err.to_string())
    }
}

impl From<hound::Error> for PlayerError {
    fn from(err: hound::Error) -> Self {
        PlayerError::Recorder(err.to_string())
    }
}
