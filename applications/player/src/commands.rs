/// Line commands read from stdin
use crate::error::{PlayerError, Result};
use std::path::PathBuf;
use std::str::FromStr;

/// One operator command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Play,
    Stop,
    /// Toggle mute (`m`)
    Mute,
    /// Volume up one step (`+`)
    VolumeUp,
    /// Volume down one step (`-`)
    VolumeDown,
    SetVolume(f32),
    /// Re-read configuration and apply it to the engine
    Reload,
    /// Start recording the mix to a WAV file
    Record(PathBuf),
    /// Stop recording
    StopRecording,
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  play | p             start the playlist
  stop | s             stop playback
  mute | m             toggle mute
  up | +               volume up
  down | -             volume down
  volume <0..1>        set volume
  reload               re-read configuration
  record <file.wav>    record the mix
  record stop          stop recording
  status               show engine state
  quit | q             exit";

impl FromStr for Command {
    type Err = PlayerError;

    fn from_str(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let verb = words.next().unwrap_or_default().to_ascii_lowercase();
        let arg = words.next();

        let command = match (verb.as_str(), arg) {
            ("play" | "p", None) => Self::Play,
            ("stop" | "s", None) => Self::Stop,
            ("mute" | "m", None) => Self::Mute,
            ("up" | "+", None) => Self::VolumeUp,
            ("down" | "-", None) => Self::VolumeDown,
            ("volume" | "vol" | "v", Some(value)) => {
                let volume = value.parse::<f32>().map_err(|e| PlayerError::BadArgument {
                    command: "volume",
                    reason: e.to_string(),
                })?;
                Self::SetVolume(volume)
            }
            ("volume" | "vol" | "v", None) => {
                return Err(PlayerError::BadArgument {
                    command: "volume",
                    reason: "expected a value between 0 and 1".to_string(),
                })
            }
            ("reload", None) => Self::Reload,
            ("record", Some("stop")) => Self::StopRecording,
            ("record", Some(path)) => Self::Record(PathBuf::from(path)),
            ("record", None) => {
                return Err(PlayerError::BadArgument {
                    command: "record",
                    reason: "expected a file path or 'stop'".to_string(),
                })
            }
            ("status", None) => Self::Status,
            ("help" | "?", None) => Self::Help,
            ("quit" | "q" | "exit", None) => Self::Quit,
            _ => return Err(PlayerError::UnknownCommand(line.trim().to_string())),
        };
        Ok(command)
    }
}
