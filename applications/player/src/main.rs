/// Marquee Player - headless kiosk audio
use anyhow::Context;
use clap::{Parser, Subcommand};
use marquee_audio::{list_output_devices, TrackDecoder};
use marquee_core::{SampleRate, Track};
use marquee_player::{commands::HELP, Command, PlayerConfig, Recorder};
use marquee_playback::{AudioEngine, BufferCache, PlaybackEvent, VOLUME_STEP};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "marquee-player")]
#[command(about = "Looping, crossfading background audio for kiosks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the engine, reading commands from stdin
    Run {
        /// Configuration file path (default: marquee.toml if present)
        #[arg(short, long, env = "MARQUEE_CONFIG")]
        config: Option<PathBuf>,
        /// Render to a null sink instead of an audio device
        #[arg(long)]
        headless: bool,
        /// Record the mix to this WAV file
        #[arg(short, long)]
        record: Option<PathBuf>,
        /// Output device name
        #[arg(short, long)]
        device: Option<String>,
    },
    /// List output devices
    Devices,
    /// Fetch and decode one track, then print what was decoded
    Probe {
        /// Track URL or path
        url: String,
        /// Configuration file path (for fetch settings)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "marquee_player=info,marquee_playback=info,marquee_audio=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            headless,
            record,
            device,
        } => {
            run(config, headless, record, device).await?;
        }
        Commands::Devices => {
            list_devices()?;
        }
        Commands::Probe { url, config } => {
            probe(&url, config.as_deref()).await?;
        }
    }

    Ok(())
}

async fn run(
    config_path: Option<PathBuf>,
    headless: bool,
    record: Option<PathBuf>,
    device: Option<String>,
) -> anyhow::Result<()> {
    let mut config = PlayerConfig::load(config_path.as_deref())?;
    if headless {
        config.output.headless = true;
    }
    if device.is_some() {
        config.output.device = device;
    }
    config.validate()?;

    info!(
        tracks = config.audio.tracks.len(),
        output = ?config.output.kind(),
        "starting Marquee player"
    );

    let fetcher = config.fetch.fetcher()?;
    let engine = AudioEngine::new(config.audio.clone(), Arc::new(fetcher), config.output.kind());
    tokio::spawn(log_events(engine.clone()));

    engine.init().await;
    anyhow::ensure!(engine.is_initialized(), "audio output could not be opened");

    let mut session = Session {
        engine,
        config_path,
        recorder: None,
    };
    if let Some(path) = record {
        session.start_recording(&path)?;
    }

    if config.audio.should_autoplay() {
        session.engine.play().await;
    } else {
        info!("autoplay disabled, waiting for 'play'");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received");
                break;
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => match line.parse::<Command>() {
                    Ok(Command::Quit) => break,
                    Ok(command) => session.apply(command).await,
                    Err(e) => println!("{e} (type 'help')"),
                },
                Ok(None) => {
                    // Running without a terminal; only Ctrl-C stops us now
                    stdin_open = false;
                }
                Err(e) => {
                    warn!(error = %e, "failed to read stdin");
                    stdin_open = false;
                }
            },
        }
    }

    session.shutdown().await;
    Ok(())
}

/// The running engine plus what the shell owns around it
struct Session {
    engine: AudioEngine,
    config_path: Option<PathBuf>,
    recorder: Option<Recorder>,
}

impl Session {
    async fn apply(&mut self, command: Command) {
        match command {
            Command::Play => self.engine.play().await,
            Command::Stop => self.engine.stop(),
            Command::Mute => {
                let muted = self.engine.toggle_mute();
                println!("{}", if muted { "muted" } else { "unmuted" });
            }
            Command::VolumeUp => self.nudge_volume(VOLUME_STEP),
            Command::VolumeDown => self.nudge_volume(-VOLUME_STEP),
            Command::SetVolume(volume) => {
                self.engine.set_volume(volume);
                println!("volume {:.2}", self.engine.volume());
            }
            Command::Reload => self.reload(),
            Command::Record(path) => {
                self.stop_recording().await;
                if let Err(e) = self.start_recording(&path) {
                    println!("cannot record: {e}");
                }
            }
            Command::StopRecording => self.stop_recording().await,
            Command::Status => self.print_status(),
            Command::Help => println!("{HELP}"),
            Command::Quit => {}
        }
    }

    fn nudge_volume(&self, delta: f32) {
        self.engine.set_volume(self.engine.volume() + delta);
        println!("volume {:.2}", self.engine.volume());
    }

    fn reload(&self) {
        match PlayerConfig::load(self.config_path.as_deref()) {
            Ok(config) => {
                info!(tracks = config.audio.tracks.len(), "configuration reloaded");
                self.engine.update(config.audio);
            }
            Err(e) => warn!(error = %e, "reload failed, keeping current configuration"),
        }
    }

    fn start_recording(&mut self, path: &Path) -> anyhow::Result<()> {
        let tap = self
            .engine
            .create_export_stream()
            .context("engine has no output to record")?;
        self.recorder = Some(Recorder::start(path, tap)?);
        Ok(())
    }

    async fn stop_recording(&mut self) {
        let Some(recorder) = self.recorder.take() else {
            return;
        };
        self.engine.stop_export_stream();
        let path = recorder.path().to_path_buf();
        match tokio::task::spawn_blocking(move || recorder.finish()).await {
            Ok(Ok(frames)) => println!("recorded {frames} frames to {}", path.display()),
            Ok(Err(e)) => warn!(path = %path.display(), error = %e, "recording failed"),
            Err(e) => warn!(error = %e, "recorder task failed"),
        }
    }

    fn print_status(&self) {
        let current = self
            .engine
            .current_track()
            .map_or_else(|| "-".to_string(), |track| track.to_string());
        println!(
            "{} | track {} | volume {:.2}{} | recording {}",
            self.engine.phase(),
            current,
            self.engine.volume(),
            if self.engine.is_muted() { " (muted)" } else { "" },
            self.recorder
                .as_ref()
                .map_or_else(|| "off".to_string(), |r| r.path().display().to_string()),
        );
    }

    async fn shutdown(mut self) {
        self.stop_recording().await;
        self.engine.destroy();
        info!("Marquee player stopped");
    }
}

async fn log_events(engine: AudioEngine) {
    let mut events = engine.subscribe();
    drop(engine);

    loop {
        match events.recv().await {
            Ok(PlaybackEvent::TrackSkipped { track }) => {
                warn!(track = %track, "track skipped");
            }
            Ok(PlaybackEvent::PlaylistExhausted { attempts }) => {
                warn!(attempts, "nothing in the playlist could be played");
            }
            Ok(event) => info!(?event, "playback event"),
            Err(RecvError::Lagged(missed)) => warn!(missed, "event log lagging"),
            Err(RecvError::Closed) => break,
        }
    }
}

fn list_devices() -> anyhow::Result<()> {
    let devices = list_output_devices()?;
    if devices.is_empty() {
        println!("No output devices found");
    }
    for name in devices {
        println!("{name}");
    }
    Ok(())
}

async fn probe(url: &str, config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = PlayerConfig::load(config_path)?;
    let cache = BufferCache::new(Arc::new(config.fetch.fetcher()?));
    let decoder = TrackDecoder::new(SampleRate::new(config.output.sample_rate));

    let buffer = cache
        .try_load(&Track::new(url, url), decoder)
        .await
        .with_context(|| format!("probing {url}"))?;

    println!(
        "{url}: {:.2} s, {} frames at {} Hz",
        buffer.duration_secs(),
        buffer.frames(),
        buffer.sample_rate().as_hz()
    );
    Ok(())
}
