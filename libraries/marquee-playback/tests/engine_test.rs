//! Engine scenario tests
//!
//! Every test runs on a paused tokio clock with the null destination, so
//! the audio clock advances exactly as far as the test sleeps. Tracks are
//! 10 s of constant-level 8 kHz WAV served from memory.

use async_trait::async_trait;
use marquee_audio::{OutputKind, TapStream};
use marquee_core::{AudioConfig, MarqueeError, SampleRate, Track, TrackFetcher};
use marquee_playback::{AudioEngine, PlaybackEvent, PlaybackPhase, ScriptedRandom};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::sleep;

const RATE: u32 = 8_000;
const TRACK_SECS: u32 = 10;
const LEVEL: i16 = 1_000;

fn wav(seconds: u32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for _ in 0..RATE * seconds {
            writer.write_sample(LEVEL).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

/// Serves `.wav` URLs; everything else is a 404. Can be switched offline.
struct MemoryFetcher {
    body: Vec<u8>,
    offline: AtomicBool,
    latency: Duration,
}

impl MemoryFetcher {
    fn new() -> Arc<Self> {
        Self::with_latency(Duration::ZERO)
    }

    fn with_latency(latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            body: wav(TRACK_SECS),
            offline: AtomicBool::new(false),
            latency,
        })
    }
}

#[async_trait]
impl TrackFetcher for MemoryFetcher {
    async fn fetch(&self, url: &str) -> marquee_core::Result<Vec<u8>> {
        if !self.latency.is_zero() {
            sleep(self.latency).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(MarqueeError::network("offline"));
        }
        if url.ends_with(".wav") {
            Ok(self.body.clone())
        } else {
            Err(MarqueeError::HttpStatus {
                url: url.to_string(),
                status: 404,
            })
        }
    }
}

fn config(urls: &[&str], crossfade: f64) -> AudioConfig {
    AudioConfig {
        tracks: urls
            .iter()
            .map(|url| Track::new(url.trim_start_matches('/'), *url))
            .collect(),
        crossfade_duration_s: crossfade,
        ..AudioConfig::default()
    }
}

fn engine_with(config: AudioConfig, fetcher: Arc<MemoryFetcher>) -> AudioEngine {
    AudioEngine::new(
        config,
        fetcher,
        OutputKind::Null {
            sample_rate: SampleRate::new(RATE),
        },
    )
}

fn engine(config: AudioConfig) -> AudioEngine {
    engine_with(config, MemoryFetcher::new())
}

fn drain(events: &mut broadcast::Receiver<PlaybackEvent>) -> Vec<PlaybackEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

fn current_url(engine: &AudioEngine) -> Option<String> {
    engine.current_track().map(|track| track.url)
}

/// Last sample the tap delivers over the next `window`
async fn level_after(tap: &TapStream, window: Duration) -> f32 {
    tap.drain();
    sleep(window).await;
    *tap.drain().last().unwrap().last().unwrap()
}

#[tokio::test(start_paused = true)]
async fn crossfade_cycle_follows_track_timing() {
    let engine = engine(config(&["/a.wav", "/b.wav"], 2.0));
    let mut events = engine.subscribe();

    engine.init().await;
    assert_eq!(engine.phase(), PlaybackPhase::Stopped);
    assert_eq!(engine.cache().len(), 2);

    engine.play().await;
    assert!(engine.is_playing());
    assert_eq!(engine.phase(), PlaybackPhase::PlayingSingle);
    assert_eq!(current_url(&engine).as_deref(), Some("/a.wav"));

    // Trigger fires at D - C = 8 s
    sleep(Duration::from_millis(7_900)).await;
    assert_eq!(engine.phase(), PlaybackPhase::PlayingSingle);

    sleep(Duration::from_millis(500)).await;
    assert_eq!(engine.phase(), PlaybackPhase::Crossfading);
    assert_eq!(engine.live_slots(), 2);
    assert_eq!(current_url(&engine).as_deref(), Some("/b.wav"));

    // Cutover C later
    sleep(Duration::from_millis(1_650)).await;
    assert_eq!(engine.phase(), PlaybackPhase::PlayingSingle);
    assert_eq!(engine.live_slots(), 1);
    assert_eq!(current_url(&engine).as_deref(), Some("/b.wav"));

    // Next trigger D - 2C after the cutover, wrapping back to A
    sleep(Duration::from_millis(6_000)).await;
    assert_eq!(engine.phase(), PlaybackPhase::Crossfading);
    assert_eq!(current_url(&engine).as_deref(), Some("/a.wav"));

    let events = drain(&mut events);
    let a = Track::new("a.wav", "/a.wav");
    let b = Track::new("b.wav", "/b.wav");
    assert_eq!(events[0], PlaybackEvent::TrackStarted { track: a.clone() });
    assert_eq!(
        events[1],
        PlaybackEvent::CrossfadeStarted {
            from: a.clone(),
            to: b.clone(),
            duration_ms: 2_000
        }
    );
    assert_eq!(events[2], PlaybackEvent::CutoverCompleted { track: b.clone() });
    assert_eq!(
        events[3],
        PlaybackEvent::CrossfadeStarted {
            from: b,
            to: a,
            duration_ms: 2_000
        }
    );
}

#[tokio::test(start_paused = true)]
async fn unloadable_tracks_are_skipped() {
    let engine = engine(config(&["/a.wav", "/missing.mp3", "/b.wav"], 2.0));
    let mut events = engine.subscribe();

    engine.init().await;
    assert_eq!(engine.cache().len(), 2);
    engine.play().await;

    sleep(Duration::from_millis(8_500)).await;
    assert_eq!(engine.phase(), PlaybackPhase::Crossfading);
    assert_eq!(current_url(&engine).as_deref(), Some("/b.wav"));

    let skipped: Vec<_> = drain(&mut events)
        .into_iter()
        .filter_map(|event| match event {
            PlaybackEvent::TrackSkipped { track } => Some(track.url),
            _ => None,
        })
        .collect();
    assert_eq!(skipped, vec!["/missing.mp3"]);
}

#[tokio::test(start_paused = true)]
async fn nothing_playable_fails_closed() {
    let fetcher = MemoryFetcher::new();
    fetcher.offline.store(true, Ordering::SeqCst);
    let engine = engine_with(config(&["/a.wav", "/b.wav"], 2.0), fetcher);
    let mut events = engine.subscribe();

    engine.init().await;
    assert!(engine.cache().is_empty());

    engine.play().await;
    assert!(!engine.is_playing());
    assert_eq!(engine.phase(), PlaybackPhase::Stopped);

    let events = drain(&mut events);
    let skips = events
        .iter()
        .filter(|event| matches!(event, PlaybackEvent::TrackSkipped { .. }))
        .count();
    assert_eq!(skips, 2);
    assert_eq!(
        events.last(),
        Some(&PlaybackEvent::PlaylistExhausted { attempts: 2 })
    );

    // Nothing pending: time passing changes nothing
    sleep(Duration::from_secs(30)).await;
    assert_eq!(engine.phase(), PlaybackPhase::Stopped);
}

#[tokio::test(start_paused = true)]
async fn failure_at_trigger_stops_playback() {
    let fetcher = MemoryFetcher::new();
    let engine = engine_with(config(&["/a.wav", "/b.wav"], 2.0), fetcher.clone());
    let mut events = engine.subscribe();

    engine.init().await;
    engine.play().await;
    assert!(engine.is_playing());

    engine.cache().clear();
    fetcher.offline.store(true, Ordering::SeqCst);

    sleep(Duration::from_millis(8_500)).await;
    assert!(!engine.is_playing());
    assert_eq!(engine.live_slots(), 0);
    assert!(drain(&mut events)
        .iter()
        .any(|event| matches!(event, PlaybackEvent::PlaylistExhausted { .. })));
}

#[tokio::test(start_paused = true)]
async fn stop_mid_crossfade_cancels_cutover() {
    let engine = engine(config(&["/a.wav", "/b.wav"], 2.0));
    let mut events = engine.subscribe();
    engine.init().await;
    engine.play().await;

    sleep(Duration::from_millis(8_500)).await;
    assert_eq!(engine.phase(), PlaybackPhase::Crossfading);

    engine.stop();
    assert_eq!(engine.phase(), PlaybackPhase::Stopped);
    assert_eq!(engine.live_slots(), 0);
    assert_eq!(drain(&mut events).last(), Some(&PlaybackEvent::Stopped));

    sleep(Duration::from_secs(20)).await;
    assert_eq!(engine.phase(), PlaybackPhase::Stopped);
    assert!(drain(&mut events).is_empty());

    // Stopping twice is harmless and silent
    engine.stop();
    assert!(drain(&mut events).is_empty());

    // Play resumes from the playlist's current entry
    engine.play().await;
    assert_eq!(current_url(&engine).as_deref(), Some("/b.wav"));
}

#[tokio::test(start_paused = true)]
async fn play_twice_is_a_no_op() {
    let engine = engine(config(&["/a.wav", "/b.wav"], 2.0));
    engine.init().await;

    tokio::join!(engine.play(), engine.play());
    assert_eq!(engine.live_slots(), 1);

    engine.play().await;
    assert_eq!(engine.live_slots(), 1);
    assert_eq!(current_url(&engine).as_deref(), Some("/a.wav"));
}

#[tokio::test(start_paused = true)]
async fn operations_before_init_are_ignored() {
    let engine = engine(config(&["/a.wav"], 2.0));

    engine.play().await;
    assert!(!engine.is_playing());
    assert_eq!(engine.phase(), PlaybackPhase::Idle);
    assert!(engine.create_export_stream().is_none());

    let mut update = config(&["/b.wav"], 1.0);
    update.volume = 0.3;
    engine.update(update);
    assert_eq!(engine.volume(), 0.3);
    assert_eq!(engine.config().tracks.len(), 1);

    engine.stop();
    engine.destroy();
}

#[tokio::test(start_paused = true)]
async fn empty_playlist_does_not_play() {
    let engine = engine(config(&[], 2.0));
    engine.init().await;
    engine.play().await;
    assert!(!engine.is_playing());
    assert_eq!(engine.phase(), PlaybackPhase::Stopped);
}

#[tokio::test(start_paused = true)]
async fn volume_changes_ramp_the_live_mix() {
    let engine = engine(config(&["/a.wav"], 2.0));
    engine.init().await;
    engine.play().await;

    let tap = engine.create_export_stream().unwrap();
    sleep(Duration::from_millis(200)).await;
    let before = *tap.drain().last().unwrap().last().unwrap();
    assert!(before > 0.0);

    engine.set_volume(0.4);
    sleep(Duration::from_millis(200)).await;
    let after = *tap.drain().last().unwrap().last().unwrap();
    assert!((after / before - 0.5).abs() < 0.01, "{before} -> {after}");

    assert!(engine.toggle_mute());
    sleep(Duration::from_millis(200)).await;
    let muted = *tap.drain().last().unwrap().last().unwrap();
    assert!(muted.abs() < 1e-6);

    // Unmuting restores the stored volume
    assert!(!engine.toggle_mute());
    sleep(Duration::from_millis(200)).await;
    let restored = *tap.drain().last().unwrap().last().unwrap();
    assert!((restored - after).abs() < 1e-4);
}

#[tokio::test(start_paused = true)]
async fn volume_set_while_muted_applies_on_unmute() {
    let engine = engine(config(&["/a.wav"], 2.0));
    engine.init().await;
    engine.play().await;
    let tap = engine.create_export_stream().unwrap();
    sleep(Duration::from_millis(200)).await;
    let at_default = *tap.drain().last().unwrap().last().unwrap();

    engine.toggle_mute();
    engine.set_volume(0.4);
    sleep(Duration::from_millis(200)).await;
    let muted = *tap.drain().last().unwrap().last().unwrap();
    assert!(muted.abs() < 1e-6);

    engine.toggle_mute();
    sleep(Duration::from_millis(200)).await;
    let unmuted = *tap.drain().last().unwrap().last().unwrap();
    assert!((unmuted / at_default - 0.5).abs() < 0.01);
}

#[tokio::test(start_paused = true)]
async fn second_export_stream_replaces_first() {
    let engine = engine(config(&["/a.wav"], 2.0));
    engine.init().await;
    engine.play().await;

    let first = engine.create_export_stream().unwrap();
    let second = engine.create_export_stream().unwrap();
    assert_ne!(first.id(), second.id());
    sleep(Duration::from_millis(100)).await;

    assert!(first.receiver().try_recv().is_err());
    assert!(!second.drain().is_empty());

    engine.stop_export_stream();
    sleep(Duration::from_millis(100)).await;
    second.drain();
    sleep(Duration::from_millis(100)).await;
    assert!(second.drain().is_empty());
}

#[tokio::test(start_paused = true)]
async fn zero_crossfade_loops_a_single_track() {
    let engine = engine(config(&["/a.wav"], 0.0));
    engine.init().await;
    engine.play().await;

    sleep(Duration::from_millis(10_500)).await;
    assert!(engine.is_playing());
    assert_eq!(current_url(&engine).as_deref(), Some("/a.wav"));
    assert!(engine.live_slots() >= 1);
}

#[tokio::test(start_paused = true)]
async fn update_keeps_playing_with_new_playlist() {
    let engine = engine(config(&["/a.wav", "/b.wav"], 2.0));
    engine.init().await;
    engine.play().await;

    let mut next = config(&["/c.wav"], 2.0);
    next.volume = 0.5;
    engine.update(next);
    assert!(engine.is_playing());
    assert_eq!(current_url(&engine).as_deref(), Some("/a.wav"));

    sleep(Duration::from_millis(8_500)).await;
    assert_eq!(current_url(&engine).as_deref(), Some("/c.wav"));
}

#[tokio::test(start_paused = true)]
async fn shuffle_uses_the_random_source() {
    let config = AudioConfig {
        shuffle: true,
        ..config(&["/a.wav", "/b.wav", "/c.wav"], 2.0)
    };
    let engine = AudioEngine::with_random(
        config,
        MemoryFetcher::new(),
        OutputKind::Null {
            sample_rate: SampleRate::new(RATE),
        },
        Box::new(ScriptedRandom::new(vec![0.5, 0.3])),
    );
    engine.init().await;
    engine.play().await;

    // [0.5, 0.3] shuffles [a, b, c] into [c, a, b]
    assert_eq!(current_url(&engine).as_deref(), Some("/c.wav"));
}

#[tokio::test(start_paused = true)]
async fn destroy_then_init_starts_fresh() {
    let engine = engine(config(&["/a.wav", "/b.wav"], 2.0));
    engine.init().await;
    engine.play().await;

    engine.destroy();
    assert_eq!(engine.phase(), PlaybackPhase::Idle);
    assert!(!engine.is_playing());
    assert!(engine.cache().is_empty());
    assert!(engine.create_export_stream().is_none());

    engine.init().await;
    assert_eq!(engine.phase(), PlaybackPhase::Stopped);
    assert_eq!(engine.cache().len(), 2);
    engine.play().await;
    assert!(engine.is_playing());
}

#[tokio::test(start_paused = true)]
async fn destroy_during_init_leaves_nothing_cached() {
    let engine = engine_with(
        config(&["/a.wav", "/b.wav"], 2.0),
        MemoryFetcher::with_latency(Duration::from_secs(1)),
    );

    let init = tokio::spawn({
        let engine = engine.clone();
        async move { engine.init().await }
    });
    sleep(Duration::from_millis(100)).await;
    engine.destroy();
    init.await.unwrap();

    assert!(!engine.is_initialized());
    assert!(engine.cache().is_empty());

    // A fresh init preloads normally
    engine.init().await;
    assert_eq!(engine.cache().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn mute_and_volume_during_crossfade_reach_every_slot() {
    let engine = engine(config(&["/a.wav", "/b.wav"], 2.0));
    engine.init().await;
    engine.play().await;
    let tap = engine.create_export_stream().unwrap();

    sleep(Duration::from_millis(7_300)).await;
    let solo = level_after(&tap, Duration::from_millis(200)).await;
    assert!(solo > 0.0);

    sleep(Duration::from_millis(900)).await;
    assert_eq!(engine.phase(), PlaybackPhase::Crossfading);

    assert!(engine.toggle_mute());
    let muted = level_after(&tap, Duration::from_millis(200)).await;
    assert!(muted.abs() < 1e-6, "muted mix still at {muted}");
    assert_eq!(engine.live_slots(), 2);

    // Unmuted mid-fade: the incoming track lands on the new volume when the
    // fade would have ended, the outgoing one stays silent
    assert!(!engine.toggle_mute());
    engine.set_volume(0.4);
    let rising = level_after(&tap, Duration::from_millis(500)).await;
    assert!(rising > 0.0 && rising < solo * 0.5, "{rising} vs solo {solo}");

    sleep(Duration::from_millis(1_200)).await;
    assert_eq!(engine.phase(), PlaybackPhase::PlayingSingle);
    let after = level_after(&tap, Duration::from_millis(200)).await;
    assert!((after / solo - 0.5).abs() < 0.01, "solo {solo}, after {after}");
}

#[tokio::test(start_paused = true)]
async fn volume_ramp_running_at_trigger_stays_continuous() {
    let engine = engine(config(&["/a.wav", "/b.wav"], 2.0));
    engine.init().await;
    engine.play().await;
    let tap = engine.create_export_stream().unwrap();

    sleep(Duration::from_millis(7_980)).await;
    tap.drain();
    // 50 ms ramp still running when the crossfade starts at 8 s
    engine.set_volume(0.4);
    sleep(Duration::from_millis(200)).await;
    assert_eq!(engine.phase(), PlaybackPhase::Crossfading);

    let samples: Vec<f32> = tap.drain().into_iter().flatten().collect();
    assert!(samples.len() > 1_000);
    let largest_step = samples
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).abs())
        .fold(0.0f32, f32::max);
    assert!(largest_step < 1e-3, "gain stepped by {largest_step}");
}

#[tokio::test(start_paused = true)]
async fn update_reports_volume_only_when_it_changes() {
    let engine = engine(config(&["/a.wav"], 2.0));
    let mut events = engine.subscribe();
    engine.init().await;

    engine.update(config(&["/a.wav", "/b.wav"], 2.0));
    assert!(drain(&mut events).is_empty());

    let mut quieter = config(&["/a.wav", "/b.wav"], 2.0);
    quieter.volume = 0.5;
    engine.update(quieter);
    assert_eq!(
        drain(&mut events),
        vec![PlaybackEvent::VolumeChanged {
            volume: 0.5,
            muted: false
        }]
    );
}
