//! Crossfade scheduler
//!
//! The engine loops the playlist with overlapping fades. Timing runs on two
//! clocks: tokio timers decide *when* the next step happens, and the audio
//! clock decides *where* gain ramps are anchored.
//!
//! ```text
//! Idle --init--> Stopped --play--> PlayingSingle --trigger--> Crossfading
//!                   ^                    ^                         |
//!                   |                    +---------cutover---------+
//!                   +------------------stop------------------------+
//! ```
//!
//! Each step schedules the next one: a track's trigger fires `D - C` into
//! it, the cutover `C` later, and the cutover schedules the next trigger.
//! Deferred steps carry the playback generation they were scheduled under;
//! `stop()` bumps the generation so late steps find themselves stale.

use crate::cache::BufferCache;
use crate::events::{PlaybackEvent, PlaybackPhase, EVENT_CHANNEL_CAPACITY};
use crate::playlist::{PlaylistSequencer, RandomSource, StdRandom};
use crate::slots::{Slot, Slots};
use crate::volume::{VolumeControl, MUTE_RAMP, VOLUME_RAMP};
use marquee_audio::{
    AudioContext, DecodedBuffer, OutputKind, TapId, TapStream, TrackDecoder, VoiceId,
    DEFAULT_TAP_CAPACITY,
};
use marquee_core::{AudioConfig, Track, TrackFetcher};
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc::UnboundedReceiver};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActionKind {
    Trigger,
    Cutover,
}

/// The one deferred step the engine is waiting on
struct PendingAction {
    id: u64,
    kind: ActionKind,
    handle: JoinHandle<()>,
}

struct EngineState {
    config: AudioConfig,
    volume: VolumeControl,
    playlist: PlaylistSequencer,
    context: Option<AudioContext>,
    slots: Slots,
    playing: bool,
    generation: u64,
    pending: Option<PendingAction>,
    next_action: u64,
    watcher: Option<JoinHandle<()>>,
    tap: Option<TapId>,
}

impl EngineState {
    fn cancel_pending(&mut self) {
        if let Some(action) = self.pending.take() {
            action.handle.abort();
            trace!(kind = ?action.kind, "cancelled pending action");
        }
    }

    /// Whether action `id`, scheduled under `generation`, may still run
    ///
    /// Clears the pending entry without aborting it: the caller *is* that task.
    fn claim(&mut self, id: u64, generation: u64) -> bool {
        if self.generation != generation || !self.playing {
            return false;
        }
        match &self.pending {
            Some(action) if action.id == id => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }

    /// Silence everything and invalidate in-flight work; returns whether we were playing
    fn halt(&mut self) -> bool {
        self.generation += 1;
        self.cancel_pending();
        self.slots.stop_all();
        mem::replace(&mut self.playing, false)
    }

    /// Ramp live slots toward the volume target over `window`
    ///
    /// Mid-crossfade the fade shape is kept: the outgoing slot still lands
    /// on silence and the incoming one reaches the target when the fade
    /// would have ended. Muting pulls both down over `window`.
    fn ramp_live_gains(&self, window: Duration) {
        let Some(ctx) = &self.context else {
            return;
        };
        let now = ctx.current_time();
        let target = self.volume.target();
        let window = window.as_secs_f64();

        match &self.slots {
            Slots::Empty => {}
            Slots::Single(slot) => slot.voice.gain().ramp_to(target, now, window),
            Slots::Crossfading {
                outgoing,
                incoming,
                ends_at,
            } => {
                let remaining = (ends_at - now).max(window);
                if target > 0.0 {
                    outgoing.voice.gain().ramp_to(0.0, now, remaining);
                    incoming.voice.gain().ramp_to(target, now, remaining);
                } else {
                    outgoing.voice.gain().ramp_to(0.0, now, window);
                    incoming.voice.gain().ramp_to(0.0, now, window);
                }
            }
        }
    }
}

struct EngineInner {
    state: Mutex<EngineState>,
    cache: BufferCache,
    events: broadcast::Sender<PlaybackEvent>,
    output: OutputKind,
}

/// Result of walking the playlist for something that loads
enum Candidate {
    Ready(Track, Arc<DecodedBuffer>),
    Exhausted(usize),
    Superseded,
}

/// Kiosk audio engine
///
/// A cheap, cloneable handle; clones drive the same engine. Deferred steps
/// only hold weak references, so dropping every handle tears the engine
/// down (the audio context closes with it).
///
/// Operations on an engine that has not been initialized are ignored.
#[derive(Clone)]
pub struct AudioEngine {
    inner: Arc<EngineInner>,
}

impl AudioEngine {
    /// Engine for `config`, fetching with `fetcher`, playing to `output`
    pub fn new(config: AudioConfig, fetcher: Arc<dyn TrackFetcher>, output: OutputKind) -> Self {
        Self::with_random(config, fetcher, output, Box::new(StdRandom::default()))
    }

    /// Like [`new`](Self::new) with a specific shuffle source
    pub fn with_random(
        config: AudioConfig,
        fetcher: Arc<dyn TrackFetcher>,
        output: OutputKind,
        random: Box<dyn RandomSource>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let playlist = PlaylistSequencer::with_random(config.tracks.clone(), config.shuffle, random);

        let state = EngineState {
            volume: VolumeControl::new(config.volume),
            config,
            playlist,
            context: None,
            slots: Slots::Empty,
            playing: false,
            generation: 0,
            pending: None,
            next_action: 0,
            watcher: None,
            tap: None,
        };

        Self {
            inner: Arc::new(EngineInner {
                state: Mutex::new(state),
                cache: BufferCache::new(fetcher),
                events,
                output,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: PlaybackEvent) {
        // No subscribers is fine
        let _ = self.inner.events.send(event);
    }

    /// Open the output and preload every configured track
    ///
    /// Idempotent. Never fails: if the output cannot be opened the error is
    /// logged and the engine stays idle.
    pub async fn init(&self) {
        let (decoder, tracks) = {
            let mut guard = self.lock();
            let state = &mut *guard;
            if state.context.is_some() {
                return;
            }

            let mut context = match AudioContext::open(&self.inner.output) {
                Ok(context) => context,
                Err(e) => {
                    error!(error = %e, "failed to open audio output");
                    return;
                }
            };
            if let Some(ended) = context.take_ended_receiver() {
                let engine = Arc::downgrade(&self.inner);
                state.watcher = Some(tokio::spawn(watch_voice_ends(engine, ended)));
            }

            let decoder = context.decoder();
            state.context = Some(context);
            (decoder, state.config.tracks.clone())
        };

        let report = self.inner.cache.preload(&tracks, decoder).await;
        if !self.is_initialized() {
            debug!("engine destroyed during preload");
            return;
        }
        info!(
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            "audio engine initialized"
        );
    }

    /// Start the playlist at its current track
    ///
    /// Ignored when uninitialized, already playing, or the playlist is
    /// empty. Tracks that fail to load are skipped, each at most once; if
    /// none loads the engine stays stopped.
    pub async fn play(&self) {
        let (generation, decoder) = {
            let mut state = self.lock();
            let Some(ctx) = state.context.as_ref() else {
                debug!("play ignored: engine not initialized");
                return;
            };
            let decoder = ctx.decoder();
            if state.playing {
                debug!("play ignored: already playing");
                return;
            }
            if state.playlist.is_empty() {
                debug!("play ignored: playlist is empty");
                return;
            }
            // Claimed before loading so a concurrent play() is a no-op
            state.playing = true;
            (state.generation, decoder)
        };

        match self.next_playable(generation, decoder, false).await {
            Candidate::Ready(track, buffer) => {
                let mut state = self.lock();
                if state.generation == generation && state.playing {
                    self.start_single(&mut state, track, buffer);
                }
            }
            Candidate::Exhausted(attempts) => self.fail_closed(generation, attempts),
            Candidate::Superseded => {}
        }
    }

    /// Stop every slot and cancel the pending step; safe to call any time
    pub fn stop(&self) {
        let was_playing = self.lock().halt();
        if was_playing {
            info!("playback stopped");
            self.emit(PlaybackEvent::Stopped);
        }
    }

    /// Replace the configuration
    ///
    /// Volume and playlist take effect immediately (a `VolumeChanged` event
    /// only when the volume differs); playback is neither
    /// stopped nor restarted. The playlist starts over from its first entry
    /// at the next track change.
    pub fn update(&self, config: AudioConfig) {
        let (volume, muted, changed) = {
            let mut guard = self.lock();
            let state = &mut *guard;
            let previous = state.volume.volume();
            let volume = state.volume.set_volume(config.volume);
            state
                .playlist
                .update(config.tracks.clone(), config.shuffle);
            state.config = config;

            let muted = state.volume.is_muted();
            let changed = (volume - previous).abs() > f32::EPSILON;
            if changed && !muted {
                state.ramp_live_gains(VOLUME_RAMP);
            }
            debug!(tracks = state.playlist.len(), volume, "configuration updated");
            (volume, muted, changed)
        };
        if changed {
            self.emit(PlaybackEvent::VolumeChanged { volume, muted });
        }
    }

    /// Stop, detach the tap, close the output and drop cached buffers
    ///
    /// A later [`init`](Self::init) starts from scratch.
    pub fn destroy(&self) {
        let (context, was_playing) = {
            let mut guard = self.lock();
            let state = &mut *guard;
            let was_playing = state.halt();
            if let (Some(ctx), Some(tap)) = (state.context.as_ref(), state.tap.take()) {
                ctx.detach_tap(tap);
            }
            if let Some(watcher) = state.watcher.take() {
                watcher.abort();
            }
            (state.context.take(), was_playing)
        };

        if was_playing {
            self.emit(PlaybackEvent::Stopped);
        }
        if let Some(mut context) = context {
            context.close();
            info!("audio engine destroyed");
        }
        self.inner.cache.clear();
    }

    /// Flip mute; live slots ramp to the new target over 100 ms
    pub fn toggle_mute(&self) -> bool {
        let (volume, muted) = {
            let mut state = self.lock();
            let muted = state.volume.toggle_mute();
            state.ramp_live_gains(MUTE_RAMP);
            (state.volume.volume(), muted)
        };
        debug!(muted, "mute toggled");
        self.emit(PlaybackEvent::VolumeChanged { volume, muted });
        muted
    }

    pub fn is_muted(&self) -> bool {
        self.lock().volume.is_muted()
    }

    pub fn volume(&self) -> f32 {
        self.lock().volume.volume()
    }

    /// Set the volume (clamped to `[0, 1]`)
    ///
    /// While muted the value is only stored. Otherwise live slots ramp to
    /// it over 50 ms.
    pub fn set_volume(&self, volume: f32) {
        let (volume, muted) = {
            let mut state = self.lock();
            let volume = state.volume.set_volume(volume);
            let muted = state.volume.is_muted();
            if !muted {
                state.ramp_live_gains(VOLUME_RAMP);
            }
            (volume, muted)
        };
        self.emit(PlaybackEvent::VolumeChanged { volume, muted });
    }

    /// Tap the mixed output
    ///
    /// `None` before [`init`](Self::init). A second call replaces the
    /// previous tap, whose receiver then disconnects.
    pub fn create_export_stream(&self) -> Option<TapStream> {
        let mut guard = self.lock();
        let state = &mut *guard;
        let Some(ctx) = state.context.as_ref() else {
            debug!("export stream requested before init");
            return None;
        };

        if let Some(previous) = state.tap.take() {
            ctx.detach_tap(previous);
        }
        let tap = ctx.attach_tap(DEFAULT_TAP_CAPACITY);
        state.tap = Some(tap.id());
        Some(tap)
    }

    /// Detach the tap, if any
    pub fn stop_export_stream(&self) {
        let mut guard = self.lock();
        let state = &mut *guard;
        if let (Some(ctx), Some(tap)) = (state.context.as_ref(), state.tap.take()) {
            ctx.detach_tap(tap);
        }
    }

    pub fn phase(&self) -> PlaybackPhase {
        let state = self.lock();
        if state.context.is_none() {
            PlaybackPhase::Idle
        } else {
            state.slots.phase()
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.lock().context.is_some()
    }

    pub fn is_playing(&self) -> bool {
        self.lock().playing
    }

    /// Slots currently sounding (2 only while crossfading)
    pub fn live_slots(&self) -> usize {
        self.lock().slots.len()
    }

    /// Track of the current slot (the incoming one mid-crossfade)
    pub fn current_track(&self) -> Option<Track> {
        self.lock().slots.current().map(|slot| slot.track.clone())
    }

    pub fn config(&self) -> AudioConfig {
        self.lock().config.clone()
    }

    /// Audio clock of the open context, in seconds
    pub fn current_time(&self) -> Option<f64> {
        self.lock().context.as_ref().map(AudioContext::current_time)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.inner.events.subscribe()
    }

    pub fn cache(&self) -> &BufferCache {
        &self.inner.cache
    }

    /// Walk the playlist until a track loads, trying each entry at most once
    ///
    /// Starts at the current entry, or the next one when `advance_first`.
    async fn next_playable(
        &self,
        generation: u64,
        decoder: TrackDecoder,
        advance_first: bool,
    ) -> Candidate {
        let attempts = self.lock().playlist.len();

        for attempt in 0..attempts {
            let track = {
                let mut state = self.lock();
                if state.generation != generation {
                    return Candidate::Superseded;
                }
                let next = if advance_first || attempt > 0 {
                    state.playlist.next()
                } else {
                    state.playlist.current()
                };
                match next {
                    Some(track) => track.clone(),
                    None => return Candidate::Exhausted(attempt),
                }
            };

            if let Some(buffer) = self.inner.cache.load(&track, decoder).await {
                return Candidate::Ready(track, buffer);
            }
            self.emit(PlaybackEvent::TrackSkipped { track });
        }

        Candidate::Exhausted(attempts)
    }

    /// Nothing in the playlist loads: stop and stay stopped
    fn fail_closed(&self, generation: u64, attempts: usize) {
        {
            let mut state = self.lock();
            if state.generation != generation {
                return;
            }
            state.halt();
        }
        warn!(attempts, "no playable track in playlist, stopping");
        self.emit(PlaybackEvent::PlaylistExhausted { attempts });
    }

    /// Make `track` the only slot and schedule its crossfade trigger
    fn start_single(&self, state: &mut EngineState, track: Track, buffer: Arc<DecodedBuffer>) {
        let Some(ctx) = state.context.as_ref() else {
            return;
        };
        let voice = ctx.start_voice(Arc::clone(&buffer), state.volume.target());
        let duration = buffer.duration();
        let delay = duration.saturating_sub(state.config.crossfade_duration());

        info!(
            track = %track.name,
            seconds = duration.as_secs_f64(),
            "track started"
        );
        state.slots = Slots::Single(Slot::new(voice, track.clone(), duration));
        self.schedule(state, ActionKind::Trigger, delay);
        self.emit(PlaybackEvent::TrackStarted { track });
    }

    /// Replace the pending step with `kind` after `delay`
    fn schedule(&self, state: &mut EngineState, kind: ActionKind, delay: Duration) {
        state.cancel_pending();

        let id = state.next_action;
        state.next_action += 1;
        let generation = state.generation;
        let engine = Arc::downgrade(&self.inner);

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = engine.upgrade() {
                AudioEngine { inner }.run_action(id, kind, generation).await;
            }
        });

        trace!(?kind, delay_ms = delay.as_millis() as u64, generation, "scheduled");
        state.pending = Some(PendingAction { id, kind, handle });
    }

    async fn run_action(&self, id: u64, kind: ActionKind, generation: u64) {
        match kind {
            ActionKind::Trigger => self.on_trigger(id, generation).await,
            ActionKind::Cutover => self.on_cutover(id, generation),
        }
    }

    /// Start fading the next track in over the current one
    async fn on_trigger(&self, id: u64, generation: u64) {
        let decoder = {
            let mut state = self.lock();
            if !state.claim(id, generation) {
                return;
            }
            match &state.context {
                Some(ctx) => ctx.decoder(),
                None => return,
            }
        };

        let (track, buffer) = match self.next_playable(generation, decoder, true).await {
            Candidate::Ready(track, buffer) => (track, buffer),
            Candidate::Exhausted(attempts) => {
                self.fail_closed(generation, attempts);
                return;
            }
            Candidate::Superseded => return,
        };

        let mut guard = self.lock();
        let state = &mut *guard;
        if state.generation != generation || !state.playing {
            return;
        }
        let Some(ctx) = state.context.as_ref() else {
            return;
        };

        let outgoing = match state.slots.take() {
            Slots::Single(slot) => Some(slot),
            Slots::Crossfading {
                outgoing, incoming, ..
            } => {
                outgoing.stop_quietly();
                Some(incoming)
            }
            Slots::Empty => None,
        }
        .filter(|slot| slot.voice.is_active());

        let Some(outgoing) = outgoing else {
            debug!(track = %track.name, "previous track already ended, starting without crossfade");
            self.start_single(state, track, buffer);
            return;
        };

        let fade = state.config.crossfade_duration();
        let fade_secs = fade.as_secs_f64();
        let target = state.volume.target();
        let now = ctx.current_time();

        // Out from the gain held now, which may be mid volume ramp
        outgoing.voice.gain().ramp_to(0.0, now, fade_secs);
        let voice = ctx.start_voice(Arc::clone(&buffer), 0.0);
        voice.gain().fade(0.0, target, now, fade_secs);

        info!(
            from = %outgoing.track.name,
            to = %track.name,
            seconds = fade_secs,
            "crossfade started"
        );
        let event = PlaybackEvent::CrossfadeStarted {
            from: outgoing.track.clone(),
            to: track.clone(),
            duration_ms: u64::try_from(fade.as_millis()).unwrap_or(u64::MAX),
        };

        state.slots = Slots::Crossfading {
            outgoing,
            incoming: Slot::new(voice, track, buffer.duration()),
            ends_at: now + fade_secs,
        };
        self.schedule(state, ActionKind::Cutover, fade);
        self.emit(event);
    }

    /// Release the outgoing track and schedule the next trigger
    fn on_cutover(&self, id: u64, generation: u64) {
        let mut guard = self.lock();
        let state = &mut *guard;
        if !state.claim(id, generation) {
            return;
        }

        match state.slots.take() {
            Slots::Crossfading {
                outgoing, incoming, ..
            } => {
                outgoing.stop_quietly();

                let fade = state.config.crossfade_duration();
                let delay = incoming.duration.saturating_sub(fade.saturating_mul(2));
                let track = incoming.track.clone();
                debug!(track = %track.name, "cutover complete");

                state.slots = Slots::Single(incoming);
                self.schedule(state, ActionKind::Trigger, delay);
                self.emit(PlaybackEvent::CutoverCompleted { track });
            }
            other => {
                state.slots = other;
                debug!("cutover with no crossfade in progress");
            }
        }
    }

    /// A voice played to the end on its own
    fn on_voice_ended(&self, id: VoiceId) {
        let mut state = self.lock();
        if !state.slots.is_single_voice(id) {
            trace!(voice = %id, "ignoring end of non-current voice");
            return;
        }
        if let Slots::Single(slot) = state.slots.take() {
            info!(track = %slot.track.name, "track ended before crossfade");
            self.emit(PlaybackEvent::TrackEnded { track: slot.track });
        }
    }
}

impl std::fmt::Debug for AudioEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("AudioEngine")
            .field("initialized", &state.context.is_some())
            .field("playing", &state.playing)
            .field("slots", &state.slots.len())
            .field("volume", &state.volume)
            .finish_non_exhaustive()
    }
}

/// Forward natural voice endings from the render side to the engine
async fn watch_voice_ends(engine: Weak<EngineInner>, mut ended: UnboundedReceiver<VoiceId>) {
    while let Some(id) = ended.recv().await {
        let Some(inner) = engine.upgrade() else {
            break;
        };
        AudioEngine { inner }.on_voice_ended(id);
    }
}
