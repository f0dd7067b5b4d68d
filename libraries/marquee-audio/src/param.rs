//! Gain automation on the audio clock
//!
//! A [`GainAutomation`] is a timeline of set-points and linear ramps,
//! evaluated by the render thread at each frame's clock time. Control code
//! edits the timeline through a shared [`GainHandle`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One scheduled change
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GainEvent {
    /// Jump to `value` at `time`
    Set { time: f64, value: f32 },
    /// Move linearly from the previous point, arriving at `value` at `time`
    LinearRamp { time: f64, value: f32 },
}

impl GainEvent {
    pub fn time(&self) -> f64 {
        match self {
            Self::Set { time, .. } | Self::LinearRamp { time, .. } => *time,
        }
    }

    pub fn value(&self) -> f32 {
        match self {
            Self::Set { value, .. } | Self::LinearRamp { value, .. } => *value,
        }
    }
}

/// Timeline of gain changes, kept sorted by time
///
/// Before the first event the gain is `base_value`. Ramps start from the
/// point (time and value) of the event before them, or from the base.
#[derive(Debug, Clone, PartialEq)]
pub struct GainAutomation {
    base_time: f64,
    base_value: f32,
    events: Vec<GainEvent>,
}

impl GainAutomation {
    /// Constant gain
    pub fn new(value: f32) -> Self {
        Self {
            base_time: 0.0,
            base_value: value,
            events: Vec::new(),
        }
    }

    pub fn events(&self) -> &[GainEvent] {
        &self.events
    }

    /// Gain at clock time `t` (seconds)
    pub fn value_at(&self, t: f64) -> f32 {
        let (mut t0, mut v0) = (self.base_time, self.base_value);

        for event in &self.events {
            match *event {
                GainEvent::Set { time, value } => {
                    if time > t {
                        return v0;
                    }
                    (t0, v0) = (time, value);
                }
                GainEvent::LinearRamp { time, value } => {
                    if time > t {
                        let span = time - t0;
                        if span <= 0.0 || t <= t0 {
                            return v0;
                        }
                        let frac = ((t - t0) / span) as f32;
                        return v0 + (value - v0) * frac;
                    }
                    (t0, v0) = (time, value);
                }
            }
        }

        v0
    }

    /// Jump to `value` at `time`
    pub fn set_value_at_time(&mut self, value: f32, time: f64) {
        self.insert(GainEvent::Set { time, value });
    }

    /// Ramp linearly from the previous point to `value`, arriving at `end_time`
    pub fn linear_ramp_to_value_at_time(&mut self, value: f32, end_time: f64) {
        self.insert(GainEvent::LinearRamp {
            time: end_time,
            value,
        });
    }

    /// Drop every event at or after `time`
    pub fn cancel_scheduled_values(&mut self, time: f64) {
        self.events.retain(|e| e.time() < time);
    }

    /// Drop events from `time` on, freezing the gain at its value there
    ///
    /// An in-flight ramp is shortened to end at `time` with the value it
    /// had reached, so the curve stays continuous.
    pub fn cancel_and_hold(&mut self, time: f64) {
        let held = self.value_at(time);
        let cut_ramp = self
            .events
            .iter()
            .find(|e| e.time() >= time)
            .is_some_and(|e| matches!(e, GainEvent::LinearRamp { .. }));

        self.cancel_scheduled_values(time);
        if cut_ramp {
            self.events.push(GainEvent::LinearRamp { time, value: held });
        } else {
            self.events.push(GainEvent::Set { time, value: held });
        }
    }

    /// Glide from the value held at `now` to `target` over `duration` seconds
    pub fn ramp_to(&mut self, target: f32, now: f64, duration: f64) {
        self.cancel_and_hold(now);
        if duration > 0.0 {
            self.linear_ramp_to_value_at_time(target, now + duration);
        } else {
            self.set_value_at_time(target, now);
        }
    }

    /// Start at `from` at `start` and ramp to `to` over `duration` seconds
    ///
    /// Anything scheduled from `start` on is replaced. A zero duration is a
    /// hard cut to `to`.
    pub fn fade(&mut self, from: f32, to: f32, start: f64, duration: f64) {
        self.cancel_scheduled_values(start);
        if duration > 0.0 {
            self.set_value_at_time(from, start);
            self.linear_ramp_to_value_at_time(to, start + duration);
        } else {
            self.set_value_at_time(to, start);
        }
    }

    /// Fold events that are entirely in the past into the base
    ///
    /// Called by the render thread so timelines stay short.
    pub fn prune_before(&mut self, t: f64) {
        let settled = self.events.iter().take_while(|e| e.time() <= t).count();
        if settled == 0 {
            return;
        }
        let last = self.events[settled - 1];
        self.base_time = last.time();
        self.base_value = last.value();
        self.events.drain(..settled);
    }

    fn insert(&mut self, event: GainEvent) {
        let at = self
            .events
            .iter()
            .position(|e| e.time() > event.time())
            .unwrap_or(self.events.len());
        self.events.insert(at, event);
    }
}

/// Shared handle on a voice's (or the master bus's) gain timeline
#[derive(Debug, Clone)]
pub struct GainHandle {
    inner: Arc<Mutex<GainAutomation>>,
}

impl GainHandle {
    pub fn new(value: f32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(GainAutomation::new(value))),
        }
    }

    /// Lock the timeline for editing or evaluation
    pub fn lock(&self) -> MutexGuard<'_, GainAutomation> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn value_at(&self, t: f64) -> f32 {
        self.lock().value_at(t)
    }

    pub fn ramp_to(&self, target: f32, now: f64, duration: f64) {
        self.lock().ramp_to(target, now, duration);
    }

    pub fn fade(&self, from: f32, to: f32, start: f64, duration: f64) {
        self.lock().fade(from, to, start, duration);
    }
}
