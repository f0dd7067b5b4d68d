//! Volume and mute policy
//!
//! Volume is a linear gain in `[0, 1]`. Muting keeps the volume so unmuting
//! restores it. Changes are never applied as steps: callers ramp live gains
//! toward [`VolumeControl::target`] over [`MUTE_RAMP`] or [`VOLUME_RAMP`].

use marquee_core::clamp_volume;
use std::time::Duration;

/// Ramp length for mute and unmute
pub const MUTE_RAMP: Duration = Duration::from_millis(100);

/// Ramp length for volume changes
pub const VOLUME_RAMP: Duration = Duration::from_millis(50);

/// Increment used by volume up/down controls
pub const VOLUME_STEP: f32 = 0.05;

/// Volume controller
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeControl {
    /// Volume level (0.0-1.0)
    volume: f32,

    /// Mute state (preserves volume level)
    muted: bool,
}

impl VolumeControl {
    /// Create a new controller; `volume` is clamped
    pub fn new(volume: f32) -> Self {
        Self {
            volume: clamp_volume(volume),
            muted: false,
        }
    }

    /// Set volume, clamped to `[0, 1]` (NaN becomes 0); returns the stored value
    pub fn set_volume(&mut self, volume: f32) -> f32 {
        self.volume = clamp_volume(volume);
        self.volume
    }

    /// Nudge the volume by `delta`, clamped
    pub fn step(&mut self, delta: f32) -> f32 {
        self.set_volume(self.volume + delta)
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Toggle mute state; returns the new state
    pub fn toggle_mute(&mut self) -> bool {
        self.muted = !self.muted;
        self.muted
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Gain live voices should settle at
    ///
    /// Returns 0.0 if muted, otherwise the volume.
    pub fn target(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.volume
        }
    }
}

impl Default for VolumeControl {
    fn default() -> Self {
        Self::new(0.8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mute_preserves_volume() {
        let mut control = VolumeControl::new(0.6);
        assert!(control.toggle_mute());
        assert_eq!(control.volume(), 0.6);
        assert_eq!(control.target(), 0.0);

        assert!(!control.toggle_mute());
        assert_eq!(control.target(), 0.6);
    }

    #[test]
    fn set_volume_while_muted_only_stores() {
        let mut control = VolumeControl::new(0.6);
        control.toggle_mute();
        control.set_volume(0.2);
        assert_eq!(control.target(), 0.0);
        control.toggle_mute();
        assert_eq!(control.target(), 0.2);
    }

    #[test]
    fn step_clamps() {
        let mut control = VolumeControl::new(0.98);
        assert_eq!(control.step(VOLUME_STEP), 1.0);
        let mut control = VolumeControl::new(0.02);
        assert_eq!(control.step(-VOLUME_STEP), 0.0);
    }

    #[test]
    fn nan_becomes_silence() {
        let mut control = VolumeControl::default();
        assert_eq!(control.set_volume(f32::NAN), 0.0);
    }
}
