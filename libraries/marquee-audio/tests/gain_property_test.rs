//! Property-based tests for gain automation

use marquee_audio::GainAutomation;
use proptest::prelude::*;

proptest! {
    /// Property: a fade never leaves the range between its endpoints
    #[test]
    fn fade_stays_between_endpoints(
        from in 0.0f32..=1.0,
        to in 0.0f32..=1.0,
        start in 0.0f64..100.0,
        duration in 0.001f64..30.0,
        probe in 0.0f64..200.0,
    ) {
        let mut gain = GainAutomation::new(from);
        gain.fade(from, to, start, duration);

        let value = gain.value_at(probe);
        let (lo, hi) = if from <= to { (from, to) } else { (to, from) };
        prop_assert!(value >= lo - 1e-6 && value <= hi + 1e-6, "{value} outside [{lo}, {hi}]");
    }

    /// Property: ramp_to is continuous at the moment it is issued
    #[test]
    fn ramp_to_holds_the_current_value(
        first in 0.0f32..=1.0,
        second in 0.0f32..=1.0,
        cut in 0.0f64..1.0,
        window in 0.001f64..1.0,
    ) {
        let mut gain = GainAutomation::new(0.0);
        gain.fade(0.0, first, 0.0, 1.0);
        let held = gain.value_at(cut);

        gain.ramp_to(second, cut, window);
        prop_assert!((gain.value_at(cut) - held).abs() < 1e-5);
        prop_assert!((gain.value_at(cut + window) - second).abs() < 1e-5);
    }

    /// Property: pruning the past never changes present or future values
    #[test]
    fn pruning_is_invisible(
        to in 0.0f32..=1.0,
        duration in 0.01f64..10.0,
        now in 0.0f64..20.0,
    ) {
        let mut gain = GainAutomation::new(1.0);
        gain.fade(1.0, to, 1.0, duration);
        let probes = [now, now + 0.5, now + duration];
        let before: Vec<f32> = probes.iter().map(|t| gain.value_at(*t)).collect();

        gain.prune_before(now);
        let after: Vec<f32> = probes.iter().map(|t| gain.value_at(*t)).collect();
        for (b, a) in before.iter().zip(&after) {
            prop_assert!((b - a).abs() < 1e-5);
        }
    }
}
