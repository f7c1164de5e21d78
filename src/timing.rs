//! Step timing shared by the real-time scheduler and the offline renderer.

use crate::error::ValidationError;

/// Steps per beat used when nothing else is configured (16 steps = 4 beats).
pub const DEFAULT_STEPS_PER_BEAT: u32 = 4;

/// Duration of one step in seconds: `60 / bpm / steps_per_beat`.
pub fn step_duration(bpm: f64, steps_per_beat: u32) -> f64 {
    60.0 / bpm / steps_per_beat as f64
}

/// Duration of `steps` consecutive steps in seconds.
pub fn steps_duration(steps: usize, bpm: f64, steps_per_beat: u32) -> f64 {
    steps as f64 * step_duration(bpm, steps_per_beat)
}

/// Reject tempos that would make step times meaningless.
pub fn validate_bpm(bpm: f64) -> Result<f64, ValidationError> {
    if bpm.is_finite() && bpm > 0.0 {
        Ok(bpm)
    } else {
        Err(ValidationError::NonPositive {
            field: "BPM",
            value: bpm,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_duration_at_120_bpm() {
        assert!((step_duration(120.0, 4) - 0.125).abs() < 1e-12);
    }

    #[test]
    fn step_duration_at_140_bpm() {
        let d = step_duration(140.0, 4);
        assert!((d - 60.0 / 140.0 / 4.0).abs() < 1e-12);
        assert!((d - 0.1071).abs() < 1e-4, "got {d}");
    }

    #[test]
    fn step_duration_formula_holds_across_tempos() {
        for bpm in [1.0, 33.3, 60.0, 99.0, 180.0, 300.0, 999.0] {
            let d = step_duration(bpm, DEFAULT_STEPS_PER_BEAT);
            assert!((d - 60.0 / bpm / 4.0).abs() < 1e-12, "bpm {bpm}");
        }
    }

    #[test]
    fn two_bars_last_four_seconds() {
        assert!((steps_duration(32, 120.0, 4) - 4.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_non_positive_bpm() {
        assert!(validate_bpm(0.0).is_err());
        assert!(validate_bpm(-120.0).is_err());
        assert!(validate_bpm(f64::NAN).is_err());
        assert!(validate_bpm(f64::INFINITY).is_err());
        assert_eq!(validate_bpm(128.0), Ok(128.0));
    }
}
