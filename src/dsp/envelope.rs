//! Attack/release envelopes.
//!
//! Real-time voices get their envelope as gain automation handed to the
//! audio sink; offline rendering applies a fixed-fraction envelope per step.

use serde::{Deserialize, Serialize};

/// One automation instruction on a gain parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GainPoint {
    /// Jump to `value` at time `at`.
    Set { value: f64, at: f64 },
    /// Ramp linearly from the previous point to `value`, arriving at `end`.
    Ramp { value: f64, end: f64 },
}

/// Linear attack/release envelope in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttackRelease {
    /// Attack time in seconds.
    pub attack: f64,
    /// Release time in seconds.
    pub release: f64,
}

impl Default for AttackRelease {
    fn default() -> Self {
        AttackRelease {
            attack: 0.01,
            release: 0.1,
        }
    }
}

impl AttackRelease {
    /// Gain automation for a note held for `duration` seconds from `start`.
    ///
    /// The attack never runs past the note's own duration; the release ends
    /// at `start + duration + release`.
    pub fn gain_points(&self, start: f64, duration: f64, volume: f64) -> [GainPoint; 4] {
        let attack = self.attack.max(0.0).min(duration);
        let release_start = start + duration;
        [
            GainPoint::Set { value: 0.0, at: start },
            GainPoint::Ramp {
                value: volume,
                end: start + attack,
            },
            GainPoint::Set {
                value: volume,
                at: release_start,
            },
            GainPoint::Ramp {
                value: 0.0,
                end: self.end_time(start, duration),
            },
        ]
    }

    /// When the voice falls silent and its oscillator should stop.
    pub fn end_time(&self, start: f64, duration: f64) -> f64 {
        start + duration + self.release.max(0.0)
    }
}

/// Click suppression for offline steps: a ramp in over the first
/// `attack_fraction` of the step and out over the last `release_fraction`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepEnvelope {
    pub attack_fraction: f64,
    pub release_fraction: f64,
}

impl Default for StepEnvelope {
    fn default() -> Self {
        StepEnvelope {
            attack_fraction: 0.01,
            release_fraction: 0.05,
        }
    }
}

impl StepEnvelope {
    /// Gain in [0, 1] for sample `index` of a step `len` samples long.
    pub fn gain(&self, index: usize, len: usize) -> f64 {
        if len == 0 || index >= len {
            return 0.0;
        }
        let attack_len = (len as f64 * self.attack_fraction) as usize;
        let release_len = (len as f64 * self.release_fraction) as usize;

        let mut gain = 1.0;
        if attack_len > 0 && index < attack_len {
            gain = index as f64 / attack_len as f64;
        }
        let remaining = len - 1 - index;
        if release_len > 0 && remaining < release_len {
            gain = gain.min(remaining as f64 / release_len as f64);
        }
        gain
    }
}
