//! Retro waveforms and the sample-domain oscillator used for offline rendering.

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Supported waveform shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    #[default]
    Square,
    Triangle,
    Sawtooth,
    Sine,
}

impl Waveform {
    pub const ALL: [Waveform; 4] = [
        Waveform::Square,
        Waveform::Triangle,
        Waveform::Sawtooth,
        Waveform::Sine,
    ];

    /// Value of one cycle at `phase` in [0, 1). Output is within [-1, 1].
    pub fn sample_at(self, phase: f64) -> f64 {
        match self {
            Waveform::Sine => (2.0 * PI * phase).sin(),
            Waveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            // Rises from -1 to +1, then drops.
            Waveform::Sawtooth => 2.0 * phase - 1.0,
            // -1 → +1 over [0, 0.5], +1 → -1 over [0.5, 1]
            Waveform::Triangle => {
                if phase < 0.5 {
                    4.0 * phase - 1.0
                } else {
                    3.0 - 4.0 * phase
                }
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Waveform::Square => "square",
            Waveform::Triangle => "triangle",
            Waveform::Sawtooth => "sawtooth",
            Waveform::Sine => "sine",
        }
    }
}

impl fmt::Display for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Waveform {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "square" => Ok(Waveform::Square),
            "triangle" => Ok(Waveform::Triangle),
            "sawtooth" | "saw" => Ok(Waveform::Sawtooth),
            "sine" => Ok(Waveform::Sine),
            other => Err(ValidationError::UnknownWaveform(other.to_string())),
        }
    }
}

/// A naive phase-accumulating oscillator.
///
/// The phase starts at zero, so a fresh oscillator reproduces the same
/// samples for the same note regardless of where in a song it is rendered.
#[derive(Debug, Clone)]
pub struct Oscillator {
    pub waveform: Waveform,
    pub frequency: f64,
    phase: f64,
    sample_rate: f64,
}

impl Oscillator {
    pub fn new(waveform: Waveform, frequency: f64, sample_rate: f64) -> Self {
        Oscillator {
            waveform,
            frequency,
            phase: 0.0,
            sample_rate,
        }
    }

    /// Phase increment per sample.
    fn phase_inc(&self) -> f64 {
        self.frequency / self.sample_rate
    }

    /// Generate the next sample.
    pub fn next_sample(&mut self) -> f64 {
        let sample = self.waveform.sample_at(self.phase);
        self.phase = (self.phase + self.phase_inc()).fract();
        sample
    }

    /// Reset oscillator phase.
    pub fn reset(&mut self) {
        self.phase = 0.0;
    }
}
