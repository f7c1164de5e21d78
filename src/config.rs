//! Engine configuration.
//!
//! Every section has defaults matching the reference timings, so a partial
//! JSON document (or none at all) yields a usable engine.

use serde::{Deserialize, Serialize};

use crate::dsp::envelope::AttackRelease;
use crate::dsp::oscillator::Waveform;
use crate::error::{CoreError, ValidationError};
use crate::timing::DEFAULT_STEPS_PER_BEAT;

/// Look-ahead scheduler timing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Expected period between `tick()` calls, in seconds.
    pub tick_interval: f64,
    /// How far ahead of the sink clock steps are scheduled, in seconds.
    pub lookahead: f64,
    pub steps_per_beat: u32,
    /// Hard ceiling on steps scheduled by a single tick.
    pub max_steps_per_tick: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            tick_interval: 0.025,
            lookahead: 0.1,
            steps_per_beat: DEFAULT_STEPS_PER_BEAT,
            max_steps_per_tick: 100,
        }
    }
}

/// Per-voice synthesis defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    pub envelope: AttackRelease,
    /// Waveform for channels that never had one assigned.
    pub default_waveform: Waveform,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        VoiceConfig {
            envelope: AttackRelease::default(),
            default_waveform: Waveform::Square,
        }
    }
}

/// Channel bus layout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    pub max_channels: usize,
    pub master_volume: f64,
}

impl Default for MixerConfig {
    fn default() -> Self {
        MixerConfig {
            max_channels: 4,
            master_volume: 0.8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub scheduler: SchedulerConfig,
    pub voice: VoiceConfig,
    pub mixer: MixerConfig,
}

fn positive(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ValidationError::NonPositive { field, value })
    }
}

impl EngineConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let s = &self.scheduler;
        positive("Tick interval", s.tick_interval)?;
        positive("Look-ahead window", s.lookahead)?;
        positive("Steps per beat", s.steps_per_beat as f64)?;
        positive("Steps per tick", s.max_steps_per_tick as f64)?;

        let env = &self.voice.envelope;
        if !(env.attack.is_finite() && env.attack >= 0.0) {
            return Err(ValidationError::NonPositive {
                field: "Attack time",
                value: env.attack,
            });
        }
        if !(env.release.is_finite() && env.release >= 0.0) {
            return Err(ValidationError::NonPositive {
                field: "Release time",
                value: env.release,
            });
        }

        positive("Channel count", self.mixer.max_channels as f64)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_timings() {
        let config = EngineConfig::default();
        assert_eq!(config.scheduler.tick_interval, 0.025);
        assert_eq!(config.scheduler.lookahead, 0.1);
        assert_eq!(config.scheduler.steps_per_beat, 4);
        assert_eq!(config.scheduler.max_steps_per_tick, 100);
        assert_eq!(config.mixer.max_channels, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config = EngineConfig::from_json(r#"{"mixer": {"max_channels": 8}}"#).unwrap();
        assert_eq!(config.mixer.max_channels, 8);
        assert_eq!(config.mixer.master_volume, 0.8);
        assert_eq!(config.scheduler, SchedulerConfig::default());
    }

    #[test]
    fn empty_json_is_default() {
        assert_eq!(EngineConfig::from_json("{}").unwrap(), EngineConfig::default());
    }

    #[test]
    fn waveform_parses_by_name() {
        let config = EngineConfig::from_json(r#"{"voice": {"default_waveform": "sine"}}"#).unwrap();
        assert_eq!(config.voice.default_waveform, Waveform::Sine);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            EngineConfig::from_json(r#"{"scheduler": {"lookahead": 0.0}}"#),
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            EngineConfig::from_json(r#"{"mixer": {"max_channels": 0}}"#),
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            EngineConfig::from_json(r#"{"voice": {"envelope": {"attack": -1.0, "release": 0.1}}}"#),
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(EngineConfig::from_json("not json"), Err(CoreError::Json(_))));
    }
}
