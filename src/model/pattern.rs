use std::sync::Arc;

use super::note::Note;
use super::step::Step;
use crate::dsp::oscillator::Waveform;
use crate::error::ValidationError;
use crate::timing::steps_duration;

/// Channels a pattern gets when none are specified.
pub const DEFAULT_CHANNEL_COUNT: usize = 4;

/// A fixed-length grid of steps.
///
/// Patterns are values: every edit returns a new `Pattern`. Steps are held
/// behind `Arc`, so an edit copies one step and shares the rest with the
/// previous version.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    id: String,
    name: String,
    channel_count: usize,
    steps: Vec<Arc<Step>>,
    waveforms: Vec<Waveform>,
}

impl Pattern {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        step_count: usize,
        channel_count: usize,
    ) -> Result<Self, ValidationError> {
        let id = id.into();
        let name = name.into();
        if id.trim().is_empty() {
            return Err(ValidationError::Empty("Pattern id"));
        }
        if name.trim().is_empty() {
            return Err(ValidationError::Empty("Pattern name"));
        }
        if step_count == 0 {
            return Err(ValidationError::NonPositive {
                field: "Pattern step count",
                value: 0.0,
            });
        }
        if channel_count == 0 {
            return Err(ValidationError::NonPositive {
                field: "Pattern channel count",
                value: 0.0,
            });
        }
        Ok(Pattern {
            id,
            name,
            channel_count,
            steps: (0..step_count).map(|i| Arc::new(Step::new(i))).collect(),
            waveforms: vec![Waveform::default(); channel_count],
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    pub fn step(&self, index: usize) -> Option<&Step> {
        self.steps.get(index).map(Arc::as_ref)
    }

    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter().map(Arc::as_ref)
    }

    /// Waveform assigned to `channel`; channels past the limit use the default.
    pub fn waveform(&self, channel: usize) -> Waveform {
        self.waveforms.get(channel).copied().unwrap_or_default()
    }

    pub fn waveforms(&self) -> &[Waveform] {
        &self.waveforms
    }

    pub fn note_count(&self) -> usize {
        self.steps.iter().map(|s| s.note_count()).sum()
    }

    /// True when no step holds a note.
    pub fn is_empty(&self) -> bool {
        self.steps.iter().all(|s| s.is_empty())
    }

    /// Length of one pass through the pattern, in seconds.
    pub fn duration(&self, bpm: f64, steps_per_beat: u32) -> f64 {
        steps_duration(self.step_count(), bpm, steps_per_beat)
    }

    fn check_step(&self, step: usize) -> Result<(), ValidationError> {
        if step >= self.step_count() {
            return Err(ValidationError::StepOutOfRange {
                step,
                step_count: self.step_count(),
            });
        }
        Ok(())
    }

    fn check_channel(&self, channel: usize) -> Result<(), ValidationError> {
        if channel >= self.channel_count {
            return Err(ValidationError::ChannelOutOfRange {
                channel,
                limit: self.channel_count,
            });
        }
        Ok(())
    }

    /// A copy with `note` placed at `step`, replacing any note on that channel.
    pub fn with_note(&self, step: usize, note: Note) -> Result<Self, ValidationError> {
        self.check_step(step)?;
        self.check_channel(note.channel())?;
        let mut next = self.clone();
        next.steps[step] = Arc::new(self.steps[step].with_note(note));
        Ok(next)
    }

    /// A copy with `channel` cleared at `step`.
    pub fn without_note(&self, step: usize, channel: usize) -> Result<Self, ValidationError> {
        self.check_step(step)?;
        self.check_channel(channel)?;
        let mut next = self.clone();
        next.steps[step] = Arc::new(self.steps[step].without_channel(channel));
        Ok(next)
    }

    /// A copy with `channel` playing `waveform`.
    pub fn with_waveform(&self, channel: usize, waveform: Waveform) -> Result<Self, ValidationError> {
        self.check_channel(channel)?;
        let mut next = self.clone();
        next.waveforms[channel] = waveform;
        Ok(next)
    }

    pub fn renamed(&self, name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValidationError::Empty("Pattern name"));
        }
        Ok(Pattern {
            name,
            ..self.clone()
        })
    }

    /// Does this pattern share step storage with `other` at `index`?
    pub fn shares_step_with(&self, other: &Pattern, index: usize) -> bool {
        match (self.steps.get(index), other.steps.get(index)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(pitch: u8, channel: usize) -> Note {
        Note::new(pitch, 1.0, 0.8, channel).unwrap()
    }

    #[test]
    fn new_pattern_is_empty() {
        let p = Pattern::new("p1", "Intro", 16, 4).unwrap();
        assert_eq!(p.step_count(), 16);
        assert!(p.is_empty());
        assert_eq!(p.steps().map(|s| s.position()).collect::<Vec<_>>(), (0..16).collect::<Vec<_>>());
    }

    #[test]
    fn rejects_invalid_construction() {
        assert_eq!(Pattern::new("", "x", 16, 4), Err(ValidationError::Empty("Pattern id")));
        assert_eq!(Pattern::new("p", " ", 16, 4), Err(ValidationError::Empty("Pattern name")));
        assert!(Pattern::new("p", "x", 0, 4).is_err());
        assert!(Pattern::new("p", "x", 16, 0).is_err());
    }

    #[test]
    fn edits_return_new_values() {
        let p = Pattern::new("p1", "Intro", 16, 4).unwrap();
        let q = p.with_note(2, note(60, 1)).unwrap();
        assert!(p.is_empty());
        assert_eq!(q.note_count(), 1);
        assert_eq!(q.step(2).unwrap().note(1).unwrap().pitch(), 60);

        let r = q.without_note(2, 1).unwrap();
        assert!(r.is_empty());
        assert_eq!(q.note_count(), 1);
    }

    #[test]
    fn untouched_steps_are_shared() {
        let p = Pattern::new("p1", "Intro", 16, 4).unwrap();
        let q = p.with_note(5, note(60, 0)).unwrap();
        assert!(q.shares_step_with(&p, 4));
        assert!(!q.shares_step_with(&p, 5));
    }

    #[test]
    fn channel_limit_is_enforced() {
        let p = Pattern::new("p1", "Intro", 16, 4).unwrap();
        let err = p.with_note(0, note(60, 4)).unwrap_err();
        assert_eq!(err, ValidationError::ChannelOutOfRange { channel: 4, limit: 4 });
        assert_eq!(err.to_string(), "Channel 4 exceeds pattern channel limit of 4");
    }

    #[test]
    fn step_range_is_enforced() {
        let p = Pattern::new("p1", "Intro", 16, 4).unwrap();
        assert_eq!(
            p.with_note(16, note(60, 0)),
            Err(ValidationError::StepOutOfRange { step: 16, step_count: 16 })
        );
    }

    #[test]
    fn waveforms_per_channel() {
        let p = Pattern::new("p1", "Intro", 16, 2).unwrap();
        let q = p.with_waveform(1, Waveform::Triangle).unwrap();
        assert_eq!(q.waveform(0), Waveform::Square);
        assert_eq!(q.waveform(1), Waveform::Triangle);
        assert!(p.with_waveform(2, Waveform::Sine).is_err());
    }

    #[test]
    fn duration_at_120_bpm() {
        let p = Pattern::new("p1", "Intro", 16, 4).unwrap();
        assert!((p.duration(120.0, 4) - 2.0).abs() < 1e-12);
    }
}
