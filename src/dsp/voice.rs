//! A voice is one sounding note: an oscillator node feeding a gain node.

use crate::dsp::pitch::midi_to_frequency;
use crate::error::ValidationError;
use crate::model::Note;
use crate::sink::NodeId;

/// A note as the synthesizer sees it, with its duration already in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteEvent {
    pub pitch: u8,
    /// Held time in seconds, not counting the release tail.
    pub duration: f64,
    pub volume: f64,
}

impl NoteEvent {
    /// Convert a pattern note, whose duration is in steps.
    pub fn from_note(note: &Note, step_duration: f64) -> Self {
        NoteEvent {
            pitch: note.pitch(),
            duration: note.duration() * step_duration,
            volume: note.volume(),
        }
    }

    pub fn frequency(&self) -> f64 {
        midi_to_frequency(self.pitch)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.pitch > 127 {
            return Err(ValidationError::PitchOutOfRange(self.pitch as i32));
        }
        if !(self.duration.is_finite() && self.duration > 0.0) {
            return Err(ValidationError::NonPositive {
                field: "Note duration",
                value: self.duration,
            });
        }
        if !(0.0..=1.0).contains(&self.volume) {
            return Err(ValidationError::VolumeOutOfRange(self.volume));
        }
        Ok(())
    }
}

/// A triggered note tracked until it ends or is forcibly stopped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Voice {
    pub channel: usize,
    pub oscillator: NodeId,
    pub gain: NodeId,
    /// Sink time at which the oscillator is scheduled to stop.
    pub stop_time: f64,
}

impl Voice {
    /// Has the voice's scheduled stop passed at sink time `now`?
    pub fn has_ended(&self, now: f64) -> bool {
        self.stop_time <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_duration_scales_with_step_length() {
        let note = Note::new(69, 2.0, 0.5, 1).unwrap();
        let event = NoteEvent::from_note(&note, 0.125);
        assert_eq!(event.duration, 0.25);
        assert_eq!(event.frequency(), 440.0);
        assert!(event.validate().is_ok());
    }

    #[test]
    fn malformed_events_fail_validation() {
        let bad_duration = NoteEvent {
            pitch: 60,
            duration: 0.0,
            volume: 0.5,
        };
        assert!(bad_duration.validate().is_err());

        let bad_volume = NoteEvent {
            pitch: 60,
            duration: 0.1,
            volume: f64::NAN,
        };
        assert!(bad_volume.validate().is_err());

        let bad_pitch = NoteEvent {
            pitch: 200,
            duration: 0.1,
            volume: 0.5,
        };
        assert_eq!(bad_pitch.validate(), Err(ValidationError::PitchOutOfRange(200)));
    }

    #[test]
    fn voice_ends_at_stop_time() {
        let voice = Voice {
            channel: 0,
            oscillator: NodeId(1),
            gain: NodeId(2),
            stop_time: 1.5,
        };
        assert!(!voice.has_ended(1.0));
        assert!(voice.has_ended(1.5));
    }
}
