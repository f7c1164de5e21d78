use crate::dsp::pitch::{midi_to_frequency, note_to_midi};
use crate::error::ValidationError;

/// One note placed in a pattern.
///
/// `duration` is measured in steps; the scheduler converts it to seconds
/// using the playback tempo.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Note {
    pitch: u8,
    duration: f64,
    volume: f64,
    channel: usize,
}

impl Note {
    pub fn new(pitch: u8, duration: f64, volume: f64, channel: usize) -> Result<Self, ValidationError> {
        if pitch > 127 {
            return Err(ValidationError::PitchOutOfRange(pitch as i32));
        }
        if !(duration.is_finite() && duration > 0.0) {
            return Err(ValidationError::NonPositive {
                field: "Note duration",
                value: duration,
            });
        }
        if !(0.0..=1.0).contains(&volume) {
            return Err(ValidationError::VolumeOutOfRange(volume));
        }
        Ok(Note {
            pitch,
            duration,
            volume,
            channel,
        })
    }

    /// Build a note from a symbolic pitch such as "C4" or "F#3".
    pub fn from_name(name: &str, duration: f64, volume: f64, channel: usize) -> Result<Self, ValidationError> {
        let pitch = note_to_midi(name).ok_or_else(|| ValidationError::UnknownNoteName(name.to_string()))?;
        Note::new(pitch, duration, volume, channel)
    }

    pub fn pitch(&self) -> u8 {
        self.pitch
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn channel(&self) -> usize {
        self.channel
    }

    pub fn frequency(&self) -> f64 {
        midi_to_frequency(self.pitch)
    }

    /// The same note moved to another channel.
    pub fn on_channel(self, channel: usize) -> Self {
        Note { channel, ..self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_note() {
        let note = Note::new(60, 1.0, 0.8, 2).unwrap();
        assert_eq!(note.pitch(), 60);
        assert_eq!(note.channel(), 2);
        assert!((note.frequency() - 261.63).abs() < 0.1);
    }

    #[test]
    fn from_name_resolves_pitch() {
        let note = Note::from_name("A4", 0.5, 1.0, 0).unwrap();
        assert_eq!(note.pitch(), 69);
        assert_eq!(
            Note::from_name("X9", 0.5, 1.0, 0),
            Err(ValidationError::UnknownNoteName("X9".to_string()))
        );
    }

    #[test]
    fn rejects_non_positive_duration() {
        assert!(Note::new(60, 0.0, 0.5, 0).is_err());
        assert!(Note::new(60, -1.0, 0.5, 0).is_err());
        assert!(Note::new(60, f64::NAN, 0.5, 0).is_err());
    }

    #[test]
    fn rejects_out_of_range_volume_and_pitch() {
        assert_eq!(Note::new(60, 1.0, 1.5, 0), Err(ValidationError::VolumeOutOfRange(1.5)));
        assert!(Note::new(60, 1.0, f64::NAN, 0).is_err());
        assert_eq!(Note::new(128, 1.0, 0.5, 0), Err(ValidationError::PitchOutOfRange(128)));
    }
}
