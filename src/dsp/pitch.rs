//! Pitch helpers: note names, MIDI numbers and frequencies.

/// Frequency of A4 (MIDI 69).
pub const A4_FREQUENCY: f64 = 440.0;

/// Parse a note name (e.g. "C4", "F#3", "Bb5") into a MIDI note number.
///
/// Returns `None` for malformed names or results outside 0..=127.
pub fn note_to_midi(note: &str) -> Option<u8> {
    let bytes = note.as_bytes();
    if bytes.is_empty() {
        return None;
    }

    let base_semitone = match bytes[0].to_ascii_uppercase() as char {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };

    let mut idx = 1;
    let mut semitone = base_semitone;
    if idx < bytes.len() {
        match bytes[idx] as char {
            '#' => {
                semitone += 1;
                idx += 1;
            }
            'b' => {
                semitone -= 1;
                idx += 1;
            }
            _ => {}
        }
    }

    // MIDI spans octaves -1..=9
    let octave: i32 = note[idx..].parse().ok().filter(|o| (-1..=9).contains(o))?;

    // C4 = 60
    let midi = (octave + 1) * 12 + semitone;
    u8::try_from(midi).ok().filter(|m| *m <= 127)
}

/// Convert a MIDI note number to frequency: `440 * 2^((midi - 69) / 12)`.
pub fn midi_to_frequency(midi: u8) -> f64 {
    A4_FREQUENCY * (2.0_f64).powf((midi as f64 - 69.0) / 12.0)
}
