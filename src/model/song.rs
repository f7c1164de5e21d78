use super::bank::PatternBank;
use crate::error::ValidationError;
use crate::timing::validate_bpm;

/// One element of a song's pattern sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternEntry {
    pattern_id: String,
    repeat: u32,
}

impl PatternEntry {
    pub fn new(pattern_id: impl Into<String>, repeat: u32) -> Result<Self, ValidationError> {
        let pattern_id = pattern_id.into();
        if pattern_id.trim().is_empty() {
            return Err(ValidationError::Empty("Pattern id"));
        }
        if repeat == 0 {
            return Err(ValidationError::InvalidRepeatCount(0.0));
        }
        Ok(PatternEntry { pattern_id, repeat })
    }

    pub fn pattern_id(&self) -> &str {
        &self.pattern_id
    }

    pub fn repeat(&self) -> u32 {
        self.repeat
    }
}

/// An ordered sequence of pattern references played at one tempo.
#[derive(Debug, Clone, PartialEq)]
pub struct Song {
    id: String,
    name: String,
    bpm: f64,
    repeat_count: u32,
    sequence: Vec<PatternEntry>,
}

/// Accept only positive, finite, whole repeat counts.
fn validate_repeat_count(repeat_count: f64) -> Result<u32, ValidationError> {
    if repeat_count.is_finite()
        && repeat_count >= 1.0
        && repeat_count.fract() == 0.0
        && repeat_count <= u32::MAX as f64
    {
        Ok(repeat_count as u32)
    } else {
        Err(ValidationError::InvalidRepeatCount(repeat_count))
    }
}

impl Song {
    /// `repeat_count` is taken as a float so that infinite, negative and
    /// fractional requests coming from loosely typed callers are rejected
    /// here rather than silently truncated.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        bpm: f64,
        repeat_count: f64,
    ) -> Result<Self, ValidationError> {
        let id = id.into();
        let name = name.into();
        if id.trim().is_empty() {
            return Err(ValidationError::Empty("Song id"));
        }
        if name.trim().is_empty() {
            return Err(ValidationError::Empty("Song name"));
        }
        Ok(Song {
            id,
            name,
            bpm: validate_bpm(bpm)?,
            repeat_count: validate_repeat_count(repeat_count)?,
            sequence: Vec::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn repeat_count(&self) -> u32 {
        self.repeat_count
    }

    pub fn sequence(&self) -> &[PatternEntry] {
        &self.sequence
    }

    pub fn with_entry(&self, entry: PatternEntry) -> Self {
        let mut next = self.clone();
        next.sequence.push(entry);
        next
    }

    pub fn with_sequence(&self, sequence: Vec<PatternEntry>) -> Self {
        Song {
            sequence,
            ..self.clone()
        }
    }

    pub fn with_bpm(&self, bpm: f64) -> Result<Self, ValidationError> {
        Ok(Song {
            bpm: validate_bpm(bpm)?,
            ..self.clone()
        })
    }

    pub fn with_repeat_count(&self, repeat_count: f64) -> Result<Self, ValidationError> {
        Ok(Song {
            repeat_count: validate_repeat_count(repeat_count)?,
            ..self.clone()
        })
    }

    /// True when the song has a bounded length: a non-empty sequence and a
    /// positive finite repeat count.
    pub fn validate_finite_loop(&self) -> bool {
        !self.sequence.is_empty() && self.repeat_count >= 1
    }

    /// Pattern ids for one pass through the sequence, with entry repeats
    /// expanded.
    pub fn play_order(&self) -> impl Iterator<Item = &str> + '_ {
        self.sequence
            .iter()
            .flat_map(|e| std::iter::repeat_n(e.pattern_id(), e.repeat() as usize))
    }

    /// Fail unless the song is finite and every entry resolves in `bank`.
    pub fn validate_playable(&self, bank: &PatternBank) -> Result<(), ValidationError> {
        if !self.validate_finite_loop() {
            return Err(ValidationError::EmptySequence(self.name.clone()));
        }
        for entry in &self.sequence {
            if !bank.contains(entry.pattern_id()) {
                return Err(ValidationError::UnknownPattern(entry.pattern_id().to_string()));
            }
        }
        Ok(())
    }

    /// Total steps played, including entry repeats and the song repeat count.
    pub fn total_steps(&self, bank: &PatternBank) -> Result<usize, ValidationError> {
        self.validate_playable(bank)?;
        let too_many = || ValidationError::TooManySteps(self.name.clone());
        let mut per_pass = 0usize;
        for entry in &self.sequence {
            let pattern = bank
                .get(entry.pattern_id())
                .ok_or_else(|| ValidationError::UnknownPattern(entry.pattern_id().to_string()))?;
            let steps = usize::try_from(entry.repeat())
                .ok()
                .and_then(|repeat| pattern.step_count().checked_mul(repeat))
                .ok_or_else(too_many)?;
            per_pass = per_pass.checked_add(steps).ok_or_else(too_many)?;
        }
        usize::try_from(self.repeat_count)
            .ok()
            .and_then(|repeat| per_pass.checked_mul(repeat))
            .ok_or_else(too_many)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Pattern;

    fn song() -> Song {
        Song::new("s1", "Demo", 120.0, 1.0).unwrap()
    }

    #[test]
    fn rejects_bad_repeat_counts() {
        for bad in [0.0, -1.0, -3.0, 1.5, f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
            let result = Song::new("s1", "Demo", 120.0, bad);
            assert!(
                matches!(result, Err(ValidationError::InvalidRepeatCount(_))),
                "repeat count {bad} should be rejected"
            );
        }
        assert_eq!(Song::new("s1", "Demo", 120.0, 3.0).unwrap().repeat_count(), 3);
    }

    #[test]
    fn rejects_bad_bpm_and_names() {
        assert!(Song::new("s1", "Demo", 0.0, 1.0).is_err());
        assert!(Song::new("s1", "Demo", -5.0, 1.0).is_err());
        assert_eq!(Song::new("", "Demo", 120.0, 1.0), Err(ValidationError::Empty("Song id")));
        assert_eq!(Song::new("s1", "", 120.0, 1.0), Err(ValidationError::Empty("Song name")));
    }

    #[test]
    fn finite_loop_requires_a_sequence() {
        let s = song();
        assert!(!s.validate_finite_loop());
        let s = s.with_entry(PatternEntry::new("a", 1).unwrap());
        assert!(s.validate_finite_loop());
    }

    #[test]
    fn entries_reject_zero_repeat_and_empty_id() {
        assert!(PatternEntry::new("a", 0).is_err());
        assert!(PatternEntry::new("", 1).is_err());
    }

    #[test]
    fn play_order_expands_repeats() {
        let s = song()
            .with_entry(PatternEntry::new("a", 2).unwrap())
            .with_entry(PatternEntry::new("b", 1).unwrap());
        assert_eq!(s.play_order().collect::<Vec<_>>(), vec!["a", "a", "b"]);
    }

    #[test]
    fn total_steps_counts_every_repeat() {
        let bank = PatternBank::from_patterns([
            Pattern::new("a", "A", 16, 4).unwrap(),
            Pattern::new("b", "B", 8, 4).unwrap(),
        ]);
        let s = song()
            .with_entry(PatternEntry::new("a", 2).unwrap())
            .with_entry(PatternEntry::new("b", 1).unwrap())
            .with_repeat_count(2.0)
            .unwrap();
        assert_eq!(s.total_steps(&bank), Ok((16 * 2 + 8) * 2));
    }

    #[test]
    fn total_steps_overflow_is_an_error() {
        let bank = PatternBank::from_patterns([Pattern::new("a", "A", 1024, 4).unwrap()]);
        let s = song()
            .with_entry(PatternEntry::new("a", u32::MAX).unwrap())
            .with_repeat_count(u32::MAX as f64)
            .unwrap();
        assert_eq!(s.total_steps(&bank), Err(ValidationError::TooManySteps("Demo".to_string())));
    }

    #[test]
    fn unknown_pattern_is_reported() {
        let bank = PatternBank::default();
        let s = song().with_entry(PatternEntry::new("ghost", 1).unwrap());
        assert_eq!(
            s.validate_playable(&bank),
            Err(ValidationError::UnknownPattern("ghost".to_string()))
        );
        assert_eq!(
            song().validate_playable(&bank),
            Err(ValidationError::EmptySequence("Demo".to_string()))
        );
    }
}
