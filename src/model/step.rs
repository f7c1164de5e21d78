use std::collections::BTreeMap;

use super::note::Note;

/// One time slot of a pattern: at most one note per channel.
///
/// Notes are keyed by channel, so iteration is always in ascending channel
/// order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Step {
    position: usize,
    notes: BTreeMap<usize, Note>,
}

impl Step {
    pub fn new(position: usize) -> Self {
        Step {
            position,
            notes: BTreeMap::new(),
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// A copy of this step holding `note`, replacing any note on its channel.
    pub fn with_note(&self, note: Note) -> Self {
        let mut next = self.clone();
        next.notes.insert(note.channel(), note);
        next
    }

    /// A copy of this step with `channel` cleared.
    pub fn without_channel(&self, channel: usize) -> Self {
        let mut next = self.clone();
        next.notes.remove(&channel);
        next
    }

    pub fn note(&self, channel: usize) -> Option<&Note> {
        self.notes.get(&channel)
    }

    /// `(channel, note)` pairs in ascending channel order.
    pub fn notes(&self) -> impl Iterator<Item = (usize, &Note)> {
        self.notes.iter().map(|(ch, note)| (*ch, note))
    }

    pub fn note_count(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}
