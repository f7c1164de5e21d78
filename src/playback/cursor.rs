use crate::model::Song;

/// What happened when the cursor moved past the end of a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorMove {
    /// Same entry again (entry repeat not used up).
    RepeatEntry,
    /// On to the next entry of the sequence.
    NextEntry,
    /// Back to the first entry for another pass of the song.
    NextLoop,
    /// The last pass ended.
    Finished,
}

/// Position within a song's sequence: entry, repeat of that entry, and
/// full passes through the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SongCursor {
    entry: usize,
    entry_repeat: u32,
    loop_index: u32,
}

impl SongCursor {
    pub fn entry(&self) -> usize {
        self.entry
    }

    pub fn entry_repeat(&self) -> u32 {
        self.entry_repeat
    }

    pub fn loop_index(&self) -> u32 {
        self.loop_index
    }

    /// Pattern id the cursor points at.
    pub fn pattern_id<'a>(&self, song: &'a Song) -> Option<&'a str> {
        song.sequence().get(self.entry).map(|e| e.pattern_id())
    }

    /// Move past the current pattern instance.
    pub fn advance(&mut self, song: &Song) -> CursorMove {
        let Some(entry) = song.sequence().get(self.entry) else {
            return CursorMove::Finished;
        };

        self.entry_repeat += 1;
        if self.entry_repeat < entry.repeat() {
            return CursorMove::RepeatEntry;
        }

        self.entry_repeat = 0;
        self.entry += 1;
        if self.entry < song.sequence().len() {
            return CursorMove::NextEntry;
        }

        self.entry = 0;
        self.loop_index += 1;
        if self.loop_index >= song.repeat_count() {
            CursorMove::Finished
        } else {
            CursorMove::NextLoop
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PatternEntry;

    fn song(repeat_count: f64) -> Song {
        Song::new("s", "Song", 120.0, repeat_count)
            .unwrap()
            .with_entry(PatternEntry::new("a", 2).unwrap())
            .with_entry(PatternEntry::new("b", 1).unwrap())
    }

    #[test]
    fn walks_entries_repeats_and_loops() {
        let song = song(2.0);
        let mut cursor = SongCursor::default();
        let mut visited = vec![cursor.pattern_id(&song).unwrap().to_string()];
        let mut moves = Vec::new();
        loop {
            let m = cursor.advance(&song);
            moves.push(m);
            if m == CursorMove::Finished {
                break;
            }
            visited.push(cursor.pattern_id(&song).unwrap().to_string());
        }
        assert_eq!(visited, ["a", "a", "b", "a", "a", "b"]);
        assert_eq!(
            moves,
            [
                CursorMove::RepeatEntry,
                CursorMove::NextEntry,
                CursorMove::NextLoop,
                CursorMove::RepeatEntry,
                CursorMove::NextEntry,
                CursorMove::Finished,
            ]
        );
        assert_eq!(cursor.loop_index(), 2);
    }

    #[test]
    fn single_pass_finishes_after_last_entry() {
        let song = song(1.0);
        let mut cursor = SongCursor::default();
        assert_eq!(cursor.advance(&song), CursorMove::RepeatEntry);
        assert_eq!(cursor.entry_repeat(), 1);
        assert_eq!(cursor.advance(&song), CursorMove::NextEntry);
        assert_eq!(cursor.entry(), 1);
        assert_eq!(cursor.advance(&song), CursorMove::Finished);
    }

    #[test]
    fn empty_sequence_is_finished() {
        let song = Song::new("s", "Empty", 120.0, 1.0).unwrap();
        let mut cursor = SongCursor::default();
        assert_eq!(cursor.pattern_id(&song), None);
        assert_eq!(cursor.advance(&song), CursorMove::Finished);
    }
}
