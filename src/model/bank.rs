use std::collections::HashMap;
use std::sync::Arc;

use super::pattern::Pattern;

/// Lookup table from pattern id to pattern.
///
/// Cloning is cheap. The table is never edited in place: `with_pattern`
/// builds a new table, so anyone holding the old one keeps a consistent
/// snapshot.
#[derive(Debug, Clone, Default)]
pub struct PatternBank {
    patterns: Arc<HashMap<String, Arc<Pattern>>>,
}

impl PatternBank {
    pub fn from_patterns(patterns: impl IntoIterator<Item = Pattern>) -> Self {
        PatternBank {
            patterns: Arc::new(
                patterns
                    .into_iter()
                    .map(|p| (p.id().to_string(), Arc::new(p)))
                    .collect(),
            ),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Pattern>> {
        self.patterns.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.patterns.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// A new table with `pattern` inserted or replacing the one with its id.
    pub fn with_pattern(&self, pattern: Pattern) -> Self {
        let mut next = HashMap::clone(&self.patterns);
        next.insert(pattern.id().to_string(), Arc::new(pattern));
        PatternBank {
            patterns: Arc::new(next),
        }
    }

    /// Patterns sorted by id.
    pub fn patterns(&self) -> Vec<&Arc<Pattern>> {
        let mut all: Vec<_> = self.patterns.values().collect();
        all.sort_by(|a, b| a.id().cmp(b.id()));
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Note;

    #[test]
    fn replacing_a_pattern_leaves_old_table_intact() {
        let bank = PatternBank::from_patterns([Pattern::new("a", "A", 16, 4).unwrap()]);
        let edited = bank
            .get("a")
            .unwrap()
            .with_note(0, Note::new(60, 1.0, 1.0, 0).unwrap())
            .unwrap();
        let next = bank.with_pattern(edited);

        assert!(bank.get("a").unwrap().is_empty());
        assert_eq!(next.get("a").unwrap().note_count(), 1);
        assert_eq!(next.len(), 1);
    }

    #[test]
    fn lookup_misses_return_none() {
        let bank = PatternBank::default();
        assert!(bank.is_empty());
        assert!(bank.get("nope").is_none());
        assert!(!bank.contains("nope"));
    }
}
