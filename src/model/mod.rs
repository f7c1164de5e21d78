//! The immutable note/step/pattern/song value graph.

mod bank;
mod note;
mod pattern;
mod song;
mod step;

pub use bank::PatternBank;
pub use note::Note;
pub use pattern::{DEFAULT_CHANNEL_COUNT, Pattern};
pub use song::{PatternEntry, Song};
pub use step::Step;
