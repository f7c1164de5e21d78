//! Real-time playback: the look-ahead engine and its drivers.

mod cursor;
mod driver;
mod engine;

pub use cursor::{CursorMove, SongCursor};
pub use driver::TickDriver;
pub use engine::{PatternUpdater, PlaybackEngine, PlaybackState, Position, TickReport};
