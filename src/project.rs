//! JSON song document: the exchange format for whole songs.
//!
//! ```json
//! {
//!   "version": "1.0",
//!   "exportedAt": "2024-05-01T12:00:00Z",
//!   "title": "Demo",
//!   "bpm": 120,
//!   "channelCount": 4,
//!   "stepsPerBeat": 4,
//!   "patterns": [{
//!     "id": "a", "name": "Intro", "stepsCount": 16,
//!     "channels": [{ "waveform": "square",
//!                    "steps": [{ "note": { "pitch": 60, "duration": 1, "volume": 0.8 } },
//!                              { "note": null }] }]
//!   }],
//!   "patternOrder": ["a", "a"]
//! }
//! ```
//!
//! The document is a plain serde model; `into_parts` turns it into the
//! validated [`Song`] and [`PatternBank`], so every model invariant is
//! checked on the way in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dsp::oscillator::Waveform;
use crate::dsp::pitch::note_to_midi;
use crate::dsp::renderer::calculate_duration;
use crate::error::{CoreError, ValidationError};
use crate::model::{DEFAULT_CHANNEL_COUNT, Note, Pattern, PatternBank, PatternEntry, Song};
use crate::timing::DEFAULT_STEPS_PER_BEAT;

pub const DOCUMENT_VERSION: &str = "1.0";

fn default_version() -> String {
    DOCUMENT_VERSION.to_string()
}

fn default_channel_count() -> usize {
    DEFAULT_CHANNEL_COUNT
}

fn default_steps_per_beat() -> u32 {
    DEFAULT_STEPS_PER_BEAT
}

fn default_repeat_count() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongDocument {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "Utc::now")]
    pub exported_at: DateTime<Utc>,
    pub title: String,
    /// Song id; the title is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub bpm: f64,
    #[serde(default = "default_channel_count")]
    pub channel_count: usize,
    #[serde(default = "default_steps_per_beat")]
    pub steps_per_beat: u32,
    pub patterns: Vec<PatternDocument>,
    /// Pattern ids in play order, entry repeats spelled out.
    pub pattern_order: Vec<String>,
    #[serde(default = "default_repeat_count")]
    pub repeat_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternDocument {
    pub id: String,
    pub name: String,
    pub steps_count: usize,
    #[serde(default)]
    pub channels: Vec<ChannelDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelDocument {
    #[serde(default)]
    pub waveform: Waveform,
    #[serde(default)]
    pub steps: Vec<StepSlot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSlot {
    pub note: Option<NoteDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteDocument {
    pub pitch: PitchValue,
    /// In steps.
    pub duration: f64,
    pub volume: f64,
}

/// A MIDI note number or a note name such as `"C#4"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PitchValue {
    Midi(i64),
    Name(String),
}

impl PitchValue {
    pub fn to_midi(&self) -> Result<u8, ValidationError> {
        match self {
            PitchValue::Midi(n) => u8::try_from(*n)
                .ok()
                .filter(|&p| p <= 127)
                .ok_or(ValidationError::PitchOutOfRange((*n).clamp(i32::MIN as i64, i32::MAX as i64) as i32)),
            PitchValue::Name(name) => note_to_midi(name).ok_or_else(|| ValidationError::UnknownNoteName(name.clone())),
        }
    }
}

/// Headline facts about a song document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SongSummary {
    pub title: String,
    pub bpm: f64,
    pub pattern_count: usize,
    pub total_steps: usize,
    pub repeat_count: u32,
    pub duration_seconds: f64,
}

impl NoteDocument {
    fn from_note(note: &Note) -> Self {
        NoteDocument {
            pitch: PitchValue::Midi(note.pitch() as i64),
            duration: note.duration(),
            volume: note.volume(),
        }
    }
}

impl PatternDocument {
    pub fn from_pattern(pattern: &Pattern) -> Self {
        let channels = (0..pattern.channel_count())
            .map(|channel| ChannelDocument {
                waveform: pattern.waveform(channel),
                steps: pattern
                    .steps()
                    .map(|step| StepSlot {
                        note: step.note(channel).map(NoteDocument::from_note),
                    })
                    .collect(),
            })
            .collect();
        PatternDocument {
            id: pattern.id().to_string(),
            name: pattern.name().to_string(),
            steps_count: pattern.step_count(),
            channels,
        }
    }

    /// Build the pattern. It gets one channel per listed channel, or
    /// `default_channels` when none are listed.
    pub fn to_pattern(&self, default_channels: usize) -> Result<Pattern, ValidationError> {
        let channel_count = if self.channels.is_empty() {
            default_channels
        } else {
            self.channels.len()
        };
        let mut pattern = Pattern::new(&self.id, &self.name, self.steps_count, channel_count)?;
        for (channel, doc) in self.channels.iter().enumerate() {
            if doc.waveform != pattern.waveform(channel) {
                pattern = pattern.with_waveform(channel, doc.waveform)?;
            }
            for (index, slot) in doc.steps.iter().enumerate() {
                let Some(note) = &slot.note else { continue };
                let note = Note::new(note.pitch.to_midi()?, note.duration, note.volume, channel)?;
                pattern = pattern.with_note(index, note)?;
            }
        }
        Ok(pattern)
    }
}

impl SongDocument {
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Snapshot `song` and every pattern in `bank`, stamped with the current time.
    pub fn from_song(song: &Song, bank: &PatternBank) -> Self {
        let patterns: Vec<PatternDocument> = bank
            .patterns()
            .into_iter()
            .map(|p| PatternDocument::from_pattern(p))
            .collect();
        let channel_count = bank
            .patterns()
            .iter()
            .map(|p| p.channel_count())
            .max()
            .unwrap_or(DEFAULT_CHANNEL_COUNT);
        SongDocument {
            version: default_version(),
            exported_at: Utc::now(),
            title: song.name().to_string(),
            id: Some(song.id().to_string()),
            bpm: song.bpm(),
            channel_count,
            steps_per_beat: DEFAULT_STEPS_PER_BEAT,
            patterns,
            pattern_order: song.play_order().map(str::to_string).collect(),
            repeat_count: song.repeat_count(),
        }
    }

    /// Validate the document and build the song model. Runs of the same id
    /// in `patternOrder` become one entry with a repeat count.
    pub fn into_parts(self) -> Result<(Song, PatternBank), CoreError> {
        let patterns = self
            .patterns
            .iter()
            .map(|doc| doc.to_pattern(self.channel_count))
            .collect::<Result<Vec<_>, _>>()?;
        let bank = PatternBank::from_patterns(patterns);

        let mut sequence: Vec<PatternEntry> = Vec::new();
        let mut order = self.pattern_order.iter().peekable();
        while let Some(id) = order.next() {
            let mut repeat = 1;
            while order.next_if(|next| *next == id).is_some() {
                repeat += 1;
            }
            sequence.push(PatternEntry::new(id.as_str(), repeat)?);
        }

        let id = self.id.unwrap_or_else(|| self.title.clone());
        let song = Song::new(id, self.title, self.bpm, self.repeat_count as f64)?.with_sequence(sequence);
        Ok((song, bank))
    }

    /// Title, tempo and length of the song.
    pub fn summary(&self) -> Result<SongSummary, CoreError> {
        let steps_per_beat = self.steps_per_beat;
        let (song, bank) = self.clone().into_parts()?;
        let total_steps = song.total_steps(&bank)?;
        let duration_seconds = calculate_duration(&song, &bank, steps_per_beat)?;
        Ok(SongSummary {
            title: song.name().to_string(),
            bpm: song.bpm(),
            pattern_count: bank.len(),
            total_steps,
            repeat_count: song.repeat_count(),
            duration_seconds,
        })
    }
}
