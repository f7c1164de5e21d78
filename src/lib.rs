pub mod config;
pub mod dsp;
pub mod error;
pub mod model;
pub mod playback;
pub mod project;
pub mod sink;
pub mod timing;

use crate::dsp::renderer::{ExportOptions, export_song_wav, render_song};
use crate::dsp::wav::BitDepth;
use crate::error::CoreError;
use crate::project::SongDocument;
use wasm_bindgen::prelude::*;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the gridsynth-core version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

/// Parse a JSON song document and render it to WAV bytes.
///
/// The document's `stepsPerBeat` overrides the one in `options`.
pub fn export_document_wav(json: &str, options: &ExportOptions) -> Result<Vec<u8>, CoreError> {
    let doc = SongDocument::from_json(json)?;
    let options = ExportOptions {
        steps_per_beat: doc.steps_per_beat,
        ..*options
    };
    let (song, bank) = doc.into_parts()?;
    Ok(export_song_wav(&song, &bank, &options)?)
}

fn to_js(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// WASM-exposed: render a JSON song document to a WAV byte array.
#[wasm_bindgen]
pub fn render_song_wav(json: &str, sample_rate: u32, bit_depth: u16, channels: u16) -> Result<Vec<u8>, JsValue> {
    let options = ExportOptions {
        sample_rate,
        bit_depth: BitDepth::try_from(bit_depth).map_err(to_js)?,
        channels,
        ..ExportOptions::default()
    };
    export_document_wav(json, &options).map_err(to_js)
}

/// WASM-exposed: render a JSON song document to mono f32 samples.
#[wasm_bindgen]
pub fn render_song_samples(json: &str, sample_rate: u32) -> Result<Vec<f32>, JsValue> {
    let doc = SongDocument::from_json(json).map_err(to_js)?;
    let options = ExportOptions {
        sample_rate,
        channels: 1,
        steps_per_beat: doc.steps_per_beat,
        ..ExportOptions::default()
    };
    let (song, bank) = doc.into_parts().map_err(to_js)?;
    render_song(&song, &bank, &options).map_err(to_js)
}

/// WASM-exposed: title, tempo and length of a JSON song document.
#[wasm_bindgen]
pub fn song_summary(json: &str) -> Result<JsValue, JsValue> {
    let summary = SongDocument::from_json(json)
        .and_then(|doc| doc.summary())
        .map_err(to_js)?;
    serde_wasm_bindgen::to_value(&summary).map_err(to_js)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SONG: &str = r#"{
        "version": "1.0",
        "exportedAt": "2024-05-01T12:00:00Z",
        "title": "Two Bars",
        "bpm": 120,
        "channelCount": 4,
        "stepsPerBeat": 4,
        "patterns": [
            { "id": "a", "name": "A", "stepsCount": 16,
              "channels": [{ "waveform": "square",
                             "steps": [{ "note": { "pitch": 60, "duration": 1, "volume": 0.8 } }] }] },
            { "id": "b", "name": "B", "stepsCount": 16, "channels": [] }
        ],
        "patternOrder": ["a", "b"]
    }"#;

    #[test]
    fn version_matches_cargo() {
        assert_eq!(core_version(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn document_exports_to_wav() {
        let options = ExportOptions {
            sample_rate: 8000,
            ..ExportOptions::default()
        };
        let wav = export_document_wav(SONG, &options).unwrap();
        let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.spec().bits_per_sample, 16);
        // 32 steps of 0.125 s
        assert_eq!(reader.duration(), 4 * 8000);
    }

    #[test]
    fn document_steps_per_beat_wins() {
        let json = SONG.replace(r#""stepsPerBeat": 4"#, r#""stepsPerBeat": 8"#);
        let options = ExportOptions {
            sample_rate: 8000,
            channels: 1,
            ..ExportOptions::default()
        };
        let wav = export_document_wav(&json, &options).unwrap();
        assert_eq!(wav.len(), 44 + 2 * 16_000);
    }

    #[test]
    fn empty_document_is_an_export_error() {
        let json = SONG.replace(r#"["a", "b"]"#, "[]");
        assert!(matches!(
            export_document_wav(&json, &ExportOptions::default()),
            Err(CoreError::Export(crate::error::ExportError::EmptySong(_)))
        ));
    }

    #[test]
    fn malformed_json_is_reported() {
        assert!(matches!(
            export_document_wav("{", &ExportOptions::default()),
            Err(CoreError::Json(_))
        ));
    }
}
