//! Offline renderer: renders a song or pattern to samples and WAV bytes.
//!
//! Rendering is pure: the same song and options always give the same bytes.
//! Each step is rendered independently (fresh oscillator phase per note), so
//! with the `parallel` feature steps are spread across threads and then
//! concatenated in play order.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::envelope::StepEnvelope;
use super::mixer::StepMix;
use super::oscillator::Oscillator;
use super::wav::{BitDepth, MAX_DATA_LEN, data_len, encode_wav};
use crate::error::{ExportError, ValidationError};
use crate::model::{Pattern, PatternBank, Song, Step};
use crate::timing::{DEFAULT_STEPS_PER_BEAT, step_duration, validate_bpm};

/// Output format and timing for an export.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExportOptions {
    pub sample_rate: u32,
    pub bit_depth: BitDepth,
    /// 1 (mono) or 2 (stereo, both channels identical).
    pub channels: u16,
    pub steps_per_beat: u32,
}

impl Default for ExportOptions {
    fn default() -> Self {
        ExportOptions {
            sample_rate: 44100,
            bit_depth: BitDepth::Sixteen,
            channels: 2,
            steps_per_beat: DEFAULT_STEPS_PER_BEAT,
        }
    }
}

impl ExportOptions {
    pub fn validate(&self) -> Result<(), ExportError> {
        if self.sample_rate == 0 {
            return Err(ExportError::InvalidSampleRate);
        }
        if !(1..=2).contains(&self.channels) {
            return Err(ExportError::UnsupportedChannelCount(self.channels));
        }
        if self.steps_per_beat == 0 {
            return Err(ValidationError::NonPositive {
                field: "Steps per beat",
                value: 0.0,
            }
            .into());
        }
        Ok(())
    }

    /// Whole samples per step at `bpm`, or `None` if one step alone would
    /// overflow a WAV data chunk.
    pub fn samples_per_step(&self, bpm: f64) -> Option<usize> {
        let samples = (self.sample_rate as f64 * step_duration(bpm, self.steps_per_beat)).floor();
        (samples.is_finite() && samples <= MAX_DATA_LEN as f64).then_some(samples as usize)
    }

    /// Samples per step for an export of `steps` steps, checked against the
    /// WAV size limit before anything is allocated.
    fn checked_samples_per_step(&self, steps: usize, bpm: f64) -> Result<usize, ExportError> {
        let samples_per_step = self
            .samples_per_step(bpm)
            .ok_or(ExportError::DataTooLarge(u64::MAX))?;
        let frames = (steps as u64).saturating_mul(samples_per_step as u64);
        data_len(frames, self.channels, self.bit_depth)?;
        Ok(samples_per_step)
    }
}

/// Total song length in seconds: every step of the play order, times the
/// song's repeat count.
pub fn calculate_duration(song: &Song, bank: &PatternBank, steps_per_beat: u32) -> Result<f64, ExportError> {
    if !song.validate_finite_loop() {
        return Err(ExportError::EmptySong(song.name().to_string()));
    }
    if steps_per_beat == 0 {
        return Err(ValidationError::NonPositive {
            field: "Steps per beat",
            value: 0.0,
        }
        .into());
    }
    let total_steps = song.total_steps(bank)?;
    Ok(total_steps as f64 * (1.0 / steps_per_beat as f64) / song.bpm() * 60.0)
}

/// One step to render, with the pattern it belongs to (for waveforms).
type StepJob<'a> = (&'a Pattern, &'a Step);

/// Render every step of `song` to mono samples in [-1, 1].
///
/// Steps render independently, so one pass is rendered and then repeated.
pub fn render_song(song: &Song, bank: &PatternBank, options: &ExportOptions) -> Result<Vec<f32>, ExportError> {
    options.validate()?;
    if !song.validate_finite_loop() {
        return Err(ExportError::EmptySong(song.name().to_string()));
    }
    let total_steps = song.total_steps(bank)?;
    let samples_per_step = options.checked_samples_per_step(total_steps, song.bpm())?;
    if samples_per_step == 0 {
        return Ok(Vec::new());
    }

    let mut pass: Vec<StepJob<'_>> = Vec::new();
    for id in song.play_order() {
        let pattern = bank
            .get(id)
            .ok_or_else(|| ValidationError::UnknownPattern(id.to_string()))?;
        pass.extend(pattern.steps().map(|step| (pattern.as_ref(), step)));
    }

    debug!(song = song.name(), steps = total_steps, "rendering song");
    let samples = render_steps(&pass, samples_per_step, options.sample_rate);
    Ok(samples.repeat(song.repeat_count() as usize))
}

/// Render one pass through `pattern` at `bpm`.
pub fn render_pattern(pattern: &Pattern, bpm: f64, options: &ExportOptions) -> Result<Vec<f32>, ExportError> {
    options.validate()?;
    let bpm = validate_bpm(bpm)?;
    let samples_per_step = options.checked_samples_per_step(pattern.step_count(), bpm)?;
    let jobs: Vec<StepJob<'_>> = pattern.steps().map(|step| (pattern, step)).collect();
    debug!(pattern = pattern.name(), steps = jobs.len(), "rendering pattern");
    Ok(render_steps(&jobs, samples_per_step, options.sample_rate))
}

fn render_steps(jobs: &[StepJob<'_>], samples_per_step: usize, sample_rate: u32) -> Vec<f32> {
    let sample_rate = sample_rate as f64;
    let envelope = StepEnvelope::default();

    #[cfg(feature = "parallel")]
    let rendered: Vec<Vec<f32>> = {
        use rayon::prelude::*;
        jobs.par_iter()
            .map(|(pattern, step)| render_step(pattern, step, samples_per_step, sample_rate, &envelope))
            .collect()
    };
    #[cfg(not(feature = "parallel"))]
    let rendered: Vec<Vec<f32>> = jobs
        .iter()
        .map(|(pattern, step)| render_step(pattern, step, samples_per_step, sample_rate, &envelope))
        .collect();

    rendered.concat()
}

/// Mix the notes of one step. A step with no notes is silence.
fn render_step(pattern: &Pattern, step: &Step, len: usize, sample_rate: f64, envelope: &StepEnvelope) -> Vec<f32> {
    let mut mix = StepMix::new(len);
    for (channel, note) in step.notes() {
        let mut osc = Oscillator::new(pattern.waveform(channel), note.frequency(), sample_rate);
        let volume = note.volume();
        mix.add_channel((0..len).map(|i| (osc.next_sample() * volume * envelope.gain(i, len)) as f32));
    }
    mix.finish()
}

/// Render `song` and encode it as a WAV file.
pub fn export_song_wav(song: &Song, bank: &PatternBank, options: &ExportOptions) -> Result<Vec<u8>, ExportError> {
    let samples = render_song(song, bank, options)?;
    let wav = encode_wav(&samples, options.sample_rate, options.channels, options.bit_depth)?;
    info!(
        song = song.name(),
        frames = samples.len(),
        bytes = wav.len(),
        bit_depth = options.bit_depth.bits(),
        "exported song"
    );
    Ok(wav)
}

/// Render one pass of `pattern` and encode it as a WAV file.
pub fn export_pattern_wav(pattern: &Pattern, bpm: f64, options: &ExportOptions) -> Result<Vec<u8>, ExportError> {
    let samples = render_pattern(pattern, bpm, options)?;
    let wav = encode_wav(&samples, options.sample_rate, options.channels, options.bit_depth)?;
    info!(pattern = pattern.name(), frames = samples.len(), bytes = wav.len(), "exported pattern");
    Ok(wav)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::oscillator::Waveform;
    use crate::model::{Note, PatternEntry};
    use std::io::Cursor;

    fn pattern(id: &str) -> Pattern {
        Pattern::new(id, id.to_uppercase(), 16, 4).unwrap()
    }

    fn two_pattern_song() -> (Song, PatternBank) {
        let a = pattern("a").with_note(0, Note::new(60, 1.0, 0.8, 0).unwrap()).unwrap();
        let b = pattern("b").with_note(4, Note::new(67, 1.0, 0.8, 1).unwrap()).unwrap();
        let song = Song::new("s", "Two", 120.0, 1.0)
            .unwrap()
            .with_entry(PatternEntry::new("a", 1).unwrap())
            .with_entry(PatternEntry::new("b", 1).unwrap());
        (song, PatternBank::from_patterns([a, b]))
    }

    fn options(sample_rate: u32) -> ExportOptions {
        ExportOptions {
            sample_rate,
            channels: 1,
            ..ExportOptions::default()
        }
    }

    #[test]
    fn two_patterns_at_120_bpm_last_four_seconds() {
        let (song, bank) = two_pattern_song();
        let duration = calculate_duration(&song, &bank, 4).unwrap();
        assert!((duration - 4.0).abs() < 1e-9);
    }

    #[test]
    fn duration_counts_entry_and_song_repeats() {
        let (song, bank) = two_pattern_song();
        let song = song
            .with_sequence(vec![PatternEntry::new("a", 3).unwrap()])
            .with_repeat_count(2.0)
            .unwrap();
        let duration = calculate_duration(&song, &bank, 4).unwrap();
        assert!((duration - 12.0).abs() < 1e-9);
    }

    #[test]
    fn empty_song_cannot_be_exported() {
        let song = Song::new("s", "Nothing", 120.0, 1.0).unwrap();
        let bank = PatternBank::default();
        assert!(matches!(calculate_duration(&song, &bank, 4), Err(ExportError::EmptySong(_))));
        assert!(matches!(
            export_song_wav(&song, &bank, &ExportOptions::default()),
            Err(ExportError::EmptySong(_))
        ));
    }

    #[test]
    fn unknown_pattern_is_a_validation_error() {
        let song = Song::new("s", "Ghost", 120.0, 1.0)
            .unwrap()
            .with_entry(PatternEntry::new("missing", 1).unwrap());
        let result = render_song(&song, &PatternBank::default(), &options(8000));
        assert!(matches!(
            result,
            Err(ExportError::Validation(ValidationError::UnknownPattern(_)))
        ));
    }

    #[test]
    fn empty_pattern_renders_silence_of_the_right_length() {
        let samples = render_pattern(&pattern("quiet"), 120.0, &options(8000)).unwrap();
        // 0.125 s per step at 8 kHz
        assert_eq!(samples.len(), 16 * 1000);
        assert!(samples.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn song_length_matches_duration() {
        let (song, bank) = two_pattern_song();
        let samples = render_song(&song, &bank, &options(8000)).unwrap();
        assert_eq!(samples.len(), 32 * 1000);
    }

    #[test]
    fn notes_sound_only_in_their_step() {
        let (song, bank) = two_pattern_song();
        let samples = render_song(&song, &bank, &options(8000)).unwrap();
        let step = |i: usize| &samples[i * 1000..(i + 1) * 1000];
        assert!(step(0).iter().any(|&s| s.abs() > 0.5));
        assert!(step(1).iter().all(|&s| s == 0.0));
        assert!(step(20).iter().any(|&s| s != 0.0));
        assert!(samples.iter().all(|&s| (-1.0..=1.0).contains(&s)));
    }

    #[test]
    fn step_envelope_silences_edges() {
        let p = pattern("p").with_note(0, Note::new(69, 1.0, 1.0, 0).unwrap()).unwrap();
        let samples = render_pattern(&p, 120.0, &options(8000)).unwrap();
        assert_eq!(samples[0], 0.0);
        assert_eq!(samples[999], 0.0);
    }

    #[test]
    fn simultaneous_channels_are_averaged() {
        let note = |ch| Note::new(69, 1.0, 1.0, ch).unwrap();
        let single = pattern("p").with_note(0, note(0)).unwrap();
        let double = single.with_note(0, note(1)).unwrap();
        let opts = options(8000);
        let a = render_pattern(&single, 120.0, &opts).unwrap();
        let b = render_pattern(&double, 120.0, &opts).unwrap();
        // Two identical square voices averaged equal one voice.
        for (x, y) in a.iter().zip(&b).take(1000) {
            assert!((x - y).abs() < 1e-6);
        }
    }

    #[test]
    fn pattern_waveforms_are_used() {
        let note = Note::new(69, 1.0, 1.0, 0).unwrap();
        let square = pattern("p").with_note(0, note).unwrap();
        let sine = square.with_waveform(0, Waveform::Sine).unwrap();
        let opts = options(8000);
        let a = render_pattern(&square, 120.0, &opts).unwrap();
        let b = render_pattern(&sine, 120.0, &opts).unwrap();
        assert_ne!(a[..1000], b[..1000]);
    }

    #[test]
    fn rejects_bad_options() {
        let p = pattern("p");
        let opts = ExportOptions {
            channels: 6,
            ..ExportOptions::default()
        };
        assert!(matches!(
            render_pattern(&p, 120.0, &opts),
            Err(ExportError::UnsupportedChannelCount(6))
        ));
        assert!(render_pattern(&p, 0.0, &ExportOptions::default()).is_err());
    }

    #[test]
    fn exported_wav_reads_back() {
        let (song, bank) = two_pattern_song();
        let opts = ExportOptions {
            sample_rate: 8000,
            bit_depth: BitDepth::TwentyFour,
            channels: 2,
            steps_per_beat: 4,
        };
        let wav = export_song_wav(&song, &bank, &opts).unwrap();
        let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.spec().bits_per_sample, 24);
        assert_eq!(reader.duration(), 32_000);
    }

    #[test]
    fn file_size_grows_with_bit_depth() {
        let (song, bank) = two_pattern_song();
        let sizes: Vec<usize> = [BitDepth::Eight, BitDepth::Sixteen, BitDepth::TwentyFour, BitDepth::ThirtyTwo]
            .into_iter()
            .map(|bit_depth| {
                let opts = ExportOptions {
                    sample_rate: 8000,
                    bit_depth,
                    ..ExportOptions::default()
                };
                export_song_wav(&song, &bank, &opts).unwrap().len()
            })
            .collect();
        assert!(sizes.windows(2).all(|w| w[0] < w[1]), "{sizes:?}");
        // 32000 stereo frames
        assert_eq!(sizes[1], 44 + 32_000 * 2 * 2);
    }

    #[test]
    fn oversized_exports_fail_before_rendering() {
        let p = Pattern::new("p", "P", 1, 1).unwrap();
        assert!(matches!(
            export_pattern_wav(&p, 1e-300, &ExportOptions::default()),
            Err(ExportError::DataTooLarge(_))
        ));

        // 15000 s per step at 44.1 kHz
        let (song, bank) = two_pattern_song();
        let slow = song.with_bpm(0.001).unwrap();
        assert!(matches!(
            render_song(&slow, &bank, &ExportOptions::default()),
            Err(ExportError::DataTooLarge(_))
        ));
    }

    #[test]
    fn step_count_overflow_is_reported() {
        let bank = PatternBank::from_patterns([Pattern::new("a", "A", 1024, 1).unwrap()]);
        let song = Song::new("s", "Endless", 120.0, u32::MAX as f64)
            .unwrap()
            .with_entry(PatternEntry::new("a", u32::MAX).unwrap());
        assert!(matches!(
            export_song_wav(&song, &bank, &options(8000)),
            Err(ExportError::Validation(ValidationError::TooManySteps(_)))
        ));
    }

    #[test]
    fn pattern_export_is_deterministic() {
        let p = pattern("p").with_note(3, Note::new(64, 1.0, 0.5, 2).unwrap()).unwrap();
        let opts = options(8000);
        assert_eq!(
            export_pattern_wav(&p, 100.0, &opts).unwrap(),
            export_pattern_wav(&p, 100.0, &opts).unwrap()
        );
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let opts: ExportOptions = serde_json::from_str(r#"{"bitDepth": 8, "channels": 1}"#).unwrap();
        assert_eq!(opts.bit_depth, BitDepth::Eight);
        assert_eq!(opts.sample_rate, 44100);
        assert_eq!(opts.channels, 1);
    }
}
