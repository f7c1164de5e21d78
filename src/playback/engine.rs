//! Look-ahead playback engine.
//!
//! The engine is a plain state machine owned by one caller. Nothing runs on
//! its own: every call to [`PlaybackEngine::tick`] schedules the steps whose
//! start time falls inside the look-ahead window, against the sink's clock.
//! [`TickDriver`](super::TickDriver) calls `tick()` periodically from a thread.

use std::fmt;
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, info, warn};

use super::cursor::{CursorMove, SongCursor};
use crate::config::EngineConfig;
use crate::dsp::mixer::ChannelMixer;
use crate::dsp::oscillator::Waveform;
use crate::dsp::synth::Synthesizer;
use crate::dsp::voice::NoteEvent;
use crate::error::{CoreError, ValidationError};
use crate::model::{Pattern, PatternBank, Song};
use crate::sink::AudioSink;
use crate::timing::{step_duration, validate_bpm};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Stopped => write!(f, "stopped"),
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Paused => write!(f, "paused"),
        }
    }
}

/// Where the playhead is.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub state: PlaybackState,
    /// Next step to be scheduled in the current pattern.
    pub step: usize,
    /// Completed passes: of the pattern in pattern mode, of the whole
    /// sequence in song mode.
    pub loop_count: u32,
    /// Sequence entry index, song mode only.
    pub entry: Option<usize>,
    pub pattern_id: Option<String>,
}

/// What one `tick()` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    pub steps_scheduled: usize,
    pub notes_triggered: usize,
    pub notes_skipped: usize,
    /// The per-tick step ceiling stopped scheduling early.
    pub ceiling_hit: bool,
    /// The song finished during this tick.
    pub completed: bool,
}

/// Submits whole patterns to a running engine from another thread.
///
/// Submitted patterns replace the pattern with the same id at the start of
/// the engine's next tick.
#[derive(Debug, Clone)]
pub struct PatternUpdater {
    tx: Sender<Pattern>,
}

impl PatternUpdater {
    /// Returns false once the engine is gone.
    pub fn submit(&self, pattern: Pattern) -> bool {
        self.tx.send(pattern).is_ok()
    }
}

enum Session {
    Idle,
    Pattern(Arc<Pattern>),
    Song {
        song: Song,
        bank: PatternBank,
        cursor: SongCursor,
        current: Arc<Pattern>,
    },
}

impl Session {
    fn pattern(&self) -> Option<&Arc<Pattern>> {
        match self {
            Session::Idle => None,
            Session::Pattern(pattern) => Some(pattern),
            Session::Song { current, .. } => Some(current),
        }
    }
}

type CompletionCallback = Box<dyn FnOnce() + Send>;

pub struct PlaybackEngine<S: AudioSink> {
    sink: S,
    config: EngineConfig,
    synth: Synthesizer,
    mixer: ChannelMixer,
    state: PlaybackState,
    session: Session,
    bpm: f64,
    /// Sink time of step 0 of the current pattern instance.
    start_time: f64,
    pause_mark: f64,
    current_step: usize,
    loop_count: u32,
    /// Set once a song has scheduled its last step: the time its final
    /// pattern instance ends.
    finish_at: Option<f64>,
    completed: bool,
    on_complete: Option<CompletionCallback>,
    updates_tx: Sender<Pattern>,
    updates_rx: Receiver<Pattern>,
    last_report: TickReport,
}

impl<S: AudioSink> PlaybackEngine<S> {
    /// Build the mixer graph on `sink` and return a stopped engine.
    pub fn new(mut sink: S, config: EngineConfig) -> Result<Self, CoreError> {
        config.validate()?;
        let mixer = ChannelMixer::from_config(&mut sink, &config.mixer)?;
        let (updates_tx, updates_rx) = crossbeam_channel::unbounded();
        Ok(PlaybackEngine {
            sink,
            config,
            synth: Synthesizer::new(config.voice),
            mixer,
            state: PlaybackState::Stopped,
            session: Session::Idle,
            bpm: 120.0,
            start_time: 0.0,
            pause_mark: 0.0,
            current_step: 0,
            loop_count: 0,
            finish_at: None,
            completed: false,
            on_complete: None,
            updates_tx,
            updates_rx,
            last_report: TickReport::default(),
        })
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn synth(&self) -> &Synthesizer {
        &self.synth
    }

    pub fn mixer(&self) -> &ChannelMixer {
        &self.mixer
    }

    /// The report of the most recent tick.
    pub fn last_report(&self) -> TickReport {
        self.last_report
    }

    /// True once a song has played to its natural end. Cleared by the next
    /// `start` or `start_song`.
    pub fn is_complete(&self) -> bool {
        self.completed
    }

    /// Register the completion callback, replacing any previous one. It
    /// fires at most once, when a song ends on its own; `stop()` never
    /// fires it.
    pub fn on_complete(&mut self, callback: impl FnOnce() + Send + 'static) {
        self.on_complete = Some(Box::new(callback));
    }

    pub fn pattern_updater(&self) -> PatternUpdater {
        PatternUpdater {
            tx: self.updates_tx.clone(),
        }
    }

    pub fn position(&self) -> Position {
        let (entry, loop_count) = match &self.session {
            Session::Song { cursor, .. } => (Some(cursor.entry()), cursor.loop_index()),
            _ => (None, self.loop_count),
        };
        Position {
            state: self.state,
            step: self.current_step,
            loop_count,
            entry,
            pattern_id: self.session.pattern().map(|p| p.id().to_string()),
        }
    }

    fn step_duration(&self) -> f64 {
        step_duration(self.bpm, self.config.scheduler.steps_per_beat)
    }

    /// Loop `pattern` at `bpm` from step 0. No-op (returns false) while
    /// already playing.
    pub fn start(&mut self, pattern: Pattern, bpm: f64) -> Result<bool, ValidationError> {
        let bpm = validate_bpm(bpm)?;
        if !self.prepare_start() {
            return Ok(false);
        }
        let pattern = Arc::new(pattern);
        self.apply_waveforms(&pattern);
        info!(pattern = pattern.name(), bpm, "playing pattern");
        self.session = Session::Pattern(pattern);
        self.begin(bpm);
        Ok(true)
    }

    /// Play `song` through its sequence `repeat_count` times, looking
    /// patterns up in `bank`. No-op (returns false) while already playing.
    pub fn start_song(&mut self, song: Song, bank: PatternBank) -> Result<bool, ValidationError> {
        song.validate_playable(&bank)?;
        let cursor = SongCursor::default();
        let current = cursor
            .pattern_id(&song)
            .and_then(|id| bank.get(id))
            .cloned()
            .ok_or_else(|| ValidationError::EmptySequence(song.name().to_string()))?;
        if !self.prepare_start() {
            return Ok(false);
        }
        self.apply_waveforms(&current);
        info!(
            song = song.name(),
            bpm = song.bpm(),
            entries = song.sequence().len(),
            repeat_count = song.repeat_count(),
            "playing song"
        );
        let bpm = song.bpm();
        self.session = Session::Song {
            song,
            bank,
            cursor,
            current,
        };
        self.begin(bpm);
        Ok(true)
    }

    /// Refuses while playing. A paused session is discarded and playback
    /// restarts from the top.
    fn prepare_start(&mut self) -> bool {
        match self.state {
            PlaybackState::Playing => {
                debug!("start ignored: already playing");
                false
            }
            PlaybackState::Paused => {
                self.halt();
                true
            }
            PlaybackState::Stopped => true,
        }
    }

    fn begin(&mut self, bpm: f64) {
        self.bpm = bpm;
        self.current_step = 0;
        self.loop_count = 0;
        self.finish_at = None;
        self.completed = false;
        self.start_time = self.sink.current_time();
        self.state = PlaybackState::Playing;
        debug!(start_time = self.start_time, "state -> playing");
    }

    /// Stop immediately: every voice is cut, the playhead returns to step 0
    /// and the session is dropped. Safe to call in any state.
    pub fn stop(&mut self) {
        self.halt();
    }

    fn halt(&mut self) {
        let mixer = &mut self.mixer;
        let stopped = self
            .synth
            .stop_all(&mut self.sink, |voice| mixer.release_node(voice.channel, voice.gain));
        self.session = Session::Idle;
        self.current_step = 0;
        self.loop_count = 0;
        self.finish_at = None;
        if self.state == PlaybackState::Stopped {
            debug!(voices = stopped, "already stopped");
        } else {
            debug!(voices = stopped, from = %self.state, "state -> stopped");
        }
        self.state = PlaybackState::Stopped;
    }

    /// Freeze the playhead. Only valid while playing.
    pub fn pause(&mut self) -> bool {
        if self.state != PlaybackState::Playing {
            debug!(state = %self.state, "pause ignored");
            return false;
        }
        self.pause_mark = self.sink.current_time();
        self.state = PlaybackState::Paused;
        debug!(at = self.pause_mark, "state -> paused");
        true
    }

    /// Continue from the paused step, shifting the schedule by the time
    /// spent paused. Only valid while paused.
    pub fn resume(&mut self) -> bool {
        if self.state != PlaybackState::Paused {
            debug!(state = %self.state, "resume ignored");
            return false;
        }
        let paused_for = self.sink.current_time() - self.pause_mark;
        self.start_time += paused_for;
        if let Some(finish_at) = self.finish_at.as_mut() {
            *finish_at += paused_for;
        }
        self.state = PlaybackState::Playing;
        debug!(paused_for, "state -> playing");
        true
    }

    /// Replace the pattern with `pattern`'s id without stopping. Returns
    /// false when no pattern with that id is part of the session.
    pub fn update_pattern(&mut self, pattern: Pattern) -> bool {
        let pattern = Arc::new(pattern);
        let replaced = match &mut self.session {
            Session::Idle => false,
            Session::Pattern(current) => {
                if current.id() == pattern.id() {
                    *current = pattern.clone();
                    true
                } else {
                    false
                }
            }
            Session::Song { bank, current, .. } => {
                if bank.contains(pattern.id()) {
                    *bank = bank.with_pattern(Pattern::clone(&pattern));
                    if current.id() == pattern.id() {
                        *current = pattern.clone();
                    }
                    true
                } else {
                    false
                }
            }
        };
        if !replaced {
            debug!(pattern = pattern.id(), "update ignored: pattern not in session");
            return false;
        }
        if self.session.pattern().is_some_and(|p| Arc::ptr_eq(p, &pattern)) {
            self.apply_waveforms(&pattern);
            // A shorter replacement may leave the playhead past its end.
            if self.state != PlaybackState::Stopped {
                let step_duration = self.step_duration();
                self.wrap_if_past_end(step_duration);
            }
        }
        debug!(pattern = pattern.id(), "pattern updated");
        true
    }

    /// Waveform for later notes on `channel`.
    pub fn set_waveform(&mut self, channel: usize, waveform: Waveform) {
        self.synth.set_waveform(channel, waveform);
    }

    pub fn set_master_volume(&mut self, volume: f64) -> Result<(), CoreError> {
        self.mixer.set_master_volume(&mut self.sink, volume)
    }

    pub fn set_channel_volume(&mut self, channel: usize, volume: f64) -> Result<(), CoreError> {
        self.mixer.set_channel_volume(&mut self.sink, channel, volume)
    }

    /// Cut every voice on `channel` without touching the playhead.
    pub fn stop_channel(&mut self, channel: usize) -> usize {
        let mixer = &mut self.mixer;
        self.synth
            .stop_channel(&mut self.sink, channel, |voice| mixer.release_node(voice.channel, voice.gain))
    }

    fn apply_waveforms(&mut self, pattern: &Pattern) {
        for (channel, &waveform) in pattern.waveforms().iter().enumerate() {
            self.synth.set_waveform(channel, waveform);
        }
    }

    /// Schedule every step that starts before `now + lookahead`.
    ///
    /// Pending pattern updates are applied first. At most
    /// `max_steps_per_tick` steps are scheduled per call however far the
    /// clock has run ahead; steps that are already late are scheduled at
    /// the current time.
    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();

        while let Ok(pattern) = self.updates_rx.try_recv() {
            self.update_pattern(pattern);
        }

        let mixer = &mut self.mixer;
        self.synth
            .reap_finished(&mut self.sink, |voice| mixer.release_node(voice.channel, voice.gain));

        if self.state != PlaybackState::Playing {
            self.last_report = report;
            return report;
        }

        let now = self.sink.current_time();
        if let Some(finish_at) = self.finish_at {
            if now >= finish_at {
                self.complete();
                report.completed = true;
            }
            self.last_report = report;
            return report;
        }

        let step_duration = self.step_duration();
        let horizon = now + self.config.scheduler.lookahead;
        let ceiling = self.config.scheduler.max_steps_per_tick;

        while self.finish_at.is_none() {
            let step_time = self.start_time + self.current_step as f64 * step_duration;
            if step_time >= horizon {
                break;
            }
            if report.steps_scheduled >= ceiling {
                report.ceiling_hit = true;
                warn!(ceiling, behind = now - step_time, "step ceiling reached, deferring to next tick");
                break;
            }
            self.schedule_step(step_time.max(now), step_duration, &mut report);
            report.steps_scheduled += 1;
            self.current_step += 1;
            self.wrap_if_past_end(step_duration);
        }

        self.last_report = report;
        report
    }

    fn schedule_step(&mut self, at: f64, step_duration: f64, report: &mut TickReport) {
        let Some(pattern) = self.session.pattern().cloned() else {
            return;
        };
        let Some(step) = pattern.step(self.current_step) else {
            return;
        };
        for (channel, note) in step.notes() {
            let event = NoteEvent::from_note(note, step_duration);
            let mixer = &mut self.mixer;
            let result = self.synth.play_note(&mut self.sink, channel, &event, at, |sink, gain| {
                mixer.connect_channel(sink, channel, gain)
            });
            match result {
                Ok(_) => report.notes_triggered += 1,
                Err(e) => {
                    warn!(step = self.current_step, channel, error = %e, "skipping note");
                    report.notes_skipped += 1;
                }
            }
        }
    }

    /// On passing the end of the current pattern: rebase `start_time` to
    /// the instant after the last played step and move to the next pattern
    /// instance.
    fn wrap_if_past_end(&mut self, step_duration: f64) {
        let Some(len) = self.session.pattern().map(|p| p.step_count()) else {
            return;
        };
        if self.current_step < len {
            return;
        }
        self.start_time += self.current_step as f64 * step_duration;
        self.current_step = 0;

        match &mut self.session {
            Session::Idle => {}
            Session::Pattern(_) => self.loop_count += 1,
            Session::Song {
                song,
                bank,
                cursor,
                current,
            } => match cursor.advance(song) {
                CursorMove::Finished => {
                    self.loop_count += 1;
                    debug!(finish_at = self.start_time, "last step scheduled");
                    self.finish_at = Some(self.start_time);
                }
                moved => {
                    if moved == CursorMove::NextLoop {
                        self.loop_count += 1;
                    }
                    match cursor.pattern_id(song).and_then(|id| bank.get(id)) {
                        Some(next) => *current = next.clone(),
                        None => {
                            warn!(entry = cursor.entry(), "sequence entry has no pattern, ending song");
                            self.finish_at = Some(self.start_time);
                            return;
                        }
                    }
                    let next = current.clone();
                    self.apply_waveforms(&next);
                }
            },
        }
    }

    fn complete(&mut self) {
        info!(loops = self.loop_count, "song complete");
        self.session = Session::Idle;
        self.current_step = 0;
        self.finish_at = None;
        self.state = PlaybackState::Stopped;
        self.completed = true;
        if let Some(callback) = self.on_complete.take() {
            callback();
        }
    }
}
