//! Synthesizer: realizes notes as voices on an [`AudioSink`].

use std::collections::HashMap;

use tracing::debug;

use super::envelope::GainPoint;
use super::oscillator::Waveform;
use super::voice::{NoteEvent, Voice};
use crate::config::VoiceConfig;
use crate::error::CoreError;
use crate::sink::{AudioSink, NodeId};

/// Creates one oscillator + gain pair per note and tracks it until it ends.
#[derive(Debug, Clone)]
pub struct Synthesizer {
    config: VoiceConfig,
    waveforms: HashMap<usize, Waveform>,
    voices: Vec<Voice>,
}

impl Synthesizer {
    pub fn new(config: VoiceConfig) -> Self {
        Synthesizer {
            config,
            waveforms: HashMap::new(),
            voices: Vec::new(),
        }
    }

    /// Waveform for subsequent notes on `channel`. Sounding voices keep theirs.
    pub fn set_waveform(&mut self, channel: usize, waveform: Waveform) {
        self.waveforms.insert(channel, waveform);
    }

    pub fn waveform(&self, channel: usize) -> Waveform {
        self.waveforms
            .get(&channel)
            .copied()
            .unwrap_or(self.config.default_waveform)
    }

    /// Voices that have been triggered and not yet reaped or stopped.
    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    /// Schedule `event` on `channel` starting at sink time `start_time`.
    ///
    /// `connect` wires the voice's gain node into the mix and runs last. If
    /// any sink call or `connect` fails, the half-built voice is torn down
    /// and the error returned.
    pub fn play_note<S, F>(
        &mut self,
        sink: &mut S,
        channel: usize,
        event: &NoteEvent,
        start_time: f64,
        connect: F,
    ) -> Result<Voice, CoreError>
    where
        S: AudioSink,
        F: FnOnce(&mut S, NodeId) -> Result<(), CoreError>,
    {
        event.validate()?;

        let envelope = self.config.envelope;
        let stop_time = envelope.end_time(start_time, event.duration);

        let oscillator = sink.create_oscillator(self.waveform(channel))?;
        sink.set_frequency(oscillator, event.frequency(), start_time)?;

        let gain = sink.create_gain()?;
        for point in envelope.gain_points(start_time, event.duration, event.volume) {
            match point {
                GainPoint::Set { value, at } => sink.set_gain(gain, value, at)?,
                GainPoint::Ramp { value, end } => sink.ramp_gain(gain, value, end)?,
            }
        }

        // The mix only sees the gain node once the oscillator is scheduled.
        let scheduled = sink
            .connect(oscillator, gain)
            .and_then(|_| sink.start(oscillator, start_time))
            .and_then(|_| sink.stop(oscillator, stop_time));
        if let Err(e) = scheduled {
            abandon(sink, oscillator, gain, start_time);
            return Err(e.into());
        }
        if let Err(e) = connect(sink, gain) {
            abandon(sink, oscillator, gain, start_time);
            return Err(e);
        }

        let voice = Voice {
            channel,
            oscillator,
            gain,
            stop_time,
        };
        self.voices.push(voice);
        Ok(voice)
    }

    /// Drop voices whose scheduled stop has passed, unhooking their nodes.
    /// `on_ended` sees each reaped voice.
    pub fn reap_finished<S: AudioSink>(&mut self, sink: &mut S, mut on_ended: impl FnMut(&Voice)) -> usize {
        let now = sink.current_time();
        let before = self.voices.len();
        self.voices.retain(|voice| {
            if !voice.has_ended(now) {
                return true;
            }
            let _ = sink.disconnect(voice.oscillator);
            let _ = sink.disconnect(voice.gain);
            on_ended(voice);
            false
        });
        before - self.voices.len()
    }

    /// Silence every voice on `channel` immediately.
    pub fn stop_channel<S: AudioSink>(
        &mut self,
        sink: &mut S,
        channel: usize,
        mut on_stopped: impl FnMut(&Voice),
    ) -> usize {
        let before = self.voices.len();
        self.voices.retain(|voice| {
            if voice.channel != channel {
                return true;
            }
            hard_stop(sink, voice);
            on_stopped(voice);
            false
        });
        before - self.voices.len()
    }

    /// Silence every tracked voice immediately.
    pub fn stop_all<S: AudioSink>(&mut self, sink: &mut S, mut on_stopped: impl FnMut(&Voice)) -> usize {
        let stopped = self.voices.len();
        for voice in self.voices.drain(..) {
            hard_stop(sink, &voice);
            on_stopped(&voice);
        }
        stopped
    }
}

/// Cut a voice at the sink's current time. Voices that already ended on
/// their own are fine; the sink's complaint is only logged.
fn hard_stop<S: AudioSink>(sink: &mut S, voice: &Voice) {
    let now = sink.current_time();
    if let Err(e) = sink.stop(voice.oscillator, now) {
        debug!(channel = voice.channel, error = %e, "voice already stopped");
    }
    let _ = sink.set_gain(voice.gain, 0.0, now);
    let _ = sink.disconnect(voice.oscillator);
    let _ = sink.disconnect(voice.gain);
}

/// Silence and unhook a voice that never made it into the mix.
fn abandon<S: AudioSink>(sink: &mut S, oscillator: NodeId, gain: NodeId, start_time: f64) {
    let _ = sink.stop(oscillator, start_time);
    let _ = sink.disconnect(oscillator);
    let _ = sink.disconnect(gain);
}
