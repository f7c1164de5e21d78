//! DSP: synthesis, mixing and offline rendering.
//!
//! The real-time path (`synth`, `mixer`, `voice`) only describes nodes and
//! automation to an [`AudioSink`](crate::sink::AudioSink); the offline path
//! (`renderer`, `wav`) computes samples itself.

pub mod envelope;
pub mod mixer;
pub mod oscillator;
pub mod pitch;
pub mod renderer;
pub mod synth;
pub mod voice;
pub mod wav;
