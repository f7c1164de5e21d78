//! The audio-sink capability consumed by the real-time path.
//!
//! The core never owns an audio device. It builds a small node graph
//! (oscillators → gains → destination) through this trait and schedules
//! every parameter change against the sink's own clock.

mod recording;

pub use recording::{NodeKind, NodeRecord, RecordingSink};

use crate::dsp::oscillator::Waveform;
use crate::error::SinkError;

/// Handle to a node owned by an [`AudioSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// Node-graph audio output with a monotonically increasing clock.
pub trait AudioSink {
    /// Current time of the sink's clock, in seconds.
    fn current_time(&self) -> f64;

    /// The final output node.
    fn destination(&self) -> NodeId;

    /// Create an oscillator producing `waveform`.
    fn create_oscillator(&mut self, waveform: Waveform) -> Result<NodeId, SinkError>;

    /// Create a gain node with an initial gain of 1.
    fn create_gain(&mut self) -> Result<NodeId, SinkError>;

    /// Set an oscillator's frequency from time `at` onwards.
    fn set_frequency(&mut self, node: NodeId, hz: f64, at: f64) -> Result<(), SinkError>;

    /// Set a gain node's value at time `at`.
    fn set_gain(&mut self, node: NodeId, value: f64, at: f64) -> Result<(), SinkError>;

    /// Ramp a gain node linearly to `value`, arriving at `end`.
    fn ramp_gain(&mut self, node: NodeId, value: f64, end: f64) -> Result<(), SinkError>;

    /// Start an oscillator at time `at`. A node may only be started once.
    fn start(&mut self, node: NodeId, at: f64) -> Result<(), SinkError>;

    /// Stop an oscillator at time `at`.
    fn stop(&mut self, node: NodeId, at: f64) -> Result<(), SinkError>;

    /// Route `from`'s output into `to`.
    fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), SinkError>;

    /// Remove every outgoing connection of `node`.
    fn disconnect(&mut self, node: NodeId) -> Result<(), SinkError>;
}
