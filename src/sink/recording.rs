//! An in-memory sink with a manually driven clock.
//!
//! Records every node, automation point and connection instead of making
//! sound. Useful for headless driving of the scheduler and for asserting on
//! exactly what would have been sent to a real device.

use super::{AudioSink, NodeId};
use crate::dsp::envelope::GainPoint;
use crate::dsp::oscillator::Waveform;
use crate::error::SinkError;

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Destination,
    Oscillator {
        waveform: Waveform,
        /// `(at, hz)` frequency changes in call order.
        frequency: Vec<(f64, f64)>,
    },
    Gain {
        automation: Vec<GainPoint>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub kind: NodeKind,
    pub start: Option<f64>,
    pub stop: Option<f64>,
    pub outputs: Vec<NodeId>,
}

impl NodeRecord {
    fn new(kind: NodeKind) -> Self {
        NodeRecord {
            kind,
            start: None,
            stop: None,
            outputs: Vec::new(),
        }
    }

    /// Is this an oscillator that produces sound at time `t`?
    pub fn is_sounding_at(&self, t: f64) -> bool {
        matches!(self.kind, NodeKind::Oscillator { .. })
            && self.start.is_some_and(|start| start <= t)
            && self.stop.is_none_or(|stop| t < stop)
    }

    /// The most recent frequency assigned to an oscillator.
    pub fn frequency(&self) -> Option<f64> {
        match &self.kind {
            NodeKind::Oscillator { frequency, .. } => frequency.last().map(|(_, hz)| *hz),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordingSink {
    now: f64,
    nodes: Vec<NodeRecord>,
    reject_starts: bool,
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingSink {
    const DESTINATION: NodeId = NodeId(0);

    pub fn new() -> Self {
        RecordingSink {
            now: 0.0,
            nodes: vec![NodeRecord::new(NodeKind::Destination)],
            reject_starts: false,
        }
    }

    /// Make every following `start` fail, as a device that has gone away would.
    pub fn reject_starts(&mut self, reject: bool) {
        self.reject_starts = reject;
    }

    /// Move the clock forward by `seconds`.
    pub fn advance(&mut self, seconds: f64) {
        self.set_time(self.now + seconds);
    }

    /// Move the clock to `t`. The clock never runs backwards.
    pub fn set_time(&mut self, t: f64) {
        if t > self.now {
            self.now = t;
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeRecord> {
        self.nodes.get(id.0 as usize)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Every oscillator ever created, in creation order.
    pub fn oscillators(&self) -> impl Iterator<Item = (NodeId, &NodeRecord)> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| matches!(n.kind, NodeKind::Oscillator { .. }))
            .map(|(i, n)| (NodeId(i as u32), n))
    }

    /// Oscillators whose scheduled start lies in `[from, to)`.
    pub fn started_between(&self, from: f64, to: f64) -> Vec<(NodeId, &NodeRecord)> {
        self.oscillators()
            .filter(|(_, n)| n.start.is_some_and(|s| s >= from && s < to))
            .collect()
    }

    /// Number of oscillators producing sound at time `t`.
    pub fn sounding_at(&self, t: f64) -> usize {
        self.nodes.iter().filter(|n| n.is_sounding_at(t)).count()
    }

    fn record_mut(&mut self, id: NodeId) -> Result<&mut NodeRecord, SinkError> {
        self.nodes
            .get_mut(id.0 as usize)
            .ok_or(SinkError::UnknownNode(id))
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.push(NodeRecord::new(kind));
        NodeId((self.nodes.len() - 1) as u32)
    }

    fn automation_mut(&mut self, id: NodeId) -> Result<&mut Vec<GainPoint>, SinkError> {
        match &mut self.record_mut(id)?.kind {
            NodeKind::Gain { automation } => Ok(automation),
            _ => Err(SinkError::NotSchedulable(id)),
        }
    }
}

impl AudioSink for RecordingSink {
    fn current_time(&self) -> f64 {
        self.now
    }

    fn destination(&self) -> NodeId {
        Self::DESTINATION
    }

    fn create_oscillator(&mut self, waveform: Waveform) -> Result<NodeId, SinkError> {
        Ok(self.push(NodeKind::Oscillator {
            waveform,
            frequency: Vec::new(),
        }))
    }

    fn create_gain(&mut self) -> Result<NodeId, SinkError> {
        Ok(self.push(NodeKind::Gain {
            automation: vec![GainPoint::Set { value: 1.0, at: 0.0 }],
        }))
    }

    fn set_frequency(&mut self, node: NodeId, hz: f64, at: f64) -> Result<(), SinkError> {
        match &mut self.record_mut(node)?.kind {
            NodeKind::Oscillator { frequency, .. } => {
                frequency.push((at, hz));
                Ok(())
            }
            _ => Err(SinkError::NotSchedulable(node)),
        }
    }

    fn set_gain(&mut self, node: NodeId, value: f64, at: f64) -> Result<(), SinkError> {
        self.automation_mut(node)?.push(GainPoint::Set { value, at });
        Ok(())
    }

    fn ramp_gain(&mut self, node: NodeId, value: f64, end: f64) -> Result<(), SinkError> {
        self.automation_mut(node)?.push(GainPoint::Ramp { value, end });
        Ok(())
    }

    fn start(&mut self, node: NodeId, at: f64) -> Result<(), SinkError> {
        if self.reject_starts {
            return Err(SinkError::NotSchedulable(node));
        }
        let record = self.record_mut(node)?;
        if !matches!(record.kind, NodeKind::Oscillator { .. }) {
            return Err(SinkError::NotSchedulable(node));
        }
        if record.start.is_some() {
            return Err(SinkError::AlreadyStarted(node));
        }
        record.start = Some(at);
        Ok(())
    }

    fn stop(&mut self, node: NodeId, at: f64) -> Result<(), SinkError> {
        let now = self.now;
        let record = self.record_mut(node)?;
        if record.start.is_none() {
            return Err(SinkError::NotSchedulable(node));
        }
        if record.stop.is_some_and(|stop| stop <= now) {
            return Err(SinkError::AlreadyEnded(node));
        }
        record.stop = Some(at);
        Ok(())
    }

    fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), SinkError> {
        self.record_mut(to)?;
        let record = self.record_mut(from)?;
        if !record.outputs.contains(&to) {
            record.outputs.push(to);
        }
        Ok(())
    }

    fn disconnect(&mut self, node: NodeId) -> Result<(), SinkError> {
        self.record_mut(node)?.outputs.clear();
        Ok(())
    }
}
