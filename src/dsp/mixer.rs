//! Mixing: the real-time channel bus graph and the offline step mixer.

use tracing::debug;

use crate::config::MixerConfig;
use crate::error::{CoreError, ValidationError};
use crate::sink::{AudioSink, NodeId};

/// A fixed set of channel gain buses feeding one master gain.
///
/// ```text
/// voice gain ─┐
/// voice gain ─┼─> channel bus[i] ─┐
///             │                   ├─> master ─> destination
///           ...   channel bus[j] ─┘
/// ```
#[derive(Debug, Clone)]
pub struct ChannelMixer {
    master: NodeId,
    master_volume: f64,
    buses: Vec<NodeId>,
    channel_volumes: Vec<f64>,
    /// Nodes currently routed into each bus.
    active: Vec<Vec<NodeId>>,
}

impl ChannelMixer {
    /// Build the bus graph on `sink`: one bus per channel in `[0, max_channels)`.
    pub fn new<S: AudioSink>(sink: &mut S, max_channels: usize, master_volume: f64) -> Result<Self, CoreError> {
        if max_channels == 0 {
            return Err(ValidationError::NonPositive {
                field: "Channel count",
                value: 0.0,
            }
            .into());
        }
        let now = sink.current_time();
        let master_volume = clamp_volume(master_volume);

        let master = sink.create_gain()?;
        sink.set_gain(master, master_volume, now)?;
        let destination = sink.destination();
        sink.connect(master, destination)?;

        let mut buses = Vec::with_capacity(max_channels);
        for _ in 0..max_channels {
            let bus = sink.create_gain()?;
            sink.set_gain(bus, 1.0, now)?;
            sink.connect(bus, master)?;
            buses.push(bus);
        }

        Ok(ChannelMixer {
            master,
            master_volume,
            buses,
            channel_volumes: vec![1.0; max_channels],
            active: vec![Vec::new(); max_channels],
        })
    }

    pub fn from_config<S: AudioSink>(sink: &mut S, config: &MixerConfig) -> Result<Self, CoreError> {
        Self::new(sink, config.max_channels, config.master_volume)
    }

    pub fn max_channels(&self) -> usize {
        self.buses.len()
    }

    pub fn master(&self) -> NodeId {
        self.master
    }

    pub fn bus(&self, index: usize) -> Option<NodeId> {
        self.buses.get(index).copied()
    }

    fn check_index(&self, index: usize) -> Result<(), ValidationError> {
        if index >= self.buses.len() {
            return Err(ValidationError::MixerChannelOutOfRange {
                index,
                max_channels: self.buses.len(),
            });
        }
        Ok(())
    }

    /// Route `node` into channel `index`'s bus.
    pub fn connect_channel<S: AudioSink>(&mut self, sink: &mut S, index: usize, node: NodeId) -> Result<(), CoreError> {
        self.check_index(index)?;
        sink.connect(node, self.buses[index])?;
        if !self.active[index].contains(&node) {
            self.active[index].push(node);
        }
        Ok(())
    }

    /// Unhook every node routed into channel `index`. Empty channels are fine.
    pub fn disconnect_channel<S: AudioSink>(&mut self, sink: &mut S, index: usize) -> Result<(), ValidationError> {
        self.check_index(index)?;
        for node in self.active[index].drain(..) {
            if let Err(e) = sink.disconnect(node) {
                debug!(channel = index, error = %e, "node already gone");
            }
        }
        Ok(())
    }

    pub fn disconnect_all<S: AudioSink>(&mut self, sink: &mut S) {
        for index in 0..self.buses.len() {
            let _ = self.disconnect_channel(sink, index);
        }
    }

    /// Forget a node that has already been unhooked elsewhere.
    pub fn release_node(&mut self, index: usize, node: NodeId) {
        if let Some(nodes) = self.active.get_mut(index) {
            nodes.retain(|n| *n != node);
        }
    }

    /// True exactly for indices in `[0, max_channels)`.
    pub fn is_channel_available(&self, index: usize) -> bool {
        index < self.buses.len()
    }

    /// Channels with at least one node routed into them.
    pub fn active_channel_count(&self) -> usize {
        self.active.iter().filter(|nodes| !nodes.is_empty()).count()
    }

    pub fn active_nodes(&self, index: usize) -> &[NodeId] {
        self.active.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn master_volume(&self) -> f64 {
        self.master_volume
    }

    /// Set the master gain, clamped to [0, 1].
    pub fn set_master_volume<S: AudioSink>(&mut self, sink: &mut S, volume: f64) -> Result<(), CoreError> {
        let now = sink.current_time();
        self.master_volume = clamp_volume(volume);
        sink.set_gain(self.master, self.master_volume, now)?;
        Ok(())
    }

    pub fn channel_volume(&self, index: usize) -> Option<f64> {
        self.channel_volumes.get(index).copied()
    }

    /// Set one bus's gain, clamped to [0, 1].
    pub fn set_channel_volume<S: AudioSink>(&mut self, sink: &mut S, index: usize, volume: f64) -> Result<(), CoreError> {
        self.check_index(index)?;
        let volume = clamp_volume(volume);
        self.channel_volumes[index] = volume;
        let now = sink.current_time();
        sink.set_gain(self.buses[index], volume, now)?;
        Ok(())
    }
}

fn clamp_volume(volume: f64) -> f64 {
    if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) }
}

/// Sums the channels sounding in one offline step.
///
/// Output is divided by the number of contributing channels when more than
/// one sounded, so a full step can never exceed the loudest single channel.
#[derive(Debug, Clone)]
pub struct StepMix {
    buffer: Vec<f32>,
    sources: usize,
}

impl StepMix {
    pub fn new(num_samples: usize) -> Self {
        StepMix {
            buffer: vec![0.0; num_samples],
            sources: 0,
        }
    }

    /// Add one channel's samples. Extra samples beyond the step are dropped.
    pub fn add_channel(&mut self, samples: impl IntoIterator<Item = f32>) {
        for (slot, sample) in self.buffer.iter_mut().zip(samples) {
            *slot += sample;
        }
        self.sources += 1;
    }

    pub fn sources(&self) -> usize {
        self.sources
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// The normalized mix.
    pub fn finish(mut self) -> Vec<f32> {
        if self.sources > 1 {
            let scale = 1.0 / self.sources as f32;
            for s in &mut self.buffer {
                *s *= scale;
            }
        }
        self.buffer
    }
}
