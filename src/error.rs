use crate::sink::NodeId;

/// A data-model or API-boundary invariant was violated.
///
/// Raised synchronously at the call site; the message is meant to be shown
/// to the user as-is.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Channel {channel} exceeds pattern channel limit of {limit}")]
    ChannelOutOfRange { channel: usize, limit: usize },

    #[error("Channel {index} is outside the mixer range 0..{max_channels}")]
    MixerChannelOutOfRange { index: usize, max_channels: usize },

    #[error("Step {step} is outside the pattern range 0..{step_count}")]
    StepOutOfRange { step: usize, step_count: usize },

    #[error("{field} must be a positive finite number, got {value}")]
    NonPositive { field: &'static str, value: f64 },

    #[error("Repeat count must be a positive finite integer, got {0}")]
    InvalidRepeatCount(f64),

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("Volume must be within [0, 1], got {0}")]
    VolumeOutOfRange(f64),

    #[error("Pitch {0} is outside the MIDI range 0..=127")]
    PitchOutOfRange(i32),

    #[error("Unknown note name '{0}'")]
    UnknownNoteName(String),

    #[error("Unknown waveform '{0}' (expected square, triangle, sawtooth or sine)")]
    UnknownWaveform(String),

    #[error("Song '{0}' has an empty pattern sequence")]
    EmptySequence(String),

    #[error("Pattern '{0}' is not in the pattern bank")]
    UnknownPattern(String),

    #[error("Song '{0}' has too many steps to play")]
    TooManySteps(String),
}

/// Offline export failed. No partial output is ever produced.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Unsupported bit depth: {0} (expected 8, 16, 24 or 32)")]
    UnsupportedBitDepth(u16),

    #[error("Unsupported channel count: {0} (expected 1 or 2)")]
    UnsupportedChannelCount(u16),

    #[error("Sample rate must be positive")]
    InvalidSampleRate,

    #[error("Song '{0}' has no finite duration")]
    EmptySong(String),

    #[error("WAV data chunk too large: {0} bytes")]
    DataTooLarge(u64),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// An audio sink rejected a node operation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SinkError {
    #[error("Unknown audio node {0:?}")]
    UnknownNode(NodeId),

    #[error("Audio node {0:?} was already started")]
    AlreadyStarted(NodeId),

    #[error("Audio node {0:?} has already ended")]
    AlreadyEnded(NodeId),

    #[error("Audio node {0:?} cannot be scheduled")]
    NotSchedulable(NodeId),
}

/// Umbrella error for entry points that cross several layers.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Audio sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Invalid song document: {0}")]
    Json(#[from] serde_json::Error),
}
