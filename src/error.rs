// Error taxonomy for the core. The binary wraps these in anyhow.

use std::io;

/// Invalid tempo, step count, sample rate or track set.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("BPM {0} is outside the supported range")]
    InvalidBpm(u32),

    #[error("step count must be at least 1")]
    InvalidSteps,

    #[error("export needs at least one track")]
    NoTracks,

    #[error("destination sample rate must be non-zero")]
    InvalidSampleRate,

    #[error("track '{track}' has {actual} steps, expected {expected}")]
    PatternLength {
        track: String,
        expected: usize,
        actual: usize,
    },
}

/// Raised by a `SampleSource` when a sound cannot be turned into PCM16.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("sample not found: {0}")]
    NotFound(String),

    #[error("malformed audio data: {0}")]
    Malformed(String),

    #[error("unsupported audio format: {0}")]
    Unsupported(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<hound::Error> for DecodeError {
    fn from(e: hound::Error) -> Self {
        match e {
            hound::Error::IoError(io) => DecodeError::Io(io),
            hound::Error::Unsupported => DecodeError::Unsupported("wav layout".to_string()),
            other => DecodeError::Malformed(other.to_string()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error("step {index} out of range for track '{track}' ({steps} steps)")]
    IndexOutOfRange {
        track: String,
        index: usize,
        steps: usize,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    #[error("failed to spawn the step clock thread: {0}")]
    Spawn(#[source] io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("invalid export config: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("failed to load sample for track '{track}': {source}")]
    SampleLoad {
        track: String,
        #[source]
        source: DecodeError,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("WAV encoding error: {0}")]
    Wav(#[from] hound::Error),

    #[error("an export is already in progress")]
    Busy,
}
