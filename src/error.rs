//! Error types for the playback pipeline

use thiserror::Error;

/// Playback pipeline errors.
///
/// Decode, resample, and I/O errors are fatal to the decoder chain that
/// produced them, never to the worker or the engine. A full ring buffer is
/// a scheduling signal (`ProcessResult::BufferFull`), not an error.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Resample error ({source_rate} Hz -> {target_rate} Hz): {message}")]
    Resample {
        source_rate: u32,
        target_rate: u32,
        message: String,
    },

    /// Interleaved stereo buffers must contain an even number of samples.
    #[error("Invalid sample count: {0} (interleaved stereo requires an even count)")]
    InvalidSampleCount(usize),

    #[error("Invalid passage timing: {0}")]
    InvalidTiming(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Audio output error: {0}")]
    AudioOutput(String),
}

pub type Result<T> = std::result::Result<T, Error>;
