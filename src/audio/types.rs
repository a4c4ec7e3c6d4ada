//! Core audio data types

use crate::error::{Error, Result};

/// A chunk of decoded audio: interleaved stereo f32 samples at the source's
/// native sample rate.
///
/// Index pattern: 0=left, 1=right, 2=left, 3=right, ...
/// Sample values are nominally in [-1.0, 1.0].
#[derive(Debug, Clone)]
pub struct AudioChunk {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioChunk {
    /// Create a chunk, rejecting odd sample counts (a frame is always a
    /// left/right pair).
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if samples.len() % 2 != 0 {
            return Err(Error::InvalidSampleCount(samples.len()));
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of stereo frames (samples / 2).
    pub fn frames(&self) -> usize {
        self.samples.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
