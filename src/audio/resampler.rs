//! Sample rate conversion
//!
//! Converts decoded audio from its native rate to the working rate using
//! rubato's polynomial resampler. One resampler instance lives for the
//! whole passage: the interpolation filter state carries across chunk
//! boundaries, so there are no seams between chunks.

use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::debug;

use crate::error::{Error, Result};

/// Streaming resampler for one decoder chain.
///
/// `FastFixedIn` takes a fixed number of input frames per call, which is
/// why decoders emit fixed-size chunks; the final short chunk goes through
/// `process_partial`, which pads internally.
pub enum StatefulResampler {
    /// Source already at the working rate; samples pass through untouched.
    PassThrough,
    Active {
        resampler: FastFixedIn<f32>,
        source_rate: u32,
        target_rate: u32,
        chunk_frames: usize,
    },
}

impl StatefulResampler {
    /// Create a resampler for `source_rate` -> `target_rate` stereo audio,
    /// fed `chunk_frames` frames per call.
    pub fn new(source_rate: u32, target_rate: u32, chunk_frames: usize) -> Result<Self> {
        if source_rate == target_rate {
            return Ok(Self::PassThrough);
        }
        if chunk_frames == 0 {
            return Err(Error::Resample {
                source_rate,
                target_rate,
                message: "chunk size must be > 0".into(),
            });
        }

        let ratio = target_rate as f64 / source_rate as f64;
        let resampler = FastFixedIn::<f32>::new(ratio, 1.0, PolynomialDegree::Septic, chunk_frames, 2)
            .map_err(|e| Error::Resample {
                source_rate,
                target_rate,
                message: e.to_string(),
            })?;

        debug!(source_rate, target_rate, chunk_frames, "resampler created");

        Ok(Self::Active {
            resampler,
            source_rate,
            target_rate,
            chunk_frames,
        })
    }

    pub fn is_pass_through(&self) -> bool {
        matches!(self, Self::PassThrough)
    }

    /// Resample one interleaved stereo chunk.
    ///
    /// Full chunks must hold exactly the configured frame count; a shorter
    /// chunk is treated as the final one.
    pub fn process_chunk(&mut self, samples: &[f32]) -> Result<Vec<f32>> {
        if samples.len() % 2 != 0 {
            return Err(Error::InvalidSampleCount(samples.len()));
        }

        match self {
            Self::PassThrough => Ok(samples.to_vec()),
            Self::Active {
                resampler,
                source_rate,
                target_rate,
                chunk_frames,
            } => {
                let frames = samples.len() / 2;
                if frames > *chunk_frames {
                    return Err(Error::Resample {
                        source_rate: *source_rate,
                        target_rate: *target_rate,
                        message: format!(
                            "chunk of {} frames exceeds configured size {}",
                            frames, *chunk_frames
                        ),
                    });
                }

                let planar = deinterleave(samples);
                let output = if frames == *chunk_frames {
                    resampler.process(&planar, None)
                } else {
                    resampler.process_partial(Some(&planar), None)
                }
                .map_err(|e| Error::Resample {
                    source_rate: *source_rate,
                    target_rate: *target_rate,
                    message: e.to_string(),
                })?;

                Ok(interleave(&output))
            }
        }
    }
}

/// Split interleaved stereo into rubato's planar layout.
fn deinterleave(samples: &[f32]) -> [Vec<f32>; 2] {
    let frames = samples.len() / 2;
    let mut left = Vec::with_capacity(frames);
    let mut right = Vec::with_capacity(frames);
    for pair in samples.chunks_exact(2) {
        left.push(pair[0]);
        right.push(pair[1]);
    }
    [left, right]
}

/// Rejoin planar channels into interleaved stereo.
fn interleave(channels: &[Vec<f32>]) -> Vec<f32> {
    let frames = channels[0].len().min(channels[1].len());
    let mut out = Vec::with_capacity(frames * 2);
    for i in 0..frames {
        out.push(channels[0][i]);
        out.push(channels[1][i]);
    }
    out
}
