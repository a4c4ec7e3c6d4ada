//! Fade envelope application
//!
//! Applies per-sample volume envelopes to audio buffers using the passage
//! timing points, in the tick domain for sample-accurate fades at any
//! working rate. Fades are applied in the decode path, before audio enters
//! the playout buffer, so the mixer sums pre-faded streams.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::timing::{ticks_per_sample, PassageTiming};

/// Fade curve shapes.
///
/// Each maps fade progress x in [0, 1] to a volume multiplier y in [0, 1],
/// with y(0) = 0 and y(1) = 1. Fade-out uses the same shapes mirrored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FadeCurve {
    /// y = x^2 (slow start, fast finish)
    Exponential,
    /// y = sqrt(x) (fast start, slow finish)
    Logarithmic,
    /// y = (1 - cos(pi * x)) / 2 (smooth S-curve)
    Cosine,
    /// y = x
    Linear,
}

impl FadeCurve {
    /// Evaluate the curve at progress `x` (clamped to [0, 1]).
    pub fn apply(&self, x: f32) -> f32 {
        let x = x.clamp(0.0, 1.0);
        match self {
            Self::Exponential => x * x,
            Self::Logarithmic => x.sqrt(),
            Self::Cosine => (1.0 - (std::f32::consts::PI * x).cos()) / 2.0,
            Self::Linear => x,
        }
    }
}

/// Per-chain fade state: passage timing plus the current playback
/// position in ticks. The position only moves forward.
pub struct Fader {
    timing: PassageTiming,
    fade_in_curve: FadeCurve,
    fade_out_curve: FadeCurve,
    position_ticks: i64,
    ticks_per_frame: i64,
}

impl Fader {
    /// Create a fader positioned at the passage start.
    pub fn new(
        timing: PassageTiming,
        fade_in_curve: FadeCurve,
        fade_out_curve: FadeCurve,
        sample_rate: u32,
    ) -> Result<Self> {
        timing.validate()?;
        debug!(
            fade_in_ticks = timing.fade_in_duration(),
            fade_out_ticks = timing.fade_out_duration(),
            sample_rate,
            "fader created"
        );
        Ok(Self {
            timing,
            fade_in_curve,
            fade_out_curve,
            position_ticks: timing.start,
            ticks_per_frame: ticks_per_sample(sample_rate),
        })
    }

    /// Current playback position in ticks.
    pub fn position_ticks(&self) -> i64 {
        self.position_ticks
    }

    /// Apply the fade envelope in place, advancing the position one frame
    /// of ticks per stereo frame. Rejects odd-length buffers.
    pub fn apply_fade(&mut self, samples: &mut [f32]) -> Result<()> {
        if samples.len() % 2 != 0 {
            return Err(Error::InvalidSampleCount(samples.len()));
        }

        for frame in samples.chunks_exact_mut(2) {
            let multiplier = self.multiplier_at(self.position_ticks);
            if multiplier != 1.0 {
                frame[0] *= multiplier;
                frame[1] *= multiplier;
            }
            self.position_ticks += self.ticks_per_frame;
        }
        Ok(())
    }

    /// Volume multiplier at an absolute tick position.
    ///
    /// Zero before `start` and from `end` onward; fade-in curve inside
    /// [fade_in_start, lead_in_start); fade-out curve inside
    /// [fade_out_start, end); 1.0 everywhere else.
    pub fn multiplier_at(&self, ticks: i64) -> f32 {
        let t = &self.timing;

        if ticks < t.start || ticks >= t.end {
            return 0.0;
        }

        if ticks < t.lead_in_start && t.fade_in_duration() > 0 {
            if ticks < t.fade_in_start {
                // Audible gap before the fade-in region begins
                return 0.0;
            }
            let progress =
                (ticks - t.fade_in_start) as f32 / t.fade_in_duration() as f32;
            return self.fade_in_curve.apply(progress);
        }

        if ticks >= t.fade_out_start && t.fade_out_duration() > 0 {
            let progress =
                (ticks - t.fade_out_start) as f32 / t.fade_out_duration() as f32;
            // Mirror the curve: progress 0 = full volume, 1 = silence
            return self.fade_out_curve.apply(1.0 - progress);
        }

        1.0
    }
}
