//! Engine configuration
//!
//! All knobs for the playback pipeline, loadable from TOML. Every field has
//! a production default, so `EngineConfig::default()` is a working
//! configuration and a TOML file only needs to name what it overrides.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::playback::FadeCurve;
use crate::timing::is_supported_rate;

/// Playback engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Working sample rate everything is resampled to (Hz).
    pub working_sample_rate: u32,

    /// Playout ring buffer capacity in stereo frames (~15 s at 44.1 kHz).
    pub buffer_capacity_frames: usize,

    /// Low-water mark: the decoder yields when free space drops to this
    /// many frames (~100 ms at 44.1 kHz).
    pub buffer_headroom_frames: usize,

    /// Resume margin above the headroom: a yielded decoder resumes only
    /// once free space reaches `headroom + resume_margin` frames (~1 s at
    /// 44.1 kHz). The gap between the two marks prevents yield thrash.
    pub resume_margin_frames: usize,

    /// How many queue entries may hold decoder chains at once (the current
    /// passage plus lookahead).
    pub max_buffering_chains: usize,

    /// Per-frame multiplier applied to the last output sample while paused.
    pub pause_decay_factor: f32,

    /// Below this magnitude the pause decay snaps to exactly 0.0.
    pub pause_decay_floor: f32,

    /// Optional fade-in applied when resuming from pause.
    pub resume_fade: ResumeFadeConfig,
}

/// Resume-from-pause fade-in settings. Disabled by default: resuming
/// continues at full level from the paused position.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResumeFadeConfig {
    pub enabled: bool,
    pub duration_ms: u64,
    pub curve: FadeCurve,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            working_sample_rate: 44_100,
            buffer_capacity_frames: 661_941,
            buffer_headroom_frames: 4_410,
            resume_margin_frames: 44_100,
            max_buffering_chains: 2,
            pause_decay_factor: 0.96875,
            pause_decay_floor: 0.000_177_8,
            resume_fade: ResumeFadeConfig::default(),
        }
    }
}

impl Default for ResumeFadeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            duration_ms: 500,
            curve: FadeCurve::Exponential,
        }
    }
}

impl EngineConfig {
    /// Parse a TOML configuration string.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(s).map_err(|e| Error::Config(format!("invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Check field ranges and the hysteresis mark ordering.
    pub fn validate(&self) -> Result<()> {
        if !is_supported_rate(self.working_sample_rate) {
            return Err(Error::Config(format!(
                "working_sample_rate {} Hz does not divide the tick rate",
                self.working_sample_rate
            )));
        }
        if self.buffer_capacity_frames == 0 {
            return Err(Error::Config("buffer_capacity_frames must be > 0".into()));
        }
        if self.buffer_headroom_frames + self.resume_margin_frames >= self.buffer_capacity_frames {
            return Err(Error::Config(format!(
                "headroom ({}) + resume margin ({}) must be below capacity ({})",
                self.buffer_headroom_frames, self.resume_margin_frames, self.buffer_capacity_frames
            )));
        }
        if self.max_buffering_chains == 0 {
            return Err(Error::Config("max_buffering_chains must be >= 1".into()));
        }
        if !(0.0..1.0).contains(&self.pause_decay_factor) {
            return Err(Error::Config(format!(
                "pause_decay_factor {} outside [0, 1)",
                self.pause_decay_factor
            )));
        }
        if self.pause_decay_floor <= 0.0 {
            return Err(Error::Config("pause_decay_floor must be > 0".into()));
        }
        Ok(())
    }
}
