//! Shared transport state
//!
//! The only state shared between the worker context (engine `tick()`) and
//! the output context (`Mixer::render()`). Every lock here guards O(1)
//! bookkeeping; bulk audio moves exclusively through the playout buffers.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use uuid::Uuid;

use crate::playback::ring_buffer::PlayoutBuffer;
use crate::timing::samples_to_ticks;

/// Play/pause state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Playing,
    Paused,
}

impl PlaybackState {
    fn to_u8(self) -> u8 {
        match self {
            Self::Playing => 0,
            Self::Paused => 1,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Playing,
            _ => Self::Paused,
        }
    }
}

/// One stream on the deck: a passage the mixer is (or is about to be)
/// playing out of a buffer.
#[derive(Debug)]
pub struct StreamSlot {
    pub entry_id: Uuid,
    pub passage_id: Uuid,
    pub buffer: Arc<PlayoutBuffer>,
    /// Tick of the first frame this slot plays.
    pub start_ticks: i64,
    /// Position at which the next passage may begin overlapping
    /// (the passage's fade_out_start).
    pub overlap_start_ticks: i64,
    /// Frames this slot has delivered to the mixer.
    pub consumed_frames: u64,
    /// Set once the crossfade into the next slot has been announced.
    pub overlap_announced: bool,
}

impl StreamSlot {
    /// Playback position in ticks at the working rate.
    pub fn position_ticks(&self, working_rate: u32) -> i64 {
        self.start_ticks + samples_to_ticks(self.consumed_frames as i64, working_rate)
    }

    /// True once playback has reached the overlap window.
    pub fn in_overlap(&self, working_rate: u32) -> bool {
        self.position_ticks(working_rate) >= self.overlap_start_ticks
    }
}

/// The deck: the currently audible stream and the one queued behind it.
#[derive(Debug, Default)]
pub struct Deck {
    pub current: Option<StreamSlot>,
    pub next: Option<StreamSlot>,
}

/// Shared playback transport.
pub struct Transport {
    deck: Mutex<Deck>,
    state: AtomicU8,
    /// Master volume as f32 bits, clamped to [0, 1] on store.
    volume_bits: AtomicU32,
    /// Set by `play()` after a pause; consumed by the mixer to start the
    /// optional resume fade.
    resume_fade_pending: AtomicBool,
    /// Entry ids whose playback finished, awaiting engine reaping.
    finished: Mutex<Vec<Uuid>>,
}

impl Transport {
    pub fn new() -> Self {
        Self {
            deck: Mutex::new(Deck::default()),
            state: AtomicU8::new(PlaybackState::Paused.to_u8()),
            volume_bits: AtomicU32::new(1.0f32.to_bits()),
            resume_fade_pending: AtomicBool::new(false),
            finished: Mutex::new(Vec::new()),
        }
    }

    pub fn deck(&self) -> MutexGuard<'_, Deck> {
        match self.deck.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn playback_state(&self) -> PlaybackState {
        PlaybackState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set_playback_state(&self, state: PlaybackState) {
        self.state.store(state.to_u8(), Ordering::Release);
    }

    pub fn master_volume(&self) -> f32 {
        f32::from_bits(self.volume_bits.load(Ordering::Acquire))
    }

    /// Set master volume, clamped to [0, 1]. Takes effect on the next
    /// rendered sample.
    pub fn set_master_volume(&self, volume: f32) {
        let clamped = volume.clamp(0.0, 1.0);
        self.volume_bits.store(clamped.to_bits(), Ordering::Release);
    }

    pub fn request_resume_fade(&self) {
        self.resume_fade_pending.store(true, Ordering::Release);
    }

    /// Consume the resume-fade request, if one is pending.
    pub fn take_resume_fade(&self) -> bool {
        self.resume_fade_pending.swap(false, Ordering::AcqRel)
    }

    /// Called by the mixer when a slot's buffer is exhausted.
    pub fn push_finished(&self, entry_id: Uuid) {
        match self.finished.lock() {
            Ok(mut f) => f.push(entry_id),
            Err(poisoned) => poisoned.into_inner().push(entry_id),
        }
    }

    /// Drain finished entry ids for reaping.
    pub fn drain_finished(&self) -> Vec<Uuid> {
        match self.finished.lock() {
            Ok(mut f) => std::mem::take(&mut *f),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new()
    }
}
