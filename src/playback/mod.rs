//! Playback pipeline: buffering, fading, scheduling, and mixing

pub mod chain;
pub mod engine;
pub mod fader;
pub mod mixer;
pub mod queue;
pub mod ring_buffer;
pub mod transport;
pub mod worker;

pub use chain::{DecoderChain, ProcessResult};
pub use engine::PlaybackEngine;
pub use fader::{FadeCurve, Fader};
pub use mixer::Mixer;
pub use queue::{Passage, PlayQueue, QueueEntry};
pub use ring_buffer::PlayoutBuffer;
pub use transport::{Deck, PlaybackState, StreamSlot, Transport};
pub use worker::{ChainState, DecoderWorker, WorkerOutcome};
