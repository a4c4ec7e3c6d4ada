//! Cadenza: streaming audio playback with sample-accurate crossfading
//!
//! Cadenza decodes queued passages through per-passage chains
//! (decode -> resample -> fade -> ring buffer) scheduled cooperatively on
//! a single worker, and mixes the resulting pre-faded streams in a
//! real-time-safe output path. Timing is fixed-point throughout: all
//! positions are ticks at 28,224,000 per second, which every supported
//! sample rate divides evenly.
//!
//! The engine owns no threads. A host drives it by calling
//! [`PlaybackEngine::tick`] (or via [`audio::spawn_tick_driver`]) while
//! the [`Mixer`] runs in the audio device callback:
//!
//! ```no_run
//! use cadenza::{EngineConfig, Passage, PassageTiming, PlaybackEngine};
//!
//! # fn main() -> cadenza::Result<()> {
//! let (mut engine, mut mixer) = PlaybackEngine::new(EngineConfig::default())?;
//! let timing = PassageTiming::full(0, cadenza::timing::TICK_RATE * 30);
//! engine.enqueue(Passage::from_file("track.flac", timing)?);
//! engine.play();
//!
//! let mut block = vec![0.0f32; 512 * 2];
//! loop {
//!     engine.tick();
//!     mixer.render(&mut block); // normally the device callback's job
//! #   break;
//! }
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod events;
pub mod playback;
pub mod timing;

pub use audio::{AudioChunk, ChunkDecoder, DecoderSource, FileSource};
pub use config::{EngineConfig, ResumeFadeConfig};
pub use error::{Error, Result};
pub use events::{EventBus, PlayerEvent};
pub use playback::{
    FadeCurve, Mixer, Passage, PlaybackEngine, PlaybackState, ProcessResult,
};
pub use timing::PassageTiming;
