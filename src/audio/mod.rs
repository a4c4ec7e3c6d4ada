//! Audio decoding, resampling, and device output

pub mod decoder;
pub mod output;
pub mod resampler;
pub mod types;

pub use decoder::{ChunkDecoder, DecoderSource, FileSource, StreamingDecoder};
pub use output::{spawn_tick_driver, AudioOutput};
pub use resampler::StatefulResampler;
pub use types::AudioChunk;
