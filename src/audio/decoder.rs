//! Audio decoding
//!
//! The pipeline consumes decoders through the narrow [`ChunkDecoder`]
//! contract, so decoder chains can be driven by anything that produces
//! interleaved stereo chunks. [`StreamingDecoder`] is the production
//! implementation, backed by symphonia (MP3, FLAC, AAC/M4A, Ogg Vorbis,
//! WAV).
//!
//! Decoders emit fixed-size chunks (one second at the source's native
//! rate); only the final chunk may be shorter. The resampler relies on
//! this.

use std::fs::File;
use std::path::{Path, PathBuf};

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use crate::audio::types::AudioChunk;
use crate::error::{Error, Result};
use crate::timing::ticks_to_samples;

/// Pull-based chunked decoding.
///
/// Returns `Ok(Some(chunk))` while audio remains, then `Ok(None)` once at
/// end of stream. Every chunk except the last must hold the same number of
/// frames, and all chunks from one decoder share one sample rate. Errors
/// are fatal to this decoder; callers must not call `decode_chunk` again
/// after an error.
pub trait ChunkDecoder: Send {
    fn decode_chunk(&mut self) -> Result<Option<AudioChunk>>;
}

/// Factory for decoders, bound late: the decoder is opened when a decoder
/// chain starts buffering the passage, not when it is enqueued.
pub trait DecoderSource: Send + Sync {
    fn open_decoder(&self) -> Result<Box<dyn ChunkDecoder>>;
}

/// A file on disk, cropped to a tick range. The first frame the decoder
/// emits corresponds to `start_ticks` into the file.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    start_ticks: i64,
    end_ticks: Option<i64>,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>, start_ticks: i64, end_ticks: Option<i64>) -> Self {
        Self {
            path: path.into(),
            start_ticks,
            end_ticks,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DecoderSource for FileSource {
    fn open_decoder(&self) -> Result<Box<dyn ChunkDecoder>> {
        let decoder = StreamingDecoder::open(&self.path, self.start_ticks, self.end_ticks)?;
        Ok(Box::new(decoder))
    }
}

/// Streaming symphonia decoder.
///
/// Decodes packet by packet, converts every source format to interleaved
/// stereo f32, skips to the start offset, and stops at the end offset.
pub struct StreamingDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_buf: Option<SampleBuffer<f32>>,
    source_rate: u32,
    source_channels: usize,
    /// Frames per emitted chunk (one second at the source rate).
    chunk_frames: usize,
    /// Stereo samples decoded but not yet emitted.
    pending: Vec<f32>,
    /// Frames still to drop before the passage start.
    frames_to_skip: u64,
    /// Frames left until the passage end; `None` plays to end of file.
    frames_remaining: Option<u64>,
    eof: bool,
}

impl StreamingDecoder {
    /// Open an audio file and position the decode cursor at `start_ticks`.
    pub fn open(path: &Path, start_ticks: i64, end_ticks: Option<i64>) -> Result<Self> {
        let file = File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| Error::Decode(format!("unsupported format: {}", e)))?;
        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::Decode("no supported audio track".into()))?;
        let track_id = track.id;

        let source_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| Error::Decode("source sample rate unknown".into()))?;
        let source_channels = track
            .codec_params
            .channels
            .map(|c| c.count())
            .unwrap_or(2);

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| Error::Decode(format!("codec init failed: {}", e)))?;

        let frames_to_skip = ticks_to_samples(start_ticks, source_rate).max(0) as u64;
        let frames_remaining = end_ticks.map(|end| {
            let total = ticks_to_samples(end - start_ticks, source_rate).max(0);
            total as u64
        });

        debug!(
            path = %path.display(),
            source_rate,
            source_channels,
            frames_to_skip,
            "opened decoder"
        );

        Ok(Self {
            format,
            decoder,
            track_id,
            sample_buf: None,
            source_rate,
            source_channels,
            chunk_frames: source_rate as usize,
            pending: Vec::new(),
            frames_to_skip,
            frames_remaining,
            eof: false,
        })
    }

    pub fn source_rate(&self) -> u32 {
        self.source_rate
    }

    /// Decode one packet into `pending`, applying skip/stop bounds.
    /// Sets `eof` when the stream or the passage range ends.
    fn decode_packet(&mut self) -> Result<()> {
        let packet = loop {
            match self.format.next_packet() {
                Ok(p) if p.track_id() == self.track_id => break p,
                Ok(_) => continue,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    self.eof = true;
                    return Ok(());
                }
                Err(SymphoniaError::ResetRequired) => {
                    // Chained streams (e.g. chained Ogg) start a new logical
                    // stream here; the passage ends with the first one.
                    self.eof = true;
                    return Ok(());
                }
                Err(e) => return Err(Error::Decode(format!("packet read failed: {}", e))),
            }
        };

        let decoded = match self.decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(e)) => {
                // Recoverable per symphonia's contract: skip the bad packet
                warn!("skipping undecodable packet: {}", e);
                return Ok(());
            }
            Err(e) => return Err(Error::Decode(format!("decode failed: {}", e))),
        };

        let spec = *decoded.spec();
        let duration = decoded.capacity() as u64;
        let needed = decoded.capacity() * spec.channels.count();
        let buf = match &mut self.sample_buf {
            Some(buf) if buf.capacity() >= needed => buf,
            slot => slot.insert(SampleBuffer::<f32>::new(duration, spec)),
        };
        buf.copy_interleaved_ref(decoded);
        let samples = buf.samples();

        let mut frames = interleaved_to_stereo(samples, self.source_channels);

        // Skip toward the passage start
        if self.frames_to_skip > 0 {
            let available = (frames.len() / 2) as u64;
            let skip = self.frames_to_skip.min(available);
            frames.drain(..(skip as usize * 2));
            self.frames_to_skip -= skip;
            if frames.is_empty() {
                return Ok(());
            }
        }

        // Truncate at the passage end
        if let Some(remaining) = &mut self.frames_remaining {
            let available = (frames.len() / 2) as u64;
            if available >= *remaining {
                frames.truncate(*remaining as usize * 2);
                *remaining = 0;
                self.eof = true;
            } else {
                *remaining -= available;
            }
        }

        self.pending.extend_from_slice(&frames);
        Ok(())
    }
}

impl ChunkDecoder for StreamingDecoder {
    fn decode_chunk(&mut self) -> Result<Option<AudioChunk>> {
        let target = self.chunk_frames * 2;
        while !self.eof && self.pending.len() < target {
            self.decode_packet()?;
        }

        if self.pending.is_empty() {
            return Ok(None);
        }

        let take = self.pending.len().min(target);
        let samples: Vec<f32> = self.pending.drain(..take).collect();
        Ok(Some(AudioChunk::new(samples, self.source_rate)?))
    }
}

/// Convert interleaved samples with any channel count to interleaved
/// stereo: mono is duplicated, extra channels beyond the first two are
/// dropped.
fn interleaved_to_stereo(samples: &[f32], channels: usize) -> Vec<f32> {
    match channels {
        2 => samples.to_vec(),
        1 => {
            let mut out = Vec::with_capacity(samples.len() * 2);
            for &s in samples {
                out.push(s);
                out.push(s);
            }
            out
        }
        n => {
            let mut out = Vec::with_capacity(samples.len() / n * 2);
            for frame in samples.chunks_exact(n) {
                out.push(frame[0]);
                out.push(frame[1]);
            }
            out
        }
    }
}
