//! Decoder chain
//!
//! One chain per buffering passage: decode -> resample -> fade -> push.
//! `advance()` performs one bounded unit of that work and reports how far
//! it got, so the worker can interleave many chains on one thread.

use std::sync::Arc;

use tracing::{debug, trace};
use uuid::Uuid;

use crate::audio::{ChunkDecoder, StatefulResampler};
use crate::error::{Error, Result};
use crate::playback::fader::Fader;
use crate::playback::queue::Passage;
use crate::playback::ring_buffer::PlayoutBuffer;
use crate::timing::ticks_to_samples;

/// Outcome of one `advance()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessResult {
    /// A chunk (or pending tail) was pushed in full.
    Processed { frames_pushed: usize },
    /// The buffer filled mid-push; the rest is retained as the pending
    /// tail. A backpressure signal, not an error.
    BufferFull { frames_pushed: usize },
    /// The passage is fully decoded and pushed.
    Finished { total_frames: u64 },
}

pub struct DecoderChain {
    entry_id: Uuid,
    decoder: Box<dyn ChunkDecoder>,
    /// Built from the first chunk, which fixes the source rate and the
    /// chunk size the resampler is fed.
    resampler: Option<StatefulResampler>,
    fader: Fader,
    buffer: Arc<PlayoutBuffer>,
    /// Faded samples that did not fit in the buffer. Pushed first on the
    /// next advance; never re-decoded, never re-faded.
    pending: Option<Vec<f32>>,
    decode_done: bool,
    total_frames: u64,
    end_ticks: i64,
    working_rate: u32,
}

impl DecoderChain {
    /// Open the passage's decoder and build the chain around `buffer`.
    pub fn new(
        entry_id: Uuid,
        passage: &Passage,
        buffer: Arc<PlayoutBuffer>,
        working_rate: u32,
    ) -> Result<Self> {
        let decoder = passage.source.open_decoder()?;
        let fader = Fader::new(
            passage.timing,
            passage.fade_in_curve,
            passage.fade_out_curve,
            working_rate,
        )?;
        debug!(%entry_id, passage_id = %passage.id, "decoder chain created");
        Ok(Self {
            entry_id,
            decoder,
            resampler: None,
            fader,
            buffer,
            pending: None,
            decode_done: false,
            total_frames: 0,
            end_ticks: passage.timing.end,
            working_rate,
        })
    }

    pub fn entry_id(&self) -> Uuid {
        self.entry_id
    }

    pub fn buffer(&self) -> &Arc<PlayoutBuffer> {
        &self.buffer
    }

    /// Decode position in ticks (how far this chain has faded, not how
    /// far playback has consumed).
    pub fn position_ticks(&self) -> i64 {
        self.fader.position_ticks()
    }

    /// Perform one unit of work: push the pending tail if one exists,
    /// otherwise decode, resample, and fade exactly one chunk and push it.
    pub fn advance(&mut self) -> Result<ProcessResult> {
        if let Some(tail) = self.pending.take() {
            trace!(entry_id = %self.entry_id, frames = tail.len() / 2, "pushing pending tail");
            return self.push_faded(tail);
        }

        if self.decode_done {
            return Ok(ProcessResult::Finished {
                total_frames: self.total_frames,
            });
        }

        let chunk = match self.decoder.decode_chunk()? {
            Some(c) if !c.is_empty() => c,
            _ => {
                self.decode_done = true;
                self.buffer.mark_decode_complete();
                debug!(entry_id = %self.entry_id, total_frames = self.total_frames, "decode complete");
                return Ok(ProcessResult::Finished {
                    total_frames: self.total_frames,
                });
            }
        };

        if self.resampler.is_none() {
            self.resampler = Some(StatefulResampler::new(
                chunk.sample_rate(),
                self.working_rate,
                chunk.frames(),
            )?);
        }
        let resampler = match self.resampler.as_mut() {
            Some(r) => r,
            None => return Err(Error::InvalidState("resampler not initialized".into())),
        };

        let chunk_start_ticks = self.fader.position_ticks();
        let mut samples = resampler.process_chunk(chunk.samples())?;
        self.fader.apply_fade(&mut samples)?;

        // Stop at the passage end: drop frames past it and finish early
        if self.fader.position_ticks() >= self.end_ticks {
            let keep_frames =
                ticks_to_samples(self.end_ticks - chunk_start_ticks, self.working_rate).max(0);
            samples.truncate(keep_frames as usize * 2);
            self.decode_done = true;
        }

        self.push_faded(samples)
    }

    /// Push faded samples, retaining whatever does not fit.
    fn push_faded(&mut self, samples: Vec<f32>) -> Result<ProcessResult> {
        let frames_in = samples.len() / 2;
        let frames_pushed = self.buffer.push_samples(&samples)?;
        self.total_frames += frames_pushed as u64;

        if frames_pushed < frames_in {
            self.pending = Some(samples[frames_pushed * 2..].to_vec());
            return Ok(ProcessResult::BufferFull { frames_pushed });
        }

        if self.decode_done {
            self.buffer.mark_decode_complete();
            debug!(entry_id = %self.entry_id, total_frames = self.total_frames, "chain finished");
            Ok(ProcessResult::Finished {
                total_frames: self.total_frames,
            })
        } else {
            Ok(ProcessResult::Processed { frames_pushed })
        }
    }
}
