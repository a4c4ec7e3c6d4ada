//! Audio mixer
//!
//! Runs in the output context (the audio device callback). `render` fills
//! exactly the requested number of frames and never blocks: it pops
//! pre-faded audio from the playout buffers, sums overlapping streams
//! during a crossfade, applies master volume, and degrades to silence on
//! underrun.
//!
//! While paused the mixer emits an exponential decay of the last rendered
//! sample instead of a hard cut, which kills the click a zero-order hold
//! would produce.

use std::sync::Arc;

use tracing::trace;

use crate::config::ResumeFadeConfig;
use crate::playback::fader::FadeCurve;
use crate::playback::transport::{PlaybackState, Transport};
use crate::timing::ticks_per_sample;

/// Largest device block the scratch buffers are sized for up front. A
/// larger block still renders, at the cost of a reallocation.
const MAX_BLOCK_FRAMES: usize = 8_192;

struct ResumeFade {
    total_frames: u64,
    done_frames: u64,
    curve: FadeCurve,
}

pub struct Mixer {
    transport: Arc<Transport>,
    working_rate: u32,
    pause_decay_factor: f32,
    pause_decay_floor: f32,
    resume_fade_config: ResumeFadeConfig,
    /// Last rendered sample per channel, the seed for pause decay.
    last_left: f32,
    last_right: f32,
    resume: Option<ResumeFade>,
    scratch_current: Vec<f32>,
    scratch_next: Vec<f32>,
}

impl Mixer {
    pub fn new(
        transport: Arc<Transport>,
        working_rate: u32,
        pause_decay_factor: f32,
        pause_decay_floor: f32,
        resume_fade_config: ResumeFadeConfig,
    ) -> Self {
        Self {
            transport,
            working_rate,
            pause_decay_factor,
            pause_decay_floor,
            resume_fade_config,
            last_left: 0.0,
            last_right: 0.0,
            resume: None,
            scratch_current: vec![0.0; MAX_BLOCK_FRAMES * 2],
            scratch_next: vec![0.0; MAX_BLOCK_FRAMES * 2],
        }
    }

    /// Fill `output` with interleaved stereo. Always fills every sample;
    /// never blocks, never errors. A trailing odd sample (which a
    /// conforming stereo device never produces) is zeroed.
    pub fn render(&mut self, output: &mut [f32]) {
        let even = output.len() & !1;
        if even < output.len() {
            output[even] = 0.0;
        }
        if even == 0 {
            return;
        }
        let output = &mut output[..even];

        match self.transport.playback_state() {
            PlaybackState::Paused => {
                self.resume = None;
                self.fill_pause_decay(output);
            }
            PlaybackState::Playing => {
                if self.transport.take_resume_fade() && self.resume_fade_config.enabled {
                    let total_frames = self.resume_fade_config.duration_ms
                        * self.working_rate as u64
                        / 1000;
                    if total_frames > 0 {
                        self.resume = Some(ResumeFade {
                            total_frames,
                            done_frames: 0,
                            curve: self.resume_fade_config.curve,
                        });
                    }
                }
                self.render_playing(output);
            }
        }
    }

    fn render_playing(&mut self, output: &mut [f32]) {
        let frames = output.len() / 2;
        let volume = self.transport.master_volume();
        let mut have_audio = false;

        if self.scratch_current.len() < frames * 2 {
            self.scratch_current.resize(frames * 2, 0.0);
            self.scratch_next.resize(frames * 2, 0.0);
        }

        {
            let mut guard = self.transport.deck();
            let deck = &mut *guard;

            if let Some(current) = deck.current.as_mut() {
                have_audio = true;

                // Frame within this block at which playback crosses the
                // overlap window, decided from the position at block
                // start. The next stream is summed only from that frame
                // on, so it is never audible before the current
                // passage's fade_out_start.
                let overlap_from = if deck.next.is_some() {
                    frames_until(
                        current.position_ticks(self.working_rate),
                        current.overlap_start_ticks,
                        self.working_rate,
                    )
                    .min(frames)
                } else {
                    frames
                };

                let scratch_current = &mut self.scratch_current[..frames * 2];
                scratch_current.fill(0.0);
                let popped = current.buffer.pop_frames(scratch_current);
                current.consumed_frames += popped as u64;
                if popped < frames && !current.buffer.is_decode_complete() {
                    trace!(shortfall = frames - popped, "output underrun, padding silence");
                }

                for i in 0..overlap_from * 2 {
                    output[i] = scratch_current[i] * volume;
                }

                if overlap_from < frames {
                    let tail = (frames - overlap_from) * 2;
                    let scratch_next = &mut self.scratch_next[..tail];
                    scratch_next.fill(0.0);
                    if let Some(next) = deck.next.as_mut() {
                        let popped_next = next.buffer.pop_frames(scratch_next);
                        next.consumed_frames += popped_next as u64;
                    }
                    for i in 0..tail {
                        output[overlap_from * 2 + i] =
                            (scratch_current[overlap_from * 2 + i] + scratch_next[i]) * volume;
                    }
                }
            }

            // Promote next -> current once the current passage is drained
            let exhausted = deck
                .current
                .as_ref()
                .map(|slot| slot.buffer.is_exhausted())
                .unwrap_or(false);
            if exhausted {
                if let Some(done) = deck.current.take() {
                    self.transport.push_finished(done.entry_id);
                    deck.current = deck.next.take();
                }
            }
        }

        if !have_audio {
            // Playing with nothing on deck: decay to silence
            self.fill_pause_decay(output);
            return;
        }

        self.apply_resume_fade(output);

        self.last_left = output[output.len() - 2];
        self.last_right = output[output.len() - 1];
    }

    /// Exponentially decay the last sample toward zero, snapping to exact
    /// silence at the floor.
    fn fill_pause_decay(&mut self, output: &mut [f32]) {
        for frame in output.chunks_exact_mut(2) {
            self.last_left *= self.pause_decay_factor;
            self.last_right *= self.pause_decay_factor;
            if self.last_left.abs() < self.pause_decay_floor {
                self.last_left = 0.0;
            }
            if self.last_right.abs() < self.pause_decay_floor {
                self.last_right = 0.0;
            }
            frame[0] = self.last_left;
            frame[1] = self.last_right;
        }
    }

    fn apply_resume_fade(&mut self, output: &mut [f32]) {
        let Some(fade) = self.resume.as_mut() else {
            return;
        };
        for frame in output.chunks_exact_mut(2) {
            if fade.done_frames >= fade.total_frames {
                break;
            }
            let progress = fade.done_frames as f32 / fade.total_frames as f32;
            let multiplier = fade.curve.apply(progress);
            frame[0] *= multiplier;
            frame[1] *= multiplier;
            fade.done_frames += 1;
        }
        if fade.done_frames >= fade.total_frames {
            self.resume = None;
        }
    }
}

/// Whole frames from `position_ticks` up to `boundary_ticks`, rounding up;
/// zero when the position is already at or past the boundary.
fn frames_until(position_ticks: i64, boundary_ticks: i64, rate: u32) -> usize {
    let diff = boundary_ticks.saturating_sub(position_ticks);
    if diff <= 0 {
        return 0;
    }
    let tps = ticks_per_sample(rate);
    let whole = diff / tps;
    let frames = if diff % tps != 0 { whole + 1 } else { whole };
    usize::try_from(frames).unwrap_or(usize::MAX)
}
