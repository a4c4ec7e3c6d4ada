//! Playout ring buffer
//!
//! Lock-free SPSC buffer carrying interleaved stereo f32 between a decoder
//! chain (producer, worker context) and the mixer (consumer, output
//! context). Capacity is fixed at creation; pushes truncate instead of
//! blocking and pops return short instead of blocking.
//!
//! The buffer also carries the backpressure hysteresis: the producer
//! should yield when free space falls to the headroom mark and may resume
//! only once free space reaches headroom + resume margin. The gap between
//! the marks prevents yield/resume thrash at the boundary.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use tracing::trace;

use crate::error::{Error, Result};

pub struct PlayoutBuffer {
    /// Producer half, used only from the worker context. The mutex is
    /// uncontended; it exists because the ringbuf halves need `&mut`.
    producer: Mutex<HeapProd<f32>>,
    /// Consumer half, used only from the output context.
    consumer: Mutex<HeapCons<f32>>,

    capacity_frames: usize,
    headroom_frames: usize,
    resume_margin_frames: usize,

    /// Stereo frames currently buffered (kept alongside the ring so both
    /// contexts can read fill level without touching either half).
    fill_frames: AtomicUsize,

    /// Producer has delivered the final frame of the passage.
    decode_complete: AtomicBool,

    // Lifetime counters for diagnostics
    total_frames_written: AtomicU64,
    total_frames_read: AtomicU64,
}

impl PlayoutBuffer {
    /// Create a buffer holding up to `capacity_frames` stereo frames.
    pub fn new(capacity_frames: usize, headroom_frames: usize, resume_margin_frames: usize) -> Self {
        let rb = HeapRb::<f32>::new(capacity_frames * 2);
        let (producer, consumer) = rb.split();
        Self {
            producer: Mutex::new(producer),
            consumer: Mutex::new(consumer),
            capacity_frames,
            headroom_frames,
            resume_margin_frames,
            fill_frames: AtomicUsize::new(0),
            decode_complete: AtomicBool::new(false),
            total_frames_written: AtomicU64::new(0),
            total_frames_read: AtomicU64::new(0),
        }
    }

    /// Push interleaved stereo samples, truncating to free space. Returns
    /// the number of whole frames pushed; never blocks.
    pub fn push_samples(&self, samples: &[f32]) -> Result<usize> {
        if samples.len() % 2 != 0 {
            return Err(Error::InvalidSampleCount(samples.len()));
        }
        if samples.is_empty() {
            return Ok(0);
        }

        let mut producer = match self.producer.lock() {
            Ok(p) => p,
            Err(poisoned) => poisoned.into_inner(),
        };

        // Only whole frames go in; free space is always even because
        // pushes and pops both move whole frames.
        let free_samples = producer.vacant_len() & !1;
        let writable = samples.len().min(free_samples);
        let pushed = producer.push_slice(&samples[..writable]);
        let frames = pushed / 2;

        self.fill_frames.fetch_add(frames, Ordering::Release);
        self.total_frames_written
            .fetch_add(frames as u64, Ordering::Relaxed);

        if frames * 2 < samples.len() {
            trace!(
                requested = samples.len() / 2,
                pushed = frames,
                "buffer full, partial push"
            );
        }
        Ok(frames)
    }

    /// Pop up to `out.len() / 2` frames into `out`. Returns the number of
    /// frames written; the rest of `out` is left untouched. Never blocks.
    pub fn pop_frames(&self, out: &mut [f32]) -> usize {
        let even = out.len() & !1;
        if even == 0 {
            return 0;
        }

        let mut consumer = match self.consumer.lock() {
            Ok(c) => c,
            Err(poisoned) => poisoned.into_inner(),
        };
        let popped = consumer.pop_slice(&mut out[..even]);
        let frames = popped / 2;

        self.fill_frames.fetch_sub(frames, Ordering::Release);
        self.total_frames_read
            .fetch_add(frames as u64, Ordering::Relaxed);
        frames
    }

    /// Discard all buffered audio.
    pub fn clear(&self) {
        let mut consumer = match self.consumer.lock() {
            Ok(c) => c,
            Err(poisoned) => poisoned.into_inner(),
        };
        let removed = consumer.clear();
        self.fill_frames.fetch_sub(removed / 2, Ordering::Release);
    }

    pub fn capacity_frames(&self) -> usize {
        self.capacity_frames
    }

    /// Frames currently buffered.
    pub fn len_frames(&self) -> usize {
        self.fill_frames.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len_frames() == 0
    }

    /// Frames of free space.
    pub fn free_frames(&self) -> usize {
        self.capacity_frames - self.len_frames()
    }

    /// Low-water check: the producer should stop decoding into this
    /// buffer when free space is down to the headroom.
    pub fn producer_should_yield(&self) -> bool {
        self.free_frames() <= self.headroom_frames
    }

    /// High-water check: a yielded producer may resume once the consumer
    /// has opened up headroom + resume margin of free space.
    pub fn producer_may_resume(&self) -> bool {
        self.free_frames() >= self.headroom_frames + self.resume_margin_frames
    }

    /// Mark that the final frame of the passage has been pushed.
    pub fn mark_decode_complete(&self) {
        self.decode_complete.store(true, Ordering::Release);
    }

    pub fn is_decode_complete(&self) -> bool {
        self.decode_complete.load(Ordering::Acquire)
    }

    /// True once decode is complete and every buffered frame has been
    /// consumed; the passage is finished.
    pub fn is_exhausted(&self) -> bool {
        self.is_decode_complete() && self.is_empty()
    }

    pub fn total_frames_written(&self) -> u64 {
        self.total_frames_written.load(Ordering::Relaxed)
    }

    pub fn total_frames_read(&self) -> u64 {
        self.total_frames_read.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for PlayoutBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayoutBuffer")
            .field("capacity_frames", &self.capacity_frames)
            .field("len_frames", &self.len_frames())
            .field("decode_complete", &self.is_decode_complete())
            .finish()
    }
}
