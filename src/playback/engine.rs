//! Playback engine
//!
//! Owns the queue, the decoder worker, and the transport. The engine has
//! no thread of its own: the caller drives it by calling `tick()`, and
//! each tick performs at most one unit of decode work plus O(1)
//! bookkeeping. Audio reaches the device through the [`Mixer`] returned
//! by [`PlaybackEngine::new`], which runs independently in the output
//! callback.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::events::{EventBus, PlayerEvent};
use crate::playback::mixer::Mixer;
use crate::playback::queue::{Passage, PlayQueue};
use crate::playback::ring_buffer::PlayoutBuffer;
use crate::playback::transport::{PlaybackState, StreamSlot, Transport};
use crate::playback::worker::{DecoderWorker, WorkerOutcome};
use crate::timing::TICK_RATE;

pub struct PlaybackEngine {
    config: EngineConfig,
    queue: PlayQueue,
    worker: DecoderWorker,
    /// Playout buffer per buffering queue entry. A buffer outlives its
    /// chain: decode finishes before playback drains it.
    buffers: HashMap<Uuid, Arc<PlayoutBuffer>>,
    transport: Arc<Transport>,
    events: EventBus,
    /// Deck entry whose PassageStarted has been emitted, so promotion by
    /// the mixer gets announced on the next tick.
    announced_current: Option<Uuid>,
}

impl PlaybackEngine {
    /// Build an engine and its mixer. The mixer goes to the output
    /// context (audio callback); the engine stays with whoever ticks it.
    pub fn new(config: EngineConfig) -> Result<(Self, Mixer)> {
        config.validate()?;
        let transport = Arc::new(Transport::new());
        let mixer = Mixer::new(
            Arc::clone(&transport),
            config.working_sample_rate,
            config.pause_decay_factor,
            config.pause_decay_floor,
            config.resume_fade.clone(),
        );
        let engine = Self {
            config,
            queue: PlayQueue::new(),
            worker: DecoderWorker::new(),
            buffers: HashMap::new(),
            transport,
            events: EventBus::default(),
            announced_current: None,
        };
        Ok((engine, mixer))
    }

    pub fn events(&self) -> tokio::sync::broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Append a passage to the queue. Decoding begins lazily on
    /// subsequent ticks; nothing is opened here.
    pub fn enqueue(&mut self, passage: Passage) -> Uuid {
        let entry_id = self.queue.enqueue(passage);
        info!(%entry_id, queue_length = self.queue.len(), "passage enqueued");
        self.emit_queue_changed();
        entry_id
    }

    /// Remove a queue entry, tearing down its chain and buffer. Removing
    /// the currently playing entry stops it immediately and promotes the
    /// next stream.
    pub fn remove(&mut self, entry_id: Uuid) -> bool {
        if self.queue.remove(entry_id).is_none() {
            return false;
        }
        self.worker.remove_chain(entry_id);
        self.buffers.remove(&entry_id);

        {
            let mut deck = self.transport.deck();
            if deck.next.as_ref().map(|s| s.entry_id) == Some(entry_id) {
                deck.next = None;
            }
            if deck.current.as_ref().map(|s| s.entry_id) == Some(entry_id) {
                deck.current = deck.next.take();
            }
        }

        info!(%entry_id, "queue entry removed");
        self.emit_queue_changed();
        true
    }

    pub fn play(&mut self) {
        if self.transport.playback_state() == PlaybackState::Playing {
            return;
        }
        if self.config.resume_fade.enabled {
            self.transport.request_resume_fade();
        }
        self.transport.set_playback_state(PlaybackState::Playing);
        info!("playback started");
        self.events.emit(PlayerEvent::PlaybackStateChanged {
            state: PlaybackState::Playing,
            timestamp: Utc::now(),
        });
    }

    pub fn pause(&mut self) {
        if self.transport.playback_state() == PlaybackState::Paused {
            return;
        }
        self.transport.set_playback_state(PlaybackState::Paused);
        info!("playback paused");
        self.events.emit(PlayerEvent::PlaybackStateChanged {
            state: PlaybackState::Paused,
            timestamp: Utc::now(),
        });
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.transport.playback_state()
    }

    /// Set master volume (clamped to [0, 1]); applies from the next
    /// rendered sample.
    pub fn set_master_volume(&mut self, volume: f32) {
        self.transport.set_master_volume(volume);
        self.events.emit(PlayerEvent::VolumeChanged {
            volume: self.transport.master_volume(),
            timestamp: Utc::now(),
        });
    }

    pub fn master_volume(&self) -> f32 {
        self.transport.master_volume()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// True when nothing is queued, buffering, or on the deck.
    pub fn is_idle(&self) -> bool {
        let deck = self.transport.deck();
        self.queue.is_empty() && deck.current.is_none() && deck.next.is_none()
    }

    /// Advance the engine by one scheduling iteration:
    /// reap finished passages, readmit resumable chains, start chains for
    /// newly buffering entries, keep the deck loaded, then run at most one
    /// chunk of decode work. Returns whether decode work was done, so a
    /// driving loop can sleep when everything is yielded or idle.
    pub fn tick(&mut self) -> bool {
        self.reap_finished();
        self.worker.resume_scan();
        self.spawn_chains();
        self.load_deck();
        self.announce_current();
        self.announce_crossfade();

        let priority = self.priority_hint();
        match self.worker.process_one(priority) {
            None => false,
            Some(WorkerOutcome::Failed { entry_id, error }) => {
                warn!(%entry_id, %error, "passage decode failed");
                let passage_id = self
                    .queue
                    .get(entry_id)
                    .map(|e| e.passage.id)
                    .unwrap_or(entry_id);
                self.events.emit(PlayerEvent::PassageDecodeFailed {
                    passage_id,
                    reason: error.to_string(),
                    timestamp: Utc::now(),
                });
                self.remove(entry_id);
                true
            }
            Some(_) => true,
        }
    }

    /// Collect passages whose playback finished (buffer exhausted).
    fn reap_finished(&mut self) {
        for entry_id in self.transport.drain_finished() {
            let passage_id = self.queue.get(entry_id).map(|e| e.passage.id);
            self.worker.remove_chain(entry_id);
            self.buffers.remove(&entry_id);
            self.queue.remove(entry_id);
            if let Some(passage_id) = passage_id {
                info!(%entry_id, %passage_id, "passage completed");
                self.events.emit(PlayerEvent::PassageCompleted {
                    passage_id,
                    timestamp: Utc::now(),
                });
            }
            self.emit_queue_changed();
        }
    }

    /// Start chains for the first `max_buffering_chains` queue entries
    /// that do not have one yet.
    fn spawn_chains(&mut self) {
        let candidates: Vec<(Uuid, Passage)> = self
            .queue
            .iter()
            .take(self.config.max_buffering_chains)
            .filter(|e| !self.buffers.contains_key(&e.entry_id))
            .map(|e| (e.entry_id, e.passage.clone()))
            .collect();

        for (entry_id, passage) in candidates {
            let buffer = Arc::new(PlayoutBuffer::new(
                self.config.buffer_capacity_frames,
                self.config.buffer_headroom_frames,
                self.config.resume_margin_frames,
            ));
            match self.worker.spawn_chain(
                entry_id,
                &passage,
                Arc::clone(&buffer),
                self.config.working_sample_rate,
            ) {
                Ok(()) => {
                    self.buffers.insert(entry_id, buffer);
                }
                Err(error) => {
                    warn!(%entry_id, %error, "failed to open passage");
                    self.events.emit(PlayerEvent::PassageDecodeFailed {
                        passage_id: passage.id,
                        reason: error.to_string(),
                        timestamp: Utc::now(),
                    });
                    self.queue.remove(entry_id);
                    self.emit_queue_changed();
                }
            }
        }
    }

    /// Keep the deck's current/next slots aligned with the queue head.
    fn load_deck(&mut self) {
        let mut guard = self.transport.deck();
        let deck = &mut *guard;

        if deck.current.is_none() {
            if let Some(slot) = self.slot_for_queue_index(0) {
                debug!(passage_id = %slot.passage_id, "passage loaded as current stream");
                deck.current = Some(slot);
            }
        }

        if deck.next.is_none() {
            if let Some(current) = deck.current.as_ref() {
                let pos = self
                    .queue
                    .iter()
                    .position(|e| e.entry_id == current.entry_id);
                if let Some(pos) = pos {
                    let current_entry = current.entry_id;
                    if let Some(slot) = self.slot_for_queue_index(pos + 1) {
                        if slot.entry_id != current_entry {
                            deck.next = Some(slot);
                        }
                    }
                }
            }
        }
    }

    /// Emit PassageStarted whenever a different entry becomes the
    /// current stream, whether loaded here or promoted by the mixer.
    fn announce_current(&mut self) {
        let current = {
            let deck = self.transport.deck();
            deck.current.as_ref().map(|s| (s.entry_id, s.passage_id))
        };
        match current {
            Some((entry_id, passage_id)) => {
                if self.announced_current != Some(entry_id) {
                    self.announced_current = Some(entry_id);
                    self.events.emit(PlayerEvent::PassageStarted {
                        passage_id,
                        timestamp: Utc::now(),
                    });
                }
            }
            None => self.announced_current = None,
        }
    }

    fn slot_for_queue_index(&self, index: usize) -> Option<StreamSlot> {
        let entry = self.queue.at(index)?;
        let buffer = self.buffers.get(&entry.entry_id)?;
        Some(StreamSlot {
            entry_id: entry.entry_id,
            passage_id: entry.passage.id,
            buffer: Arc::clone(buffer),
            start_ticks: entry.passage.timing.start,
            overlap_start_ticks: entry.passage.timing.fade_out_start,
            consumed_frames: 0,
            overlap_announced: false,
        })
    }

    /// Emit CrossfadeStarted once per passage pair when the current
    /// stream's position enters its overlap window.
    fn announce_crossfade(&mut self) {
        let mut announce: Option<(Uuid, Uuid)> = None;
        {
            let mut guard = self.transport.deck();
            let deck = &mut *guard;
            if let (Some(current), Some(next)) = (deck.current.as_mut(), deck.next.as_ref()) {
                if !current.overlap_announced
                    && current.in_overlap(self.config.working_sample_rate)
                {
                    current.overlap_announced = true;
                    announce = Some((current.passage_id, next.passage_id));
                }
            }
        }
        if let Some((from, to)) = announce {
            info!(from_passage = %from, to_passage = %to, "crossfade started");
            self.events.emit(PlayerEvent::CrossfadeStarted {
                from_passage_id: from,
                to_passage_id: to,
                timestamp: Utc::now(),
            });
        }
    }

    /// Prefer the incoming stream's chain when the current passage is
    /// inside (or within a second of) its fade-out region, so the
    /// crossfade never starves.
    fn priority_hint(&self) -> Option<Uuid> {
        let deck = self.transport.deck();
        let current = deck.current.as_ref()?;
        if let Some(next) = deck.next.as_ref() {
            let position = current.position_ticks(self.config.working_sample_rate);
            if position + TICK_RATE >= current.overlap_start_ticks {
                return Some(next.entry_id);
            }
        }
        Some(current.entry_id)
    }

    fn emit_queue_changed(&self) {
        self.events.emit(PlayerEvent::QueueChanged {
            queue_length: self.queue.len(),
            timestamp: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioChunk, ChunkDecoder, DecoderSource};
    use crate::error::Error;
    use crate::playback::fader::FadeCurve;
    use crate::timing::{samples_to_ticks, PassageTiming};

    struct ToneDecoder {
        amplitude: f32,
        chunk_frames: usize,
        chunks_left: usize,
    }

    impl ChunkDecoder for ToneDecoder {
        fn decode_chunk(&mut self) -> crate::error::Result<Option<AudioChunk>> {
            if self.chunks_left == 0 {
                return Ok(None);
            }
            self.chunks_left -= 1;
            Ok(Some(AudioChunk::new(
                vec![self.amplitude; self.chunk_frames * 2],
                44_100,
            )?))
        }
    }

    struct ToneSource {
        amplitude: f32,
        chunk_frames: usize,
        chunks: usize,
    }

    impl DecoderSource for ToneSource {
        fn open_decoder(&self) -> crate::error::Result<Box<dyn ChunkDecoder>> {
            Ok(Box::new(ToneDecoder {
                amplitude: self.amplitude,
                chunk_frames: self.chunk_frames,
                chunks_left: self.chunks,
            }))
        }
    }

    struct BrokenSource;

    impl DecoderSource for BrokenSource {
        fn open_decoder(&self) -> crate::error::Result<Box<dyn ChunkDecoder>> {
            Err(Error::Decode("file not recognized".into()))
        }
    }

    fn tone_passage(amplitude: f32, frames: usize) -> Passage {
        Passage::new(
            Arc::new(ToneSource {
                amplitude,
                chunk_frames: 1_000,
                chunks: frames.div_ceil(1_000),
            }),
            PassageTiming::full(0, samples_to_ticks(frames as i64, 44_100)),
            FadeCurve::Linear,
            FadeCurve::Linear,
        )
        .unwrap()
    }

    fn engine() -> (PlaybackEngine, Mixer) {
        let mut config = EngineConfig::default();
        config.buffer_capacity_frames = 20_000;
        config.buffer_headroom_frames = 500;
        config.resume_margin_frames = 2_000;
        PlaybackEngine::new(config).unwrap()
    }

    #[test]
    fn test_enqueue_emits_queue_changed() {
        let (mut engine, _mixer) = engine();
        let mut rx = engine.events();
        engine.enqueue(tone_passage(0.5, 5_000));
        assert_eq!(engine.queue_len(), 1);
        match rx.try_recv().unwrap() {
            PlayerEvent::QueueChanged { queue_length, .. } => assert_eq!(queue_length, 1),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_tick_buffers_and_plays_through() {
        let (mut engine, mut mixer) = engine();
        engine.enqueue(tone_passage(0.5, 5_000));
        engine.play();

        let mut rendered: Vec<f32> = Vec::new();
        let mut block = vec![0.0f32; 512 * 2];
        for _ in 0..200 {
            engine.tick();
            mixer.render(&mut block);
            rendered.extend_from_slice(&block);
            if engine.is_idle() {
                break;
            }
        }
        assert!(engine.is_idle(), "engine should drain the queue");

        // All 5000 tone frames must have been rendered at full scale
        let audible = rendered.iter().filter(|&&s| (s - 0.5).abs() < 1e-6).count();
        assert_eq!(audible, 5_000 * 2);
    }

    #[test]
    fn test_bad_passage_reported_and_dropped() {
        let (mut engine, _mixer) = engine();
        let passage = Passage::new(
            Arc::new(BrokenSource),
            PassageTiming::full(0, TICK_RATE),
            FadeCurve::Linear,
            FadeCurve::Linear,
        )
        .unwrap();
        let passage_id = passage.id;
        let mut rx = engine.events();
        engine.enqueue(passage);
        engine.tick();

        assert_eq!(engine.queue_len(), 0);
        let mut saw_failure = false;
        while let Ok(event) = rx.try_recv() {
            if let PlayerEvent::PassageDecodeFailed { passage_id: id, .. } = event {
                assert_eq!(id, passage_id);
                saw_failure = true;
            }
        }
        assert!(saw_failure);
    }

    #[test]
    fn test_remove_current_promotes_next() {
        let (mut engine, _mixer) = engine();
        let first = engine.enqueue(tone_passage(0.1, 10_000));
        let _second = engine.enqueue(tone_passage(0.2, 10_000));

        // Buffer both and load the deck
        for _ in 0..10 {
            engine.tick();
        }

        assert!(engine.remove(first));
        assert_eq!(engine.queue_len(), 1);
        // Not idle: the second passage is now current
        assert!(!engine.is_idle());
        assert!(!engine.remove(first), "second removal is a no-op");
    }

    #[test]
    fn test_volume_event_carries_clamped_value() {
        let (mut engine, _mixer) = engine();
        let mut rx = engine.events();
        engine.set_master_volume(2.0);
        assert_eq!(engine.master_volume(), 1.0);
        match rx.try_recv().unwrap() {
            PlayerEvent::VolumeChanged { volume, .. } => assert_eq!(volume, 1.0),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
