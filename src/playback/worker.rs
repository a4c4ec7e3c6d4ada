//! Cooperative decoder worker
//!
//! All decoder chains share one logical worker: each iteration advances
//! exactly one chain by one chunk, so one long passage cannot starve the
//! others and total decode CPU stays bounded no matter how many passages
//! are buffering.
//!
//! Chains move between Active and Yielded by backpressure only: a chain
//! yields when its buffer reaches the headroom mark (or truncates a push)
//! and becomes active again once the buffer drains past the resume mark.
//! A failed chain is removed and reported; it never takes the worker down.

use std::collections::{HashMap, VecDeque};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::playback::chain::{DecoderChain, ProcessResult};
use crate::playback::queue::Passage;
use crate::playback::ring_buffer::PlayoutBuffer;
use std::sync::Arc;

/// Scheduling membership of a registered chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    /// Eligible for the next iteration.
    Active,
    /// Waiting for buffer space; skipped until the resume scan readmits it.
    Yielded,
}

/// What one worker iteration did, reported to the engine.
#[derive(Debug)]
pub enum WorkerOutcome {
    Processed {
        entry_id: Uuid,
        frames_pushed: usize,
    },
    /// The chain pushed what fit and left the active set.
    Yielded {
        entry_id: Uuid,
        frames_pushed: usize,
    },
    /// The chain decoded its passage to the end and was removed.
    Finished {
        entry_id: Uuid,
        total_frames: u64,
    },
    /// The chain failed and was removed. Other chains are unaffected.
    Failed { entry_id: Uuid, error: Error },
}

struct ChainEntry {
    chain: DecoderChain,
    state: ChainState,
}

#[derive(Default)]
pub struct DecoderWorker {
    chains: HashMap<Uuid, ChainEntry>,
    /// Round-robin order over all registered chains.
    rotation: VecDeque<Uuid>,
}

impl DecoderWorker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register a chain for a queue entry.
    pub fn spawn_chain(
        &mut self,
        entry_id: Uuid,
        passage: &Passage,
        buffer: Arc<PlayoutBuffer>,
        working_rate: u32,
    ) -> Result<()> {
        let chain = DecoderChain::new(entry_id, passage, buffer, working_rate)?;
        info!(%entry_id, passage_id = %passage.id, "chain spawned");
        self.chains.insert(
            entry_id,
            ChainEntry {
                chain,
                state: ChainState::Active,
            },
        );
        self.rotation.push_back(entry_id);
        Ok(())
    }

    /// Remove a chain (teardown or queue removal). Safe to call for ids
    /// that already finished.
    pub fn remove_chain(&mut self, entry_id: Uuid) -> bool {
        self.rotation.retain(|id| *id != entry_id);
        self.chains.remove(&entry_id).is_some()
    }

    pub fn contains(&self, entry_id: Uuid) -> bool {
        self.chains.contains_key(&entry_id)
    }

    pub fn state(&self, entry_id: Uuid) -> Option<ChainState> {
        self.chains.get(&entry_id).map(|e| e.state)
    }

    pub fn active_count(&self) -> usize {
        self.chains
            .values()
            .filter(|e| e.state == ChainState::Active)
            .count()
    }

    pub fn yielded_count(&self) -> usize {
        self.chains
            .values()
            .filter(|e| e.state == ChainState::Yielded)
            .count()
    }

    pub fn is_idle(&self) -> bool {
        self.active_count() == 0
    }

    /// Readmit yielded chains whose buffers drained past the resume mark.
    pub fn resume_scan(&mut self) {
        for (entry_id, entry) in &mut self.chains {
            if entry.state == ChainState::Yielded && entry.chain.buffer().producer_may_resume() {
                debug!(%entry_id, "chain resumed");
                entry.state = ChainState::Active;
            }
        }
    }

    /// Advance exactly one active chain by one chunk.
    ///
    /// `priority` names a chain to advance ahead of the round-robin order
    /// (used for the incoming passage of a crossfade). Returns `None` when
    /// every chain is yielded or none exist.
    pub fn process_one(&mut self, priority: Option<Uuid>) -> Option<WorkerOutcome> {
        let entry_id = self.select(priority)?;
        let entry = self.chains.get_mut(&entry_id)?;

        match entry.chain.advance() {
            Ok(ProcessResult::Processed { frames_pushed }) => {
                // Headroom reached: stop before the buffer is literally full
                if entry.chain.buffer().producer_should_yield() {
                    entry.state = ChainState::Yielded;
                    debug!(%entry_id, frames_pushed, "chain yielded at headroom");
                    Some(WorkerOutcome::Yielded {
                        entry_id,
                        frames_pushed,
                    })
                } else {
                    Some(WorkerOutcome::Processed {
                        entry_id,
                        frames_pushed,
                    })
                }
            }
            Ok(ProcessResult::BufferFull { frames_pushed }) => {
                entry.state = ChainState::Yielded;
                debug!(%entry_id, frames_pushed, "chain yielded on full buffer");
                Some(WorkerOutcome::Yielded {
                    entry_id,
                    frames_pushed,
                })
            }
            Ok(ProcessResult::Finished { total_frames }) => {
                info!(%entry_id, total_frames, "chain finished");
                self.remove_chain(entry_id);
                Some(WorkerOutcome::Finished {
                    entry_id,
                    total_frames,
                })
            }
            Err(error) => {
                warn!(%entry_id, %error, "chain failed, removing");
                self.remove_chain(entry_id);
                Some(WorkerOutcome::Failed { entry_id, error })
            }
        }
    }

    /// Pick the next chain: the priority chain if it is active, otherwise
    /// the next active chain in rotation order.
    fn select(&mut self, priority: Option<Uuid>) -> Option<Uuid> {
        if let Some(id) = priority {
            if self.state(id) == Some(ChainState::Active) {
                return Some(id);
            }
        }
        for _ in 0..self.rotation.len() {
            let id = self.rotation.pop_front()?;
            self.rotation.push_back(id);
            if self.state(id) == Some(ChainState::Active) {
                return Some(id);
            }
        }
        None
    }
}
