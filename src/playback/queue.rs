//! Passage queue

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use uuid::Uuid;

use crate::audio::{DecoderSource, FileSource};
use crate::error::Result;
use crate::playback::FadeCurve;
use crate::timing::PassageTiming;

/// A playable passage: an audio source cropped and fade-shaped by its
/// timing points.
#[derive(Clone)]
pub struct Passage {
    pub id: Uuid,
    pub source: Arc<dyn DecoderSource>,
    pub timing: PassageTiming,
    pub fade_in_curve: FadeCurve,
    pub fade_out_curve: FadeCurve,
}

impl Passage {
    pub fn new(
        source: Arc<dyn DecoderSource>,
        timing: PassageTiming,
        fade_in_curve: FadeCurve,
        fade_out_curve: FadeCurve,
    ) -> Result<Self> {
        timing.validate()?;
        Ok(Self {
            id: Uuid::new_v4(),
            source,
            timing,
            fade_in_curve,
            fade_out_curve,
        })
    }

    /// File-backed passage cropped to `timing`, with the default curve
    /// pairing (exponential in, logarithmic out).
    pub fn from_file(path: impl Into<PathBuf>, timing: PassageTiming) -> Result<Self> {
        timing.validate()?;
        let source = FileSource::new(path, timing.start, Some(timing.end));
        Ok(Self {
            id: Uuid::new_v4(),
            source: Arc::new(source),
            timing,
            fade_in_curve: FadeCurve::Exponential,
            fade_out_curve: FadeCurve::Logarithmic,
        })
    }
}

impl std::fmt::Debug for Passage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Passage")
            .field("id", &self.id)
            .field("timing", &self.timing)
            .finish()
    }
}

/// One queue position. The entry id is distinct from the passage id so the
/// same passage can be queued more than once.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub entry_id: Uuid,
    pub passage: Passage,
}

/// Ordered play queue.
#[derive(Debug, Default)]
pub struct PlayQueue {
    entries: VecDeque<QueueEntry>,
}

impl PlayQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a passage; returns the new entry's id.
    pub fn enqueue(&mut self, passage: Passage) -> Uuid {
        let entry_id = Uuid::new_v4();
        self.entries.push_back(QueueEntry { entry_id, passage });
        entry_id
    }

    /// Remove an entry by id. Returns the removed entry.
    pub fn remove(&mut self, entry_id: Uuid) -> Option<QueueEntry> {
        let pos = self.entries.iter().position(|e| e.entry_id == entry_id)?;
        self.entries.remove(pos)
    }

    pub fn get(&self, entry_id: Uuid) -> Option<&QueueEntry> {
        self.entries.iter().find(|e| e.entry_id == entry_id)
    }

    /// Entry at queue position `index` (0 = currently playing / next up).
    pub fn at(&self, index: usize) -> Option<&QueueEntry> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueueEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
