//! Player events
//!
//! Observable playback lifecycle notifications, broadcast to any number of
//! subscribers. Emission never blocks and never fails: if nobody is
//! listening the event is dropped.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::playback::PlaybackState;

/// Playback lifecycle events.
///
/// Buffer-full conditions are internal scheduling signals and are
/// deliberately not represented here.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlayerEvent {
    /// Play/pause state changed.
    PlaybackStateChanged {
        state: PlaybackState,
        timestamp: DateTime<Utc>,
    },

    /// The queue gained or lost an entry.
    QueueChanged {
        queue_length: usize,
        timestamp: DateTime<Utc>,
    },

    /// A passage became the current (audible) stream.
    PassageStarted {
        passage_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// A passage played to completion and left the deck.
    PassageCompleted {
        passage_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// The current passage entered its fade-out with a next passage ready;
    /// both streams are now being mixed.
    CrossfadeStarted {
        from_passage_id: Uuid,
        to_passage_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Decoding a passage failed; it was removed from the queue.
    PassageDecodeFailed {
        passage_id: Uuid,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Master volume changed (already clamped to [0, 1]).
    VolumeChanged { volume: f32, timestamp: DateTime<Utc> },
}

/// Broadcast bus for [`PlayerEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PlayerEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to future events.
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.tx.subscribe()
    }

    /// Emit an event. A send error only means there are no subscribers.
    pub fn emit(&self, event: PlayerEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers_is_silent() {
        let bus = EventBus::default();
        bus.emit(PlayerEvent::VolumeChanged {
            volume: 0.5,
            timestamp: Utc::now(),
        });
    }

    #[test]
    fn test_subscriber_receives_events() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        bus.emit(PlayerEvent::QueueChanged {
            queue_length: 1,
            timestamp: Utc::now(),
        });
        match rx.try_recv().unwrap() {
            PlayerEvent::QueueChanged { queue_length, .. } => assert_eq!(queue_length, 1),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
