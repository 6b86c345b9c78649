//! Structured events emitted by the sequencer on every lifecycle step.
//!
//! Consumers subscribe to the stream to drive debug overlays, replay logs
//! or tests. Events are the sequencer's voice; tracing output is the
//! backend's.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{CardId, EventId, EventKind};
use crate::playback::PlaybackOutcome;

/// A structured event emitted by the sequencer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequencerEvent {
    /// Monotonic sequence number. Lagging subscribers can detect gaps.
    pub seq: u64,
    /// When this event occurred.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    pub kind: SequencerEventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SequencerEventKind {
    Enqueued {
        id: EventId,
        kind: EventKind,
        /// Queue length after the append.
        depth: usize,
    },
    Started {
        id: EventId,
        kind: EventKind,
        card_id: Option<CardId>,
    },
    Finished {
        id: EventId,
        kind: EventKind,
        outcome: PlaybackOutcome,
        duration_ms: u64,
    },
    /// The queue emptied and the worker stopped.
    Drained,
}
