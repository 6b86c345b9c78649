//! Playback span helpers.
//!
//! One span per dequeued event, covering dispatch through completion.

use tracing::Span;

use crate::model::{EventId, EventKind};
use crate::playback::PlaybackOutcome;

/// Start a span for one event's playback.
///
/// The `anim.outcome` field is declared empty and filled in by
/// [`record_outcome`].
pub fn start_playback_span(kind: EventKind, id: EventId) -> Span {
    tracing::info_span!(
        "anim.play",
        "anim.kind" = kind.as_str(),
        "anim.id" = %id,
        "anim.outcome" = tracing::field::Empty,
    )
}

/// Record how playback ended and emit a scoped event for it.
pub fn record_outcome(span: &Span, outcome: &PlaybackOutcome, duration_ms: u64) {
    span.record("anim.outcome", outcome.label());
    span.in_scope(|| {
        tracing::debug!(outcome = %outcome, duration_ms, "playback_finished");
    });
}
