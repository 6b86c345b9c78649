//! Routes one dequeued event to its handler and waits for it to finish.
//!
//! Deferred mutations and unknown kinds are handled here and never reach
//! the backend. Every path yields exactly one [`PlaybackOutcome`].

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, error, warn};

use crate::model::{AnimationEvent, EventId, EventKind, Payload, StateMutation};
use crate::playback::{CompletionSignal, PlaybackBackend, PlaybackOutcome};

pub(crate) async fn dispatch(
    backend: &dyn PlaybackBackend,
    runtime: &Handle,
    event: AnimationEvent,
    timeout: Option<Duration>,
) -> PlaybackOutcome {
    match event.payload {
        Payload::StateApply(mutation) => apply(event.id, mutation),
        Payload::Unknown { ref kind, .. } => {
            debug!(event_id = %event.id, kind = %kind, "unknown event kind, nothing to play");
            PlaybackOutcome::Ignored
        }
        _ => {
            let (id, kind) = (event.id, event.kind());
            let signal = start(backend, &event);
            match signal {
                Some(signal) => finish(runtime, id, kind, signal, timeout).await,
                None => PlaybackOutcome::Abandoned,
            }
        }
    }
}

fn apply(id: EventId, mutation: StateMutation) -> PlaybackOutcome {
    match catch_unwind(AssertUnwindSafe(|| mutation.apply())) {
        Ok(()) => {
            debug!(event_id = %id, "deferred state applied");
            PlaybackOutcome::Applied
        }
        Err(_) => {
            error!(event_id = %id, "deferred state mutation panicked");
            PlaybackOutcome::skipped("state mutation panicked")
        }
    }
}

fn start(backend: &dyn PlaybackBackend, event: &AnimationEvent) -> Option<CompletionSignal> {
    match catch_unwind(AssertUnwindSafe(|| backend.play(event))) {
        Ok(signal) => Some(signal),
        Err(_) => {
            error!(event_id = %event.id, kind = %event.kind(), "backend panicked starting effect");
            None
        }
    }
}

async fn finish(
    runtime: &Handle,
    id: EventId,
    kind: EventKind,
    signal: CompletionSignal,
    timeout: Option<Duration>,
) -> PlaybackOutcome {
    // Awaited on its own task so a panicking effect can't take the worker down.
    let mut handle = runtime.spawn(signal);

    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
            Ok(joined) => joined,
            Err(_) => {
                handle.abort();
                warn!(
                    event_id = %id,
                    %kind,
                    timeout_ms = limit.as_millis() as u64,
                    "effect timed out"
                );
                return PlaybackOutcome::TimedOut;
            }
        },
        None => handle.await,
    };

    joined.unwrap_or_else(|e| {
        error!(event_id = %id, %kind, error = %e, "effect task failed");
        PlaybackOutcome::Abandoned
    })
}
