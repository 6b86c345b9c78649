//! Playback boundary: the contract between the sequencer and whatever
//! actually draws an effect.
//!
//! A backend receives one event at a time and hands back a
//! [`CompletionSignal`]. The signal resolves exactly once: a ready value,
//! a future, or a [`Completer`] that is consumed on resolve and reports
//! [`PlaybackOutcome::Abandoned`] if it is dropped without resolving.

pub mod stage;

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

use crate::model::AnimationEvent;

pub use stage::{Choreography, Stage, StageBackend};

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// How an event's playback ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PlaybackOutcome {
    /// The effect ran to completion.
    Played,
    /// A render target was missing; the effect was skipped.
    Skipped { reason: String },
    /// A deferred state mutation ran.
    Applied,
    /// Unknown kind; nothing to show.
    Ignored,
    /// The effect exceeded the configured timeout.
    TimedOut,
    /// The backend dropped its completer without resolving.
    Abandoned,
}

impl PlaybackOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        PlaybackOutcome::Skipped {
            reason: reason.into(),
        }
    }

    pub fn is_soft_failure(&self) -> bool {
        matches!(
            self,
            PlaybackOutcome::Skipped { .. } | PlaybackOutcome::TimedOut | PlaybackOutcome::Abandoned
        )
    }

    /// Short label for logs and metric attributes.
    pub fn label(&self) -> &'static str {
        match self {
            PlaybackOutcome::Played => "played",
            PlaybackOutcome::Skipped { .. } => "skipped",
            PlaybackOutcome::Applied => "applied",
            PlaybackOutcome::Ignored => "ignored",
            PlaybackOutcome::TimedOut => "timed_out",
            PlaybackOutcome::Abandoned => "abandoned",
        }
    }
}

impl std::fmt::Display for PlaybackOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackOutcome::Skipped { reason } => write!(f, "skipped ({reason})"),
            other => f.write_str(other.label()),
        }
    }
}

// ---------------------------------------------------------------------------
// Completion signal
// ---------------------------------------------------------------------------

/// Single-fire completion notification for one event's playback.
pub struct CompletionSignal {
    state: Signal,
}

enum Signal {
    Ready(Option<PlaybackOutcome>),
    Channel(oneshot::Receiver<PlaybackOutcome>),
    Future(Pin<Box<dyn Future<Output = PlaybackOutcome> + Send + 'static>>),
}

impl CompletionSignal {
    /// A signal that is already resolved.
    pub fn ready(outcome: PlaybackOutcome) -> Self {
        Self {
            state: Signal::Ready(Some(outcome)),
        }
    }

    /// A signal driven by a future (e.g. an async tween).
    pub fn from_future(fut: impl Future<Output = PlaybackOutcome> + Send + 'static) -> Self {
        Self {
            state: Signal::Future(Box::pin(fut)),
        }
    }

    /// A signal resolved later through the returned [`Completer`], for
    /// callback-driven renderers.
    pub fn pending() -> (Completer, Self) {
        let (tx, rx) = oneshot::channel();
        (
            Completer { tx },
            Self {
                state: Signal::Channel(rx),
            },
        )
    }
}

impl Future for CompletionSignal {
    type Output = PlaybackOutcome;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            Signal::Ready(outcome) => {
                Poll::Ready(outcome.take().unwrap_or(PlaybackOutcome::Abandoned))
            }
            Signal::Channel(rx) => Pin::new(rx)
                .poll(cx)
                .map(|res| res.unwrap_or(PlaybackOutcome::Abandoned)),
            Signal::Future(fut) => fut.as_mut().poll(cx),
        }
    }
}

impl std::fmt::Debug for CompletionSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.state {
            Signal::Ready(_) => "ready",
            Signal::Channel(_) => "channel",
            Signal::Future(_) => "future",
        };
        f.debug_struct("CompletionSignal")
            .field("state", &state)
            .finish()
    }
}

/// Resolving half of a pending [`CompletionSignal`].
#[derive(Debug)]
pub struct Completer {
    tx: oneshot::Sender<PlaybackOutcome>,
}

impl Completer {
    pub fn resolve(self, outcome: PlaybackOutcome) {
        // The sequencer may have timed out and stopped listening.
        let _ = self.tx.send(outcome);
    }
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

/// Turns one event into a visual effect.
///
/// Implementations must resolve every signal they return, including when a
/// participant or render target cannot be found.
pub trait PlaybackBackend: Send + Sync + 'static {
    fn play(&self, event: &AnimationEvent) -> CompletionSignal;
}

impl<B: PlaybackBackend + ?Sized> PlaybackBackend for Arc<B> {
    fn play(&self, event: &AnimationEvent) -> CompletionSignal {
        (**self).play(event)
    }
}

/// Backend that shows nothing and resolves every event immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullBackend;

impl PlaybackBackend for NullBackend {
    fn play(&self, _event: &AnimationEvent) -> CompletionSignal {
        CompletionSignal::ready(PlaybackOutcome::Played)
    }
}
