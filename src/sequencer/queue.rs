//! The animation queue and its single drain worker.
//!
//! `enqueue` appends and, if nothing is draining, spawns the worker. The
//! worker pops the head, plays it, waits for its completion signal, and
//! repeats until the queue is empty. The queue, the processing flag and the
//! decision to spawn all sit under one lock, so at most one worker exists.

use opentelemetry::KeyValue;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tracing::{Instrument, debug, warn};

use super::dispatch::dispatch;
use super::in_flight::{InFlightGuard, InFlightTracker};
use crate::config::DEFAULT_SOFT_FAILURE_WARN_AFTER;
use crate::error::{Error, Result};
use crate::event::{SequencerEvent, SequencerEventKind};
use crate::model::{AnimationEvent, CardId, EventKind};
use crate::playback::{PlaybackBackend, PlaybackOutcome};
use crate::telemetry::metrics;
use crate::telemetry::playback::{record_outcome, start_playback_span};

/// Capacity of the lifecycle event broadcast. Slow subscribers lag, never block.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Configuration for the sequencer.
#[derive(Debug, Clone)]
pub struct SequencerConfig {
    /// Force-resolve an effect as `TimedOut` after this long. `None` waits forever.
    pub effect_timeout: Option<Duration>,
    /// Warn once a streak of soft failures reaches this length. 0 disables.
    pub soft_failure_warn_after: u32,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            effect_timeout: None,
            soft_failure_warn_after: DEFAULT_SOFT_FAILURE_WARN_AFTER,
        }
    }
}

/// Running totals since the sequencer was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequencerStats {
    pub enqueued: u64,
    pub completed: u64,
    pub soft_failures: u64,
    /// Length of the current run of back-to-back soft failures.
    pub soft_failure_streak: u32,
}

struct QueueState {
    queue: VecDeque<AnimationEvent>,
    /// True iff a drain worker is active.
    processing: bool,
}

struct Emitter {
    seq: u64,
    tx: broadcast::Sender<SequencerEvent>,
}

struct Shared {
    state: Mutex<QueueState>,
    in_flight: InFlightTracker,
    backend: Arc<dyn PlaybackBackend>,
    config: SequencerConfig,
    /// Presentation signal derived from `processing`. Written under the state lock.
    busy: watch::Sender<bool>,
    emitter: Mutex<Emitter>,
    stats: Mutex<SequencerStats>,
    runtime: Handle,
}

/// Serializes animation events: strict FIFO, one effect at a time.
///
/// Cheap to clone; all clones share one queue. Construct one per game
/// session and hand clones to producers and the rendering layer.
#[derive(Clone)]
pub struct Sequencer {
    shared: Arc<Shared>,
}

impl Sequencer {
    /// Create a sequencer that spawns its worker on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Runtime`] when called outside a runtime.
    pub fn new(backend: impl PlaybackBackend, config: SequencerConfig) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| Error::Runtime(e.to_string()))?;
        Ok(Self::with_runtime(runtime, backend, config))
    }

    /// Create a sequencer bound to an explicit runtime handle.
    pub fn with_runtime(
        runtime: Handle,
        backend: impl PlaybackBackend,
        config: SequencerConfig,
    ) -> Self {
        let (busy, _) = watch::channel(false);
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState {
                    queue: VecDeque::new(),
                    processing: false,
                }),
                in_flight: InFlightTracker::new(),
                backend: Arc::new(backend),
                config,
                busy,
                emitter: Mutex::new(Emitter { seq: 0, tx }),
                stats: Mutex::new(SequencerStats::default()),
                runtime,
            }),
        }
    }

    /// Append an event and return immediately. Always accepted.
    pub fn enqueue(&self, event: AnimationEvent) {
        let (id, kind) = (event.id, event.kind());
        let shared = &self.shared;

        let start_worker = {
            let mut state = shared.lock_state();
            state.queue.push_back(event);
            shared.emit(SequencerEventKind::Enqueued {
                id,
                kind,
                depth: state.queue.len(),
            });
            let idle = !state.processing;
            if idle {
                state.processing = true;
                shared.busy.send_replace(true);
            }
            idle
        };

        lock(&shared.stats).enqueued += 1;
        metrics::events_enqueued().add(1, &[KeyValue::new("kind", kind.as_str())]);
        debug!(event_id = %id, %kind, "event enqueued");

        if start_worker {
            debug!("drain worker started");
            let worker = Arc::clone(shared);
            shared.runtime.spawn(async move { worker.drain().await });
        }
    }

    /// Whether a drain worker is active.
    pub fn is_processing(&self) -> bool {
        self.shared.lock_state().processing
    }

    /// Whether `card` is currently being depicted by an effect.
    pub fn is_in_flight(&self, card: &CardId) -> bool {
        self.shared.in_flight.contains(card)
    }

    /// Read-only view of the in-flight set for the rendering layer.
    pub fn in_flight(&self) -> InFlightTracker {
        self.shared.in_flight.clone()
    }

    /// Presentation signal: `true` while animations are playing.
    pub fn busy(&self) -> watch::Receiver<bool> {
        self.shared.busy.subscribe()
    }

    /// Subscribe to lifecycle events from this point on.
    pub fn subscribe(&self) -> broadcast::Receiver<SequencerEvent> {
        lock(&self.shared.emitter).tx.subscribe()
    }

    /// Events waiting behind the one currently playing.
    pub fn pending(&self) -> usize {
        self.shared.lock_state().queue.len()
    }

    pub fn stats(&self) -> SequencerStats {
        *lock(&self.shared.stats)
    }

    /// Resolve once the queue has fully drained. Immediate when idle.
    pub async fn wait_idle(&self) {
        let mut busy = self.busy();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = busy.wait_for(|busy| !*busy).await;
    }
}

impl std::fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.lock_state();
        f.debug_struct("Sequencer")
            .field("processing", &state.processing)
            .field("pending", &state.queue.len())
            .field("in_flight", &self.shared.in_flight.len())
            .finish()
    }
}

impl Shared {
    /// The worker. Exactly one runs at a time; it exits when the queue empties.
    async fn drain(self: Arc<Self>) {
        loop {
            let (event, in_flight) = {
                let mut state = self.lock_state();
                let Some(event) = state.queue.pop_front() else {
                    state.processing = false;
                    self.busy.send_replace(false);
                    self.emit(SequencerEventKind::Drained);
                    break;
                };
                self.emit(SequencerEventKind::Started {
                    id: event.id,
                    kind: event.kind(),
                    card_id: event.card_id.clone(),
                });
                let in_flight: Option<InFlightGuard> =
                    event.card_id.clone().map(|card| self.in_flight.mark(card));
                (event, in_flight)
            };

            self.play(event, in_flight).await;
        }
        debug!("queue drained, worker stopped");
    }

    async fn play(&self, event: AnimationEvent, in_flight: Option<InFlightGuard>) {
        let (id, kind) = (event.id, event.kind());
        let span = start_playback_span(kind, id);
        let started = Instant::now();

        let outcome = dispatch(
            self.backend.as_ref(),
            &self.runtime,
            event,
            self.config.effect_timeout,
        )
        .instrument(span.clone())
        .await;

        // Cleared on every outcome, before anything observes completion.
        drop(in_flight);

        let duration_ms = started.elapsed().as_millis() as u64;
        record_outcome(&span, &outcome, duration_ms);
        self.record(kind, &outcome, duration_ms);
        self.emit(SequencerEventKind::Finished {
            id,
            kind,
            outcome,
            duration_ms,
        });
    }

    fn record(&self, kind: EventKind, outcome: &PlaybackOutcome, duration_ms: u64) {
        let attrs = [
            KeyValue::new("kind", kind.as_str()),
            KeyValue::new("outcome", outcome.label()),
        ];
        metrics::events_played().add(1, &attrs);
        metrics::playback_duration_ms()
            .record(duration_ms as f64, &[KeyValue::new("kind", kind.as_str())]);

        let mut stats = lock(&self.stats);
        stats.completed += 1;
        if !outcome.is_soft_failure() {
            stats.soft_failure_streak = 0;
            return;
        }

        metrics::soft_failures().add(1, &attrs);
        stats.soft_failures += 1;
        stats.soft_failure_streak += 1;
        let threshold = self.config.soft_failure_warn_after;
        if threshold > 0 && stats.soft_failure_streak == threshold {
            warn!(
                streak = stats.soft_failure_streak,
                last_kind = %kind,
                "consecutive effects resolved without playing; event stream may be degenerate"
            );
        } else {
            debug!(%kind, outcome = %outcome, "effect resolved without playing");
        }
    }

    fn emit(&self, kind: SequencerEventKind) {
        let mut emitter = lock(&self.emitter);
        emitter.seq += 1;
        let event = SequencerEvent {
            seq: emitter.seq,
            timestamp: chrono::Utc::now(),
            kind,
        };
        // No subscribers is fine.
        let _ = emitter.tx.send(event);
    }

    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        lock(&self.state)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
