//! Shared test backend: records every start/end and how many effects overlap.

#![allow(dead_code)]

use cardfx::model::{AnimationEvent, CardId};
use cardfx::playback::{CompletionSignal, PlaybackBackend, PlaybackOutcome};
use cardfx::sequencer::InFlightTracker;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Start(String),
    End(String),
}

type Probe = Box<dyn Fn() -> i64 + Send + Sync>;

struct Inner {
    delay: Duration,
    steps: Mutex<Vec<Step>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    missing: Mutex<HashSet<String>>,
    tracker: OnceLock<InFlightTracker>,
    in_flight_at_start: Mutex<Vec<(CardId, bool)>>,
    probe: Option<Probe>,
    observed: Mutex<Vec<(Step, i64)>>,
}

/// Plays every effect as a fixed-length sleep and records what it saw.
#[derive(Clone)]
pub struct Recorder {
    inner: Arc<Inner>,
}

impl Recorder {
    pub fn new(delay: Duration) -> Self {
        Self::build(delay, None)
    }

    /// Also sample `probe` at every start and end.
    pub fn with_probe(delay: Duration, probe: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        Self::build(delay, Some(Box::new(probe)))
    }

    fn build(delay: Duration, probe: Option<Probe>) -> Self {
        Self {
            inner: Arc::new(Inner {
                delay,
                steps: Mutex::new(Vec::new()),
                active: AtomicUsize::new(0),
                max_active: AtomicUsize::new(0),
                missing: Mutex::new(HashSet::new()),
                tracker: OnceLock::new(),
                in_flight_at_start: Mutex::new(Vec::new()),
                probe,
                observed: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Let the recorder check in-flight membership when an effect starts.
    pub fn attach(&self, tracker: InFlightTracker) {
        let _ = self.inner.tracker.set(tracker);
    }

    /// Treat `target` as not on screen: its effects are skipped.
    pub fn hide(&self, target: &str) {
        self.inner.missing.lock().unwrap().insert(target.to_string());
    }

    pub fn steps(&self) -> Vec<Step> {
        self.inner.steps.lock().unwrap().clone()
    }

    pub fn started(&self) -> Vec<String> {
        self.steps()
            .into_iter()
            .filter_map(|s| match s {
                Step::Start(label) => Some(label),
                Step::End(_) => None,
            })
            .collect()
    }

    pub fn max_active(&self) -> usize {
        self.inner.max_active.load(Ordering::SeqCst)
    }

    pub fn in_flight_at_start(&self) -> Vec<(CardId, bool)> {
        self.inner.in_flight_at_start.lock().unwrap().clone()
    }

    pub fn observed(&self) -> Vec<(Step, i64)> {
        self.inner.observed.lock().unwrap().clone()
    }
}

fn sample(inner: &Inner, step: Step) {
    if let Some(probe) = &inner.probe {
        inner.observed.lock().unwrap().push((step.clone(), probe()));
    }
    inner.steps.lock().unwrap().push(step);
}

/// `KIND:participant`, e.g. `PLAYER_DAMAGED:P2`.
pub fn label(event: &AnimationEvent) -> String {
    let who = event
        .target
        .as_ref()
        .or(event.source.as_ref())
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string());
    format!("{}:{who}", event.kind())
}

impl PlaybackBackend for Recorder {
    fn play(&self, event: &AnimationEvent) -> CompletionSignal {
        let inner = Arc::clone(&self.inner);
        let label = label(event);

        if let (Some(card), Some(tracker)) = (&event.card_id, inner.tracker.get()) {
            inner
                .in_flight_at_start
                .lock()
                .unwrap()
                .push((card.clone(), tracker.contains(card)));
        }
        sample(&inner, Step::Start(label.clone()));

        let hidden = event
            .target
            .as_ref()
            .is_some_and(|t| inner.missing.lock().unwrap().contains(t.as_str()));
        if hidden {
            sample(&inner, Step::End(label));
            return CompletionSignal::ready(PlaybackOutcome::skipped("hidden"));
        }

        let now = inner.active.fetch_add(1, Ordering::SeqCst) + 1;
        inner.max_active.fetch_max(now, Ordering::SeqCst);

        CompletionSignal::from_future(async move {
            tokio::time::sleep(inner.delay).await;
            inner.active.fetch_sub(1, Ordering::SeqCst);
            sample(&inner, Step::End(label));
            PlaybackOutcome::Played
        })
    }
}
