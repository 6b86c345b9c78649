//! Integration tests for the animation sequencer.

mod common;

use cardfx::error::Error;
use cardfx::event::{SequencerEvent, SequencerEventKind};
use cardfx::model::{AnimationEvent, CardId, CardType, EventKind};
use cardfx::playback::{
    Completer, CompletionSignal, NullBackend, PlaybackBackend, PlaybackOutcome,
};
use cardfx::sequencer::{Sequencer, SequencerConfig};
use common::{Recorder, Step};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

const EFFECT: Duration = Duration::from_millis(100);

fn sequencer_with(recorder: &Recorder) -> Sequencer {
    let sequencer = Sequencer::new(recorder.clone(), SequencerConfig::default())
        .expect("sequencer needs a runtime");
    recorder.attach(sequencer.in_flight());
    sequencer
}

fn drain_events(rx: &mut broadcast::Receiver<SequencerEvent>) -> Vec<SequencerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn outcomes(events: &[SequencerEvent]) -> Vec<(EventKind, PlaybackOutcome)> {
    events
        .iter()
        .filter_map(|e| match &e.kind {
            SequencerEventKind::Finished { kind, outcome, .. } => Some((*kind, outcome.clone())),
            _ => None,
        })
        .collect()
}

/// Wait until the lifecycle stream reports `pred`.
async fn wait_for_event(
    rx: &mut broadcast::Receiver<SequencerEvent>,
    pred: impl Fn(&SequencerEventKind) -> bool,
) {
    loop {
        let event = rx.recv().await.expect("event stream closed");
        if pred(&event.kind) {
            return;
        }
    }
}

// ---------------------------------------------------------------------------
// Construction and idle behavior
// ---------------------------------------------------------------------------

#[test]
fn new_outside_runtime_is_an_error() {
    let result = Sequencer::new(NullBackend, SequencerConfig::default());
    assert!(matches!(result, Err(Error::Runtime(_))));
}

#[tokio::test(start_paused = true)]
async fn idle_sequencer_stays_idle() {
    let recorder = Recorder::new(EFFECT);
    let sequencer = sequencer_with(&recorder);

    assert!(!sequencer.is_processing());
    assert!(!*sequencer.busy().borrow());
    assert_eq!(sequencer.pending(), 0);

    // Waiting on an empty queue returns at once.
    let start = Instant::now();
    sequencer.wait_idle().await;
    assert_eq!(start.elapsed(), Duration::ZERO);

    assert!(recorder.steps().is_empty());
    assert_eq!(sequencer.stats().enqueued, 0);
    assert!(sequencer.in_flight().is_empty());
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn events_play_in_enqueue_order_one_at_a_time() {
    let recorder = Recorder::new(EFFECT);
    let sequencer = sequencer_with(&recorder);

    for i in 0..5 {
        sequencer.enqueue(AnimationEvent::player_damaged(1, 4).target(format!("P{i}")));
    }
    assert!(sequencer.is_processing());

    sequencer.wait_idle().await;

    let expected: Vec<Step> = (0..5)
        .flat_map(|i| {
            let label = format!("PLAYER_DAMAGED:P{i}");
            [Step::Start(label.clone()), Step::End(label)]
        })
        .collect();
    assert_eq!(recorder.steps(), expected);
    assert_eq!(recorder.max_active(), 1);
    assert!(!sequencer.is_processing());
}

#[tokio::test(start_paused = true)]
async fn events_appended_mid_drain_join_the_same_worker() {
    let recorder = Recorder::new(EFFECT);
    let sequencer = sequencer_with(&recorder);
    let mut busy = sequencer.busy();
    let mut rx = sequencer.subscribe();

    sequencer.enqueue(AnimationEvent::card_drawn(1).target("P1"));
    wait_for_event(&mut rx, |k| matches!(k, SequencerEventKind::Started { .. })).await;

    // Still draining the first event; append two more.
    sequencer.enqueue(AnimationEvent::card_drawn(1).target("P2"));
    sequencer.enqueue(AnimationEvent::card_drawn(1).target("P3"));
    assert!(sequencer.is_processing());
    assert_eq!(sequencer.pending(), 2);

    sequencer.wait_idle().await;

    assert_eq!(
        recorder.started(),
        vec!["CARD_DRAWN:P1", "CARD_DRAWN:P2", "CARD_DRAWN:P3"]
    );
    assert_eq!(recorder.max_active(), 1);

    // The busy signal never dropped between the three events.
    let drained = drain_events(&mut rx);
    let drains = drained
        .iter()
        .filter(|e| e.kind == SequencerEventKind::Drained)
        .count();
    assert_eq!(drains, 1);
    assert!(busy.has_changed().unwrap());
    assert!(!*busy.borrow_and_update());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_producers_never_overlap_playback() {
    let recorder = Recorder::new(Duration::from_millis(2));
    let sequencer = sequencer_with(&recorder);

    let mut tasks = Vec::new();
    for producer in 0..4 {
        let sequencer = sequencer.clone();
        tasks.push(tokio::spawn(async move {
            for i in 0..10 {
                sequencer.enqueue(
                    AnimationEvent::card_passed(None)
                        .source("dealer")
                        .target(format!("p{producer}-{i}")),
                );
                tokio::task::yield_now().await;
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    sequencer.wait_idle().await;

    assert_eq!(recorder.max_active(), 1);
    let steps = recorder.steps();
    assert_eq!(steps.len(), 80);
    for pair in steps.chunks(2) {
        match pair {
            [Step::Start(a), Step::End(b)] => assert_eq!(a, b),
            other => panic!("overlapping playback: {other:?}"),
        }
    }

    // Each producer's own events stay in its order.
    let started = recorder.started();
    for producer in 0..4 {
        let mine: Vec<_> = started
            .iter()
            .filter(|l| l.starts_with(&format!("CARD_PASSED:p{producer}-")))
            .cloned()
            .collect();
        let expected: Vec<_> = (0..10)
            .map(|i| format!("CARD_PASSED:p{producer}-{i}"))
            .collect();
        assert_eq!(mine, expected);
    }
    assert_eq!(sequencer.stats().completed, 40);
}

#[tokio::test]
async fn next_event_waits_for_completion_signal() {
    #[derive(Clone, Default)]
    struct Manual {
        completers: Arc<Mutex<Vec<Completer>>>,
    }

    impl PlaybackBackend for Manual {
        fn play(&self, _event: &AnimationEvent) -> CompletionSignal {
            let (completer, signal) = CompletionSignal::pending();
            self.completers.lock().unwrap().push(completer);
            signal
        }
    }

    let backend = Manual::default();
    let sequencer = Sequencer::new(backend.clone(), SequencerConfig::default()).unwrap();
    let mut rx = sequencer.subscribe();

    sequencer.enqueue(AnimationEvent::card_played(CardType::Beer).source("P1"));
    sequencer.enqueue(AnimationEvent::card_played(CardType::Saloon).source("P1"));
    wait_for_event(&mut rx, |k| matches!(k, SequencerEventKind::Started { .. })).await;

    // Give the worker every chance to start the second event early.
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert_eq!(backend.completers.lock().unwrap().len(), 1);
    assert_eq!(sequencer.pending(), 1);

    let first = backend.completers.lock().unwrap().remove(0);
    first.resolve(PlaybackOutcome::Played);
    wait_for_event(&mut rx, |k| matches!(k, SequencerEventKind::Started { .. })).await;
    assert_eq!(backend.completers.lock().unwrap().len(), 1);

    let second = backend.completers.lock().unwrap().remove(0);
    second.resolve(PlaybackOutcome::Played);
    sequencer.wait_idle().await;
    assert!(!sequencer.is_processing());
}

#[tokio::test(start_paused = true)]
async fn lifecycle_events_have_monotonic_seq() {
    let recorder = Recorder::new(EFFECT);
    let sequencer = sequencer_with(&recorder);
    let mut rx = sequencer.subscribe();

    sequencer.enqueue(AnimationEvent::card_drawn(2).target("P1"));
    sequencer.enqueue(AnimationEvent::player_damaged(1, 3).target("P2"));
    sequencer.wait_idle().await;

    let events = drain_events(&mut rx);
    for window in events.windows(2) {
        assert!(window[1].seq > window[0].seq);
    }

    let kinds: Vec<&str> = events
        .iter()
        .map(|e| match e.kind {
            SequencerEventKind::Enqueued { .. } => "enqueued",
            SequencerEventKind::Started { .. } => "started",
            SequencerEventKind::Finished { .. } => "finished",
            SequencerEventKind::Drained => "drained",
        })
        .collect();
    assert_eq!(
        kinds,
        vec!["enqueued", "enqueued", "started", "finished", "started", "finished", "drained"]
    );
}

// ---------------------------------------------------------------------------
// In-flight tracking
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn card_is_in_flight_only_while_playing() {
    let recorder = Recorder::new(EFFECT);
    let sequencer = sequencer_with(&recorder);
    let mut rx = sequencer.subscribe();
    let card = CardId::new("card-7");

    sequencer.enqueue(AnimationEvent::card_drawn(1).target("P1"));
    sequencer.enqueue(AnimationEvent::card_played(CardType::Bang).card("card-7").source("P1"));

    // Queued behind the draw: not yet in flight.
    assert!(!sequencer.is_in_flight(&card));

    wait_for_event(&mut rx, |k| {
        matches!(k, SequencerEventKind::Started { kind: EventKind::CardPlayed, .. })
    })
    .await;
    assert!(sequencer.is_in_flight(&card));
    assert_eq!(sequencer.in_flight().snapshot(), vec![card.clone()]);

    sequencer.wait_idle().await;
    assert!(!sequencer.is_in_flight(&card));
    assert!(sequencer.in_flight().is_empty());
    assert_eq!(recorder.in_flight_at_start(), vec![(card, true)]);
}

#[tokio::test(start_paused = true)]
async fn in_flight_cleared_after_soft_failure() {
    let recorder = Recorder::new(EFFECT);
    recorder.hide("ghost");
    let sequencer = sequencer_with(&recorder);

    sequencer.enqueue(
        AnimationEvent::card_stolen(Some(CardType::Barrel))
            .card("card-3")
            .source("P1")
            .target("ghost"),
    );
    sequencer.wait_idle().await;

    assert_eq!(
        recorder.in_flight_at_start(),
        vec![(CardId::new("card-3"), true)]
    );
    assert!(sequencer.in_flight().is_empty());
}

// ---------------------------------------------------------------------------
// Deferred state mutation
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn state_apply_lands_between_neighbors() {
    let value = Arc::new(AtomicI64::new(0));
    let probe = Arc::clone(&value);
    let recorder = Recorder::with_probe(EFFECT, move || probe.load(Ordering::SeqCst));
    let sequencer = sequencer_with(&recorder);

    sequencer.enqueue(AnimationEvent::card_discarded(None).target("A"));
    let setter = Arc::clone(&value);
    sequencer.enqueue(AnimationEvent::state_apply(move || {
        setter.store(1, Ordering::SeqCst);
    }));
    sequencer.enqueue(AnimationEvent::card_discarded(None).target("B"));

    // Not applied at enqueue time.
    assert_eq!(value.load(Ordering::SeqCst), 0);

    sequencer.wait_idle().await;

    assert_eq!(
        recorder.observed(),
        vec![
            (Step::Start("CARD_DISCARDED:A".into()), 0),
            (Step::End("CARD_DISCARDED:A".into()), 0),
            (Step::Start("CARD_DISCARDED:B".into()), 1),
            (Step::End("CARD_DISCARDED:B".into()), 1),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn state_apply_and_unknown_take_no_time_and_skip_backend() {
    let recorder = Recorder::new(EFFECT);
    let sequencer = sequencer_with(&recorder);
    let mut rx = sequencer.subscribe();

    let start = Instant::now();
    sequencer.enqueue(AnimationEvent::state_apply(|| {}));
    sequencer.enqueue(AnimationEvent::unknown("TURN_STARTED", serde_json::Value::Null));
    sequencer.wait_idle().await;

    assert_eq!(start.elapsed(), Duration::ZERO);
    assert!(recorder.steps().is_empty());
    assert_eq!(
        outcomes(&drain_events(&mut rx)),
        vec![
            (EventKind::StateApply, PlaybackOutcome::Applied),
            (EventKind::Unknown, PlaybackOutcome::Ignored),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn panicking_mutation_does_not_stall_queue() {
    let recorder = Recorder::new(EFFECT);
    let sequencer = sequencer_with(&recorder);
    let mut rx = sequencer.subscribe();

    sequencer.enqueue(AnimationEvent::state_apply(|| panic!("bad snapshot")));
    sequencer.enqueue(AnimationEvent::card_drawn(1).target("P1"));
    sequencer.wait_idle().await;

    assert_eq!(recorder.started(), vec!["CARD_DRAWN:P1"]);
    let results = outcomes(&drain_events(&mut rx));
    assert!(results[0].1.is_soft_failure());
    assert_eq!(results[1].1, PlaybackOutcome::Played);
}

// ---------------------------------------------------------------------------
// Soft failures and liveness
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn missing_target_resolves_immediately_and_does_not_block() {
    let recorder = Recorder::new(EFFECT);
    recorder.hide("P9");
    let sequencer = sequencer_with(&recorder);
    let mut rx = sequencer.subscribe();

    let start = Instant::now();
    sequencer.enqueue(AnimationEvent::player_eliminated(None).target("P9"));
    sequencer.wait_idle().await;
    assert_eq!(start.elapsed(), Duration::ZERO);

    sequencer.enqueue(AnimationEvent::player_damaged(1, 2).target("P1"));
    sequencer.wait_idle().await;
    let elapsed = start.elapsed();
    assert!(elapsed >= EFFECT && elapsed < EFFECT * 2, "took {elapsed:?}");

    let results = outcomes(&drain_events(&mut rx));
    assert!(matches!(results[0].1, PlaybackOutcome::Skipped { .. }));
    assert_eq!(results[1].1, PlaybackOutcome::Played);
}

#[tokio::test(start_paused = true)]
async fn timeout_forces_resolution() {
    struct Stuck;

    impl PlaybackBackend for Stuck {
        fn play(&self, event: &AnimationEvent) -> CompletionSignal {
            if event.kind() == EventKind::CardRevealed {
                CompletionSignal::from_future(std::future::pending())
            } else {
                CompletionSignal::ready(PlaybackOutcome::Played)
            }
        }
    }

    let config = SequencerConfig {
        effect_timeout: Some(Duration::from_secs(2)),
        ..Default::default()
    };
    let sequencer = Sequencer::new(Stuck, config).unwrap();
    let mut rx = sequencer.subscribe();

    let start = Instant::now();
    sequencer.enqueue(AnimationEvent::card_revealed(
        cardfx::model::Suit::Spades,
        cardfx::model::Rank::ACE,
    ));
    sequencer.enqueue(AnimationEvent::card_drawn(1).target("P1"));
    sequencer.wait_idle().await;

    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(2) && elapsed < Duration::from_secs(3));
    assert_eq!(
        outcomes(&drain_events(&mut rx)),
        vec![
            (EventKind::CardRevealed, PlaybackOutcome::TimedOut),
            (EventKind::CardDrawn, PlaybackOutcome::Played),
        ]
    );
}

#[tokio::test]
async fn dropped_completer_counts_as_abandoned() {
    struct Forgetful;

    impl PlaybackBackend for Forgetful {
        fn play(&self, _event: &AnimationEvent) -> CompletionSignal {
            let (_completer, signal) = CompletionSignal::pending();
            signal
        }
    }

    let sequencer = Sequencer::new(Forgetful, SequencerConfig::default()).unwrap();
    let mut rx = sequencer.subscribe();

    sequencer.enqueue(AnimationEvent::card_drawn(1).target("P1"));
    sequencer.enqueue(AnimationEvent::card_drawn(1).target("P2"));
    sequencer.wait_idle().await;

    assert_eq!(
        outcomes(&drain_events(&mut rx)),
        vec![
            (EventKind::CardDrawn, PlaybackOutcome::Abandoned),
            (EventKind::CardDrawn, PlaybackOutcome::Abandoned),
        ]
    );
}

#[tokio::test]
async fn panicking_backend_does_not_stall_queue() {
    struct Flaky;

    async fn explode() -> PlaybackOutcome {
        panic!("tween blew up")
    }

    impl PlaybackBackend for Flaky {
        fn play(&self, event: &AnimationEvent) -> CompletionSignal {
            match event.kind() {
                EventKind::CardStolen => panic!("renderer blew up"),
                EventKind::CardPassed => CompletionSignal::from_future(explode()),
                _ => CompletionSignal::ready(PlaybackOutcome::Played),
            }
        }
    }

    let sequencer = Sequencer::new(Flaky, SequencerConfig::default()).unwrap();
    let mut rx = sequencer.subscribe();

    sequencer.enqueue(AnimationEvent::card_stolen(None));
    sequencer.enqueue(AnimationEvent::card_passed(None));
    sequencer.enqueue(AnimationEvent::card_drawn(1));
    sequencer.wait_idle().await;

    assert_eq!(
        outcomes(&drain_events(&mut rx)),
        vec![
            (EventKind::CardStolen, PlaybackOutcome::Abandoned),
            (EventKind::CardPassed, PlaybackOutcome::Abandoned),
            (EventKind::CardDrawn, PlaybackOutcome::Played),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn soft_failure_streak_is_tracked_and_reset() {
    let recorder = Recorder::new(EFFECT);
    recorder.hide("gone");
    let config = SequencerConfig {
        soft_failure_warn_after: 2,
        ..Default::default()
    };
    let sequencer = Sequencer::new(recorder.clone(), config).unwrap();

    for _ in 0..3 {
        sequencer.enqueue(AnimationEvent::player_damaged(1, 0).target("gone"));
    }
    sequencer.wait_idle().await;

    let stats = sequencer.stats();
    assert_eq!(stats.enqueued, 3);
    assert_eq!(stats.completed, 3);
    assert_eq!(stats.soft_failures, 3);
    assert_eq!(stats.soft_failure_streak, 3);

    sequencer.enqueue(AnimationEvent::player_damaged(1, 2).target("here"));
    sequencer.wait_idle().await;

    let stats = sequencer.stats();
    assert_eq!(stats.soft_failures, 3);
    assert_eq!(stats.soft_failure_streak, 0);
}

// ---------------------------------------------------------------------------
// End to end
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn turn_with_deferred_score_plays_in_order() {
    let score = Arc::new(AtomicI64::new(0));
    let probe = Arc::clone(&score);
    let recorder = Recorder::with_probe(EFFECT, move || probe.load(Ordering::SeqCst));
    let sequencer = sequencer_with(&recorder);
    let mut busy = sequencer.busy();
    let drawn = CardId::new("c-1");

    sequencer.enqueue(AnimationEvent::card_drawn(1).card("c-1").target("P1"));
    sequencer.enqueue(AnimationEvent::player_damaged(1, 0).target("P2"));
    let setter = Arc::clone(&score);
    sequencer.enqueue(AnimationEvent::state_apply(move || {
        setter.store(10, Ordering::SeqCst);
    }));
    sequencer.enqueue(AnimationEvent::player_eliminated(Some("OUTLAW".into())).target("P2"));

    assert!(sequencer.is_processing());
    assert!(*busy.borrow_and_update());

    sequencer.wait_idle().await;

    assert_eq!(
        recorder.started(),
        vec!["CARD_DRAWN:P1", "PLAYER_DAMAGED:P2", "PLAYER_ELIMINATED:P2"]
    );
    assert_eq!(
        recorder.observed(),
        vec![
            (Step::Start("CARD_DRAWN:P1".into()), 0),
            (Step::End("CARD_DRAWN:P1".into()), 0),
            (Step::Start("PLAYER_DAMAGED:P2".into()), 0),
            (Step::End("PLAYER_DAMAGED:P2".into()), 0),
            (Step::Start("PLAYER_ELIMINATED:P2".into()), 10),
            (Step::End("PLAYER_ELIMINATED:P2".into()), 10),
        ]
    );
    assert_eq!(recorder.in_flight_at_start(), vec![(drawn.clone(), true)]);
    assert!(!sequencer.is_in_flight(&drawn));
    assert!(!sequencer.is_processing());
    assert!(!*busy.borrow_and_update());
    assert_eq!(score.load(Ordering::SeqCst), 10);
}
