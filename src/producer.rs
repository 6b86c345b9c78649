//! Producer-side integration: turning incoming game events and state
//! snapshots into sequenced work.
//!
//! Snapshots arrive independently of what is on screen. Applying one
//! directly would jump the UI past an effect that is still depicting the
//! transition, so the producer wraps it as a state-apply event and queues it
//! behind the effects it belongs after.

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::debug;

use crate::model::{AnimationEvent, CardType, EventKind, GameEventMessage};
use crate::sequencer::Sequencer;

/// How many recent game events the producer remembers by default.
pub const DEFAULT_LOG_CAPACITY: usize = 50;

// ---------------------------------------------------------------------------
// State store
// ---------------------------------------------------------------------------

/// Shared, swappable game state read by the rendering layer.
#[derive(Debug, Default)]
pub struct StateStore<S> {
    inner: Arc<RwLock<S>>,
}

impl<S> Clone for StateStore<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> StateStore<S> {
    pub fn new(initial: S) -> Self {
        Self {
            inner: Arc::new(RwLock::new(initial)),
        }
    }

    pub fn read<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.inner.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        f(&mut self.inner.write().unwrap_or_else(PoisonError::into_inner))
    }

    /// Swap in a new value, returning the old one.
    pub fn replace(&self, value: S) -> S {
        self.update(|state| std::mem::replace(state, value))
    }
}

impl<S: Clone> StateStore<S> {
    pub fn get(&self) -> S {
        self.read(S::clone)
    }
}

// ---------------------------------------------------------------------------
// Sound cues
// ---------------------------------------------------------------------------

/// Sound to play alongside an incoming game event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SoundCue {
    Gunshot,
    PlayCard,
    Damage,
    Death,
    Draw,
}

impl SoundCue {
    /// The cue for a game event, if it has one.
    pub fn for_message(msg: &GameEventMessage) -> Option<Self> {
        match msg.kind() {
            EventKind::CardPlayed if msg.parsed_card_type() == Some(CardType::Bang) => {
                Some(SoundCue::Gunshot)
            }
            EventKind::CardPlayed => Some(SoundCue::PlayCard),
            EventKind::PlayerDamaged => Some(SoundCue::Damage),
            EventKind::PlayerEliminated => Some(SoundCue::Death),
            EventKind::CardDrawn => Some(SoundCue::Draw),
            _ => None,
        }
    }

    /// Asset name, e.g. `"gunshot"`.
    pub fn name(self) -> &'static str {
        match self {
            SoundCue::Gunshot => "gunshot",
            SoundCue::PlayCard => "play_card",
            SoundCue::Damage => "damage",
            SoundCue::Death => "death",
            SoundCue::Draw => "draw",
        }
    }
}

/// Receives sound cues. Mixing and playback live elsewhere.
pub trait CueSink: Send + Sync + 'static {
    fn cue(&self, cue: SoundCue);
}

// ---------------------------------------------------------------------------
// Event log
// ---------------------------------------------------------------------------

/// Bounded history of received game events, oldest first.
#[derive(Debug, Clone)]
pub struct EventLog {
    entries: VecDeque<GameEventMessage>,
    capacity: usize,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, msg: GameEventMessage) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(msg);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GameEventMessage> {
        self.entries.iter()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Producer
// ---------------------------------------------------------------------------

/// Feeds a [`Sequencer`] from the network/state layer.
#[derive(Clone)]
pub struct Producer {
    sequencer: Sequencer,
    log: Arc<Mutex<EventLog>>,
    cues: Option<Arc<dyn CueSink>>,
}

impl Producer {
    pub fn new(sequencer: Sequencer) -> Self {
        Self {
            sequencer,
            log: Arc::new(Mutex::new(EventLog::default())),
            cues: None,
        }
    }

    pub fn with_cues(mut self, sink: impl CueSink) -> Self {
        self.cues = Some(Arc::new(sink));
        self
    }

    pub fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.log = Arc::new(Mutex::new(EventLog::new(capacity)));
        self
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    /// Record, cue and queue one incoming game event.
    pub fn handle_game_event(&self, msg: GameEventMessage) {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(msg.clone());

        if let (Some(sink), Some(cue)) = (&self.cues, SoundCue::for_message(&msg)) {
            sink.cue(cue);
        }

        debug!(event_type = %msg.event_type, "game event received");
        self.sequencer.enqueue(msg.into());
    }

    /// Queue an arbitrary animation event.
    pub fn enqueue(&self, event: AnimationEvent) {
        self.sequencer.enqueue(event);
    }

    /// Run `f` once every event queued so far has finished playing.
    pub fn defer(&self, f: impl FnOnce() + Send + 'static) {
        self.sequencer.enqueue(AnimationEvent::state_apply(f));
    }

    /// Replace `store`'s value with `snapshot` at this point in the queue.
    pub fn defer_snapshot<S>(&self, store: &StateStore<S>, snapshot: S)
    where
        S: Send + Sync + 'static,
    {
        let store = store.clone();
        self.defer(move || {
            store.replace(snapshot);
        });
    }

    /// Queue one turn's events followed by the snapshot they lead to.
    pub fn handle_turn<S, I>(&self, events: I, store: &StateStore<S>, snapshot: S)
    where
        S: Send + Sync + 'static,
        I: IntoIterator<Item = GameEventMessage>,
    {
        for msg in events {
            self.handle_game_event(msg);
        }
        self.defer_snapshot(store, snapshot);
    }

    /// Recently received game events, oldest first.
    pub fn recent_events(&self) -> Vec<GameEventMessage> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}
