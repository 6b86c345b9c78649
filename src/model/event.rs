//! Animation events: the closed set of things the sequencer knows how to play.
//!
//! An event is an immutable description of one game occurrence. Its payload
//! variant *is* its kind, so the fields a kind needs always travel with it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::card::{CardType, Rank, Suit};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Newtype for animation event IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short display: first 8 chars of UUID
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Identifier of a card instance (not a card type).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(pub String);

impl CardId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CardId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a participant (usually a player) an event acts on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Kind
// ---------------------------------------------------------------------------

/// The closed enumeration of event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    CardPlayed,
    PlayerDamaged,
    PlayerEliminated,
    CardDrawn,
    CardStolen,
    CardDiscarded,
    /// A "check" draw: shown face up, then discarded.
    CardRevealed,
    CardPassed,
    StateApply,
    Unknown,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::CardPlayed => "CARD_PLAYED",
            EventKind::PlayerDamaged => "PLAYER_DAMAGED",
            EventKind::PlayerEliminated => "PLAYER_ELIMINATED",
            EventKind::CardDrawn => "CARD_DRAWN",
            EventKind::CardStolen => "CARD_STOLEN",
            EventKind::CardDiscarded => "CARD_DISCARDED",
            EventKind::CardRevealed => "CARD_REVEALED",
            EventKind::CardPassed => "CARD_PASSED",
            EventKind::StateApply => "STATE_APPLY",
            EventKind::Unknown => "UNKNOWN",
        }
    }

    /// Parse a wire name. Anything unrecognized is `Unknown`.
    pub fn from_wire(s: &str) -> Self {
        match s {
            "CARD_PLAYED" => EventKind::CardPlayed,
            "PLAYER_DAMAGED" => EventKind::PlayerDamaged,
            "PLAYER_ELIMINATED" => EventKind::PlayerEliminated,
            "CARD_DRAWN" => EventKind::CardDrawn,
            "CARD_STOLEN" => EventKind::CardStolen,
            "CARD_DISCARDED" => EventKind::CardDiscarded,
            "CARD_REVEALED" => EventKind::CardRevealed,
            "CARD_PASSED" => EventKind::CardPassed,
            "STATE_APPLY" => EventKind::StateApply,
            _ => EventKind::Unknown,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// State mutation
// ---------------------------------------------------------------------------

/// A deferred state change, run once by the sequencer at its queue position.
pub struct StateMutation(Box<dyn FnOnce() + Send + 'static>);

impl StateMutation {
    pub fn new(f: impl FnOnce() + Send + 'static) -> Self {
        Self(Box::new(f))
    }

    /// Run the mutation. Consumes it, so it can only ever run once.
    pub fn apply(self) {
        (self.0)()
    }
}

impl std::fmt::Debug for StateMutation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StateMutation(..)")
    }
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// Kind-specific data. One variant per [`EventKind`].
#[derive(Debug)]
pub enum Payload {
    CardPlayed {
        /// `None` when the server sent a card this client doesn't know.
        card_type: Option<CardType>,
        /// Text drawn on the floating card.
        label: String,
    },
    PlayerDamaged {
        damage: Option<u32>,
        new_health: Option<u32>,
    },
    PlayerEliminated {
        /// Revealed role of the eliminated player, if the game discloses it.
        role: Option<String>,
    },
    CardDrawn {
        count: u32,
    },
    CardStolen {
        card_type: Option<CardType>,
    },
    CardDiscarded {
        card_type: Option<CardType>,
    },
    CardRevealed {
        suit: Option<Suit>,
        rank: Option<Rank>,
    },
    CardPassed {
        card_type: Option<CardType>,
    },
    StateApply(StateMutation),
    Unknown {
        /// The kind string as received.
        kind: String,
        data: serde_json::Value,
    },
}

impl Payload {
    pub fn kind(&self) -> EventKind {
        match self {
            Payload::CardPlayed { .. } => EventKind::CardPlayed,
            Payload::PlayerDamaged { .. } => EventKind::PlayerDamaged,
            Payload::PlayerEliminated { .. } => EventKind::PlayerEliminated,
            Payload::CardDrawn { .. } => EventKind::CardDrawn,
            Payload::CardStolen { .. } => EventKind::CardStolen,
            Payload::CardDiscarded { .. } => EventKind::CardDiscarded,
            Payload::CardRevealed { .. } => EventKind::CardRevealed,
            Payload::CardPassed { .. } => EventKind::CardPassed,
            Payload::StateApply(_) => EventKind::StateApply,
            Payload::Unknown { .. } => EventKind::Unknown,
        }
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A single game occurrence to be depicted.
#[derive(Debug)]
pub struct AnimationEvent {
    pub id: EventId,
    /// Card instance this event moves or shows. Marked in-flight while playing.
    pub card_id: Option<CardId>,
    /// Acting participant.
    pub source: Option<EntityId>,
    /// Affected participant.
    pub target: Option<EntityId>,
    pub payload: Payload,
    pub timestamp: DateTime<Utc>,
}

impl AnimationEvent {
    pub fn new(payload: Payload) -> Self {
        Self {
            id: EventId::new(),
            card_id: None,
            source: None,
            target: None,
            payload,
            timestamp: Utc::now(),
        }
    }

    pub fn card_played(card_type: CardType) -> Self {
        Self::new(Payload::CardPlayed {
            card_type: Some(card_type),
            label: card_type.label(),
        })
    }

    pub fn player_damaged(damage: u32, new_health: u32) -> Self {
        Self::new(Payload::PlayerDamaged {
            damage: Some(damage),
            new_health: Some(new_health),
        })
    }

    pub fn player_eliminated(role: Option<String>) -> Self {
        Self::new(Payload::PlayerEliminated { role })
    }

    pub fn card_drawn(count: u32) -> Self {
        Self::new(Payload::CardDrawn { count })
    }

    pub fn card_stolen(card_type: Option<CardType>) -> Self {
        Self::new(Payload::CardStolen { card_type })
    }

    pub fn card_discarded(card_type: Option<CardType>) -> Self {
        Self::new(Payload::CardDiscarded { card_type })
    }

    pub fn card_revealed(suit: Suit, rank: Rank) -> Self {
        Self::new(Payload::CardRevealed {
            suit: Some(suit),
            rank: Some(rank),
        })
    }

    pub fn card_passed(card_type: Option<CardType>) -> Self {
        Self::new(Payload::CardPassed { card_type })
    }

    /// A zero-duration event that runs `f` once every earlier event has played.
    pub fn state_apply(f: impl FnOnce() + Send + 'static) -> Self {
        Self::new(Payload::StateApply(StateMutation::new(f)))
    }

    pub fn unknown(kind: impl Into<String>, data: serde_json::Value) -> Self {
        Self::new(Payload::Unknown {
            kind: kind.into(),
            data,
        })
    }

    pub fn card(mut self, card_id: impl Into<String>) -> Self {
        self.card_id = Some(CardId::new(card_id));
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(EntityId::new(source));
        self
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(EntityId::new(target));
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}
