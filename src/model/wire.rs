//! Producer-facing JSON form of a game event.
//!
//! This is the shape game events arrive in from the game server. Conversion
//! into an [`AnimationEvent`] never fails. Routing follows the `type` string
//! alone: a known kind with missing or unreadable data keeps its kind and
//! leaves the affected fields empty. Only an unrecognized `type` becomes
//! [`Payload::Unknown`].

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::card::{CardType, Rank, Suit};
use super::event::{AnimationEvent, CardId, EntityId, EventKind, Payload};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameEventMessage {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub source_player_id: Option<String>,
    #[serde(default)]
    pub source_player_name: Option<String>,
    #[serde(default)]
    pub target_player_id: Option<String>,
    #[serde(default)]
    pub target_player_name: Option<String>,
    #[serde(default)]
    pub card_type: Option<String>,
    #[serde(default)]
    pub card_id: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
    /// Milliseconds since the Unix epoch, stamped by the server.
    #[serde(default)]
    pub timestamp: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DamageData {
    damage: Option<u32>,
    new_health: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RevealData {
    suit: Option<Suit>,
    rank: Option<Rank>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DrawData {
    count: Option<u32>,
}

/// Read `data` as `T`, falling back to all-empty fields.
fn read_data<T>(event_type: &str, data: &serde_json::Value) -> T
where
    T: Default + for<'de> Deserialize<'de>,
{
    if data.is_null() {
        return T::default();
    }
    serde_json::from_value(data.clone()).unwrap_or_else(|e| {
        debug!(%event_type, error = %e, "unreadable event data, playing without it");
        T::default()
    })
}

impl GameEventMessage {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            timestamp: Utc::now().timestamp_millis(),
            ..Default::default()
        }
    }

    pub fn kind(&self) -> EventKind {
        match EventKind::from_wire(&self.event_type) {
            // Mutations only exist in-process.
            EventKind::StateApply => EventKind::Unknown,
            kind => kind,
        }
    }

    /// Card type as sent, if it names a known card.
    pub fn parsed_card_type(&self) -> Option<CardType> {
        self.card_type.as_deref().and_then(|s| s.parse().ok())
    }

    fn payload(&self) -> Option<Payload> {
        let payload = match self.kind() {
            EventKind::CardPlayed => {
                let card_type = self.parsed_card_type();
                let label = match (card_type, self.card_type.as_deref()) {
                    (Some(card), _) => card.label(),
                    (None, Some(raw)) => raw.replace('_', " "),
                    (None, None) => String::new(),
                };
                Payload::CardPlayed { card_type, label }
            }
            EventKind::PlayerDamaged => {
                let d: DamageData = read_data(&self.event_type, &self.data);
                Payload::PlayerDamaged {
                    damage: d.damage,
                    new_health: d.new_health,
                }
            }
            EventKind::PlayerEliminated => Payload::PlayerEliminated {
                role: self.data.as_str().map(str::to_string),
            },
            EventKind::CardDrawn => Payload::CardDrawn {
                count: read_data::<DrawData>(&self.event_type, &self.data)
                    .count
                    .unwrap_or(1),
            },
            EventKind::CardStolen => Payload::CardStolen {
                card_type: self.parsed_card_type(),
            },
            EventKind::CardDiscarded => Payload::CardDiscarded {
                card_type: self.parsed_card_type(),
            },
            EventKind::CardRevealed => {
                let r: RevealData = read_data(&self.event_type, &self.data);
                Payload::CardRevealed {
                    suit: r.suit,
                    rank: r.rank,
                }
            }
            EventKind::CardPassed => Payload::CardPassed {
                card_type: self.parsed_card_type(),
            },
            EventKind::StateApply | EventKind::Unknown => return None,
        };
        Some(payload)
    }

    fn timestamp_utc(&self) -> DateTime<Utc> {
        if self.timestamp <= 0 {
            return Utc::now();
        }
        Utc.timestamp_millis_opt(self.timestamp)
            .single()
            .unwrap_or_else(Utc::now)
    }
}

impl From<GameEventMessage> for AnimationEvent {
    fn from(msg: GameEventMessage) -> Self {
        let payload = msg.payload().unwrap_or_else(|| {
            debug!(event_type = %msg.event_type, "unrecognized game event type");
            Payload::Unknown {
                kind: msg.event_type.clone(),
                data: msg.data.clone(),
            }
        });

        let mut event = AnimationEvent::new(payload).at(msg.timestamp_utc());
        event.card_id = msg.card_id.map(CardId);
        event.source = msg.source_player_id.map(EntityId);
        event.target = msg.target_player_id.map(EntityId);
        event
    }
}
