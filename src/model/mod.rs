//! Core data model.
//!
//! An animation event is something that needs showing. It has an identity,
//! optional card and participant references, and a kind-specific payload.

pub mod card;
pub mod event;
pub mod wire;

pub use card::{CardType, Rank, Suit};
pub use event::{AnimationEvent, CardId, EntityId, EventId, EventKind, Payload, StateMutation};
pub use wire::GameEventMessage;
