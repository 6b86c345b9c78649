//! Card vocabulary: card types, suits and ranks.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Every card type in the deck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CardType {
    // Brown cards: immediate effect, then discarded.
    Bang,
    Missed,
    Beer,
    Saloon,
    Stagecoach,
    WellsFargo,
    Panic,
    CatBalou,
    Duel,
    Gatling,
    Indians,
    GeneralStore,

    // Blue cards: stay in play.
    Barrel,
    Mustang,
    Scope,
    Jail,
    Dynamite,

    // Weapons.
    Volcanic,
    Schofield,
    Remington,
    RevCarabine,
    Winchester,
}

impl CardType {
    pub const ALL: [CardType; 22] = [
        CardType::Bang,
        CardType::Missed,
        CardType::Beer,
        CardType::Saloon,
        CardType::Stagecoach,
        CardType::WellsFargo,
        CardType::Panic,
        CardType::CatBalou,
        CardType::Duel,
        CardType::Gatling,
        CardType::Indians,
        CardType::GeneralStore,
        CardType::Barrel,
        CardType::Mustang,
        CardType::Scope,
        CardType::Jail,
        CardType::Dynamite,
        CardType::Volcanic,
        CardType::Schofield,
        CardType::Remington,
        CardType::RevCarabine,
        CardType::Winchester,
    ];

    /// Wire name, e.g. `"CAT_BALOU"`.
    pub fn as_str(self) -> &'static str {
        match self {
            CardType::Bang => "BANG",
            CardType::Missed => "MISSED",
            CardType::Beer => "BEER",
            CardType::Saloon => "SALOON",
            CardType::Stagecoach => "STAGECOACH",
            CardType::WellsFargo => "WELLS_FARGO",
            CardType::Panic => "PANIC",
            CardType::CatBalou => "CAT_BALOU",
            CardType::Duel => "DUEL",
            CardType::Gatling => "GATLING",
            CardType::Indians => "INDIANS",
            CardType::GeneralStore => "GENERAL_STORE",
            CardType::Barrel => "BARREL",
            CardType::Mustang => "MUSTANG",
            CardType::Scope => "SCOPE",
            CardType::Jail => "JAIL",
            CardType::Dynamite => "DYNAMITE",
            CardType::Volcanic => "VOLCANIC",
            CardType::Schofield => "SCHOFIELD",
            CardType::Remington => "REMINGTON",
            CardType::RevCarabine => "REV_CARABINE",
            CardType::Winchester => "WINCHESTER",
        }
    }

    /// Human-facing label drawn on a floating card, e.g. `"CAT BALOU"`.
    pub fn label(self) -> String {
        self.as_str().replace('_', " ")
    }

    /// Equipment and weapons stay on the table after being played.
    pub fn is_blue(self) -> bool {
        matches!(
            self,
            CardType::Barrel
                | CardType::Mustang
                | CardType::Scope
                | CardType::Jail
                | CardType::Dynamite
                | CardType::Volcanic
                | CardType::Schofield
                | CardType::Remington
                | CardType::RevCarabine
                | CardType::Winchester
        )
    }
}

impl std::fmt::Display for CardType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CardType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CardType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown card type: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Suit {
    Hearts,
    Diamonds,
    Clubs,
    Spades,
}

impl Suit {
    /// Hearts are what a "check" draw usually looks for (barrel, jail, dynamite).
    pub fn is_red(self) -> bool {
        matches!(self, Suit::Hearts | Suit::Diamonds)
    }

    pub fn symbol(self) -> char {
        match self {
            Suit::Hearts => '♥',
            Suit::Diamonds => '♦',
            Suit::Clubs => '♣',
            Suit::Spades => '♠',
        }
    }
}

/// Card rank, 2 through ace. Serialized as its face text (`"10"`, `"Q"`, `"A"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rank(u8);

impl Rank {
    pub const JACK: Rank = Rank(11);
    pub const QUEEN: Rank = Rank(12);
    pub const KING: Rank = Rank(13);
    pub const ACE: Rank = Rank(14);

    /// Build a rank from its numeric value (2..=14, ace high).
    pub fn new(value: u8) -> Option<Self> {
        (2..=14).contains(&value).then_some(Self(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl std::fmt::Display for Rank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            11 => f.write_str("J"),
            12 => f.write_str("Q"),
            13 => f.write_str("K"),
            14 => f.write_str("A"),
            n => write!(f, "{n}"),
        }
    }
}

impl FromStr for Rank {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = match s.trim().to_ascii_uppercase().as_str() {
            "J" => 11,
            "Q" => 12,
            "K" => 13,
            "A" => 14,
            other => other.parse::<u8>().map_err(|_| format!("bad rank: {s}"))?,
        };
        Rank::new(value).ok_or_else(|| format!("rank out of range: {s}"))
    }
}

impl TryFrom<String> for Rank {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Rank> for String {
    fn from(rank: Rank) -> Self {
        rank.to_string()
    }
}
