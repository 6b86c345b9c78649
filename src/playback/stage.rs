//! Reference backend: resolves participants against a live stage and holds
//! each effect for its choreographed duration.
//!
//! The stage is owned by the rendering layer, which mounts and unmounts
//! participants as they appear on screen. Missing targets are soft failures:
//! the effect is skipped and the signal resolves at once.

use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, warn};

use super::{CompletionSignal, PlaybackBackend, PlaybackOutcome};
use crate::error::{Error, Result};
use crate::model::{AnimationEvent, CardType, EntityId, EventKind, Payload};

/// Slowest playback speed the stage backend accepts.
pub const MIN_SPEED: f64 = 0.01;
/// Fastest playback speed the stage backend accepts.
pub const MAX_SPEED: f64 = 100.0;

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct StageInner {
    participants: HashSet<EntityId>,
    center: bool,
}

/// Renderable targets currently on screen. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct Stage {
    inner: Arc<RwLock<StageInner>>,
}

impl Stage {
    /// A stage with the table center mounted and no participants.
    pub fn new() -> Self {
        let stage = Self::default();
        stage.set_center(true);
        stage
    }

    pub fn with_participants<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let stage = Self::new();
        for id in ids {
            stage.mount(id);
        }
        stage
    }

    pub fn mount(&self, id: impl Into<String>) {
        self.write().participants.insert(EntityId::new(id));
    }

    pub fn unmount(&self, id: &EntityId) {
        self.write().participants.remove(id);
    }

    pub fn set_center(&self, mounted: bool) {
        self.write().center = mounted;
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.read().participants.contains(id)
    }

    pub fn has_center(&self) -> bool {
        self.read().center
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, StageInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, StageInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// Choreography
// ---------------------------------------------------------------------------

/// Per-kind effect durations in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Choreography {
    /// Fly to center, hold, fade out.
    pub card_played_ms: u64,
    /// Extra segment when a BANG has a visible target.
    pub bullet_ms: u64,
    /// Shake.
    pub player_damaged_ms: u64,
    /// Fade to grayscale.
    pub player_eliminated_ms: u64,
    pub card_drawn_ms: u64,
    pub card_stolen_ms: u64,
    pub card_discarded_ms: u64,
    /// Face-up hold for a check draw.
    pub card_revealed_ms: u64,
    pub card_passed_ms: u64,
}

impl Default for Choreography {
    fn default() -> Self {
        Self {
            card_played_ms: 900,
            bullet_ms: 300,
            player_damaged_ms: 300,
            player_eliminated_ms: 500,
            card_drawn_ms: 400,
            card_stolen_ms: 500,
            card_discarded_ms: 400,
            card_revealed_ms: 800,
            card_passed_ms: 500,
        }
    }
}

impl Choreography {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| Error::Choreography(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
            .map_err(|e| Error::Choreography(format!("{}: {e}", path.display())))
    }

    /// Base duration for a kind. Zero for kinds with no visual.
    pub fn duration(&self, kind: EventKind) -> Duration {
        let ms = match kind {
            EventKind::CardPlayed => self.card_played_ms,
            EventKind::PlayerDamaged => self.player_damaged_ms,
            EventKind::PlayerEliminated => self.player_eliminated_ms,
            EventKind::CardDrawn => self.card_drawn_ms,
            EventKind::CardStolen => self.card_stolen_ms,
            EventKind::CardDiscarded => self.card_discarded_ms,
            EventKind::CardRevealed => self.card_revealed_ms,
            EventKind::CardPassed => self.card_passed_ms,
            EventKind::StateApply | EventKind::Unknown => 0,
        };
        Duration::from_millis(ms)
    }
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

/// Plays effects against a [`Stage`], holding each for its duration.
#[derive(Debug, Clone)]
pub struct StageBackend {
    stage: Stage,
    choreography: Choreography,
    speed: f64,
}

impl StageBackend {
    pub fn new(stage: Stage, choreography: Choreography) -> Self {
        Self {
            stage,
            choreography,
            speed: 1.0,
        }
    }

    /// Playback speed multiplier, clamped to [`MIN_SPEED`]..=[`MAX_SPEED`].
    /// Non-positive and non-finite values are ignored.
    pub fn speed(mut self, speed: f64) -> Self {
        if speed.is_finite() && speed > 0.0 {
            self.speed = speed.clamp(MIN_SPEED, MAX_SPEED);
        }
        self
    }

    pub fn current_speed(&self) -> f64 {
        self.speed
    }

    /// `duration` at the configured speed. Saturates instead of overflowing.
    fn scaled(&self, duration: Duration) -> Duration {
        Duration::try_from_secs_f64(duration.as_secs_f64() / self.speed).unwrap_or(Duration::MAX)
    }

    /// Resolve the targets an event needs and compute how long it plays.
    fn plan(&self, event: &AnimationEvent) -> std::result::Result<Duration, String> {
        let kind = event.kind();
        let base = self.choreography.duration(kind);

        match &event.payload {
            Payload::CardPlayed { card_type, .. } => {
                self.require(event.source.as_ref(), "source")?;
                self.require_center()?;
                let bullet = *card_type == Some(CardType::Bang)
                    && event.target.as_ref().is_some_and(|t| self.stage.contains(t));
                if bullet {
                    Ok(base.saturating_add(Duration::from_millis(self.choreography.bullet_ms)))
                } else {
                    Ok(base)
                }
            }
            Payload::PlayerDamaged { .. } | Payload::PlayerEliminated { .. } => {
                self.require(event.target.as_ref(), "target")?;
                Ok(base)
            }
            Payload::CardDrawn { .. } | Payload::CardDiscarded { .. } => {
                self.require(event.target.as_ref().or(event.source.as_ref()), "participant")?;
                Ok(base)
            }
            Payload::CardStolen { .. } | Payload::CardPassed { .. } => {
                self.require(event.source.as_ref(), "source")?;
                self.require(event.target.as_ref(), "target")?;
                Ok(base)
            }
            Payload::CardRevealed { .. } => {
                self.require_center()?;
                Ok(base)
            }
            Payload::StateApply(_) | Payload::Unknown { .. } => Ok(Duration::ZERO),
        }
    }

    fn require(&self, id: Option<&EntityId>, role: &str) -> std::result::Result<(), String> {
        match id {
            Some(id) if self.stage.contains(id) => Ok(()),
            Some(id) => Err(format!("{role} {id} not on stage")),
            None => Err(format!("event has no {role}")),
        }
    }

    fn require_center(&self) -> std::result::Result<(), String> {
        if self.stage.has_center() {
            Ok(())
        } else {
            Err("table center not mounted".to_string())
        }
    }
}

impl PlaybackBackend for StageBackend {
    fn play(&self, event: &AnimationEvent) -> CompletionSignal {
        let kind = event.kind();
        if matches!(kind, EventKind::StateApply | EventKind::Unknown) {
            return CompletionSignal::ready(PlaybackOutcome::Ignored);
        }

        match self.plan(event) {
            Ok(duration) => {
                let duration = self.scaled(duration);
                let shown = face(&event.payload);
                debug!(
                    event_id = %event.id,
                    %kind,
                    face = shown.as_deref().unwrap_or("-"),
                    duration_ms = duration.as_millis() as u64,
                    "playing effect"
                );
                CompletionSignal::from_future(async move {
                    tokio::time::sleep(duration).await;
                    PlaybackOutcome::Played
                })
            }
            Err(reason) => {
                warn!(event_id = %event.id, %kind, %reason, "render target missing, skipping effect");
                CompletionSignal::ready(PlaybackOutcome::Skipped { reason })
            }
        }
    }
}

/// What the floating card shows, for logs: `"CAT BALOU"`, `"Q♥ (red)"`.
fn face(payload: &Payload) -> Option<String> {
    match payload {
        Payload::CardPlayed { card_type, label } => {
            let stays = card_type.is_some_and(CardType::is_blue);
            Some(if stays {
                format!("{label} (stays in play)")
            } else {
                label.clone()
            })
        }
        Payload::CardRevealed {
            suit: Some(suit),
            rank: Some(rank),
        } => {
            let color = if suit.is_red() { "red" } else { "black" };
            Some(format!("{rank}{} ({color})", suit.symbol()))
        }
        _ => None,
    }
}
