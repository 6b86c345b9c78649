//! Cards currently being depicted by an active effect.
//!
//! The rendering layer consults this to hide a card's resting presentation
//! while a floating proxy animates it elsewhere. Only the drain worker adds
//! and removes entries; everyone else gets a read-only view.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::model::CardId;

#[derive(Debug, Clone, Default)]
pub struct InFlightTracker {
    cards: Arc<Mutex<HashSet<CardId>>>,
}

impl InFlightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, card: &CardId) -> bool {
        self.lock().contains(card)
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Sorted copy of the current set.
    pub fn snapshot(&self) -> Vec<CardId> {
        let mut cards: Vec<_> = self.lock().iter().cloned().collect();
        cards.sort();
        cards
    }

    /// Mark `card` in flight until the returned guard drops.
    pub(crate) fn mark(&self, card: CardId) -> InFlightGuard {
        self.lock().insert(card.clone());
        InFlightGuard {
            tracker: self.clone(),
            card,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<CardId>> {
        self.cards.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears an in-flight mark on drop, whatever way playback ended.
#[derive(Debug)]
pub(crate) struct InFlightGuard {
    tracker: InFlightTracker,
    card: CardId,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.tracker.lock().remove(&self.card);
    }
}
