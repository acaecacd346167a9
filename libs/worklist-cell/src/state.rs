// libs/worklist-cell/src/state.rs
//
// Row state derivation and worklist ordering. Both are pure: the local
// overlay is passed in as a value, never read from ambient state.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::models::{WorklistItem, WorklistKey};

/// Session-scoped overlay over the fetched worklist. Never persisted; a full
/// refetch starts from an empty overlay.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorklistLocalState {
    pub in_flight: BTreeSet<WorklistKey>,
    pub needs_review: BTreeSet<WorklistKey>,
}

impl WorklistLocalState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Display/action state of one worklist row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowState {
    Booked,
    BookingInProgress,
    NeedsReview,
    Blocked,
    Ready,
}

impl RowState {
    /// Only READY rows may be selected into a batch run.
    pub fn is_batch_eligible(&self) -> bool {
        matches!(self, RowState::Ready)
    }
}

/// Derives the row state for an item. First match wins:
/// booked, in progress, needs review, blocked, ready.
pub fn derive_state(item: &WorklistItem, overlay: &WorklistLocalState) -> RowState {
    let key = item.key();

    if item.booked_appointment.is_some() {
        RowState::Booked
    } else if overlay.in_flight.contains(&key) {
        RowState::BookingInProgress
    } else if overlay.needs_review.contains(&key) {
        RowState::NeedsReview
    } else if item.blocking.is_some() {
        RowState::Blocked
    } else {
        RowState::Ready
    }
}

fn sort_rank(item: &WorklistItem, overlay: &WorklistLocalState) -> u8 {
    match derive_state(item, overlay) {
        RowState::Ready if item.is_overdue() => 0,
        RowState::Ready => 1,
        RowState::Blocked => 2,
        _ => 3,
    }
}

/// Orders the worklist for display and selection: overdue READY first, then
/// READY, then BLOCKED, then the rest; soonest booking-window deadline next,
/// then patient name, with the item key as a deterministic final tiebreak.
pub fn sort_worklist(items: &mut [WorklistItem], overlay: &WorklistLocalState) {
    items.sort_by_key(|item| {
        (
            sort_rank(item, overlay),
            item.window_end,
            item.patient_name.clone(),
            item.key(),
        )
    });
}

/// Shared handle to the overlay. Mutated only by the batch controller and the
/// negotiation protocol; everyone else takes a snapshot.
#[derive(Debug, Clone, Default)]
pub struct SharedOverlay {
    inner: Arc<Mutex<WorklistLocalState>>,
}

impl SharedOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, WorklistLocalState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn mark_in_flight(&self, key: &WorklistKey) {
        self.lock().in_flight.insert(key.clone());
    }

    pub fn clear_in_flight(&self, key: &WorklistKey) {
        self.lock().in_flight.remove(key);
    }

    pub fn mark_needs_review(&self, key: &WorklistKey) {
        self.lock().needs_review.insert(key.clone());
    }

    pub fn clear_needs_review(&self, key: &WorklistKey) {
        self.lock().needs_review.remove(key);
    }

    pub fn is_in_flight(&self, key: &WorklistKey) -> bool {
        self.lock().in_flight.contains(key)
    }

    pub fn snapshot(&self) -> WorklistLocalState {
        self.lock().clone()
    }

    /// Reset on every full refetch.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.in_flight.clear();
        state.needs_review.clear();
    }
}
