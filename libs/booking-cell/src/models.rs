// libs/booking-cell/src/models.rs
use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use worklist_cell::{BookedAppointment, Pool, WorklistKey};

use crate::error::BookingError;

/// Machine-readable conflict codes on the engine's booking mutation.
pub mod conflict_codes {
    /// A concurrent actor claimed the slot first.
    pub const SLOT_TAKEN: &str = "slot_taken";
    /// The episode already holds a future hard-next appointment.
    pub const HARD_NEXT_VIOLATION: &str = "hard_next_violation";
}

// ==============================================================================
// BOOKING ATTEMPT MODELS
// ==============================================================================

/// One booking attempt: which step, against which slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingAttempt {
    pub patient_id: Uuid,
    pub episode_id: Option<Uuid>,
    pub step_code: String,
    pub pool: Pool,
    pub slot_id: Uuid,
}

impl BookingAttempt {
    pub fn key(&self) -> WorklistKey {
        WorklistKey {
            patient_id: self.patient_id,
            episode_id: self.episode_id,
            step_code: self.step_code.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingConfirmation {
    pub appointment_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub provider_id: Uuid,
    pub provider_name: String,
}

/// Hint from the engine about where the step was expected to land.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Detail of a rejected attempt against the hard-next invariant: the
/// appointment the episode already holds, plus the expected-window hint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardNextConflict {
    pub existing_appointment: BookedAppointment,
    pub expected_window: Option<ExpectedWindow>,
}

/// Outcome of one booking attempt. Exactly four branches; callers must
/// handle each one.
#[derive(Debug, Clone)]
pub enum BookingOutcome {
    Success { confirmation: BookingConfirmation },
    SlotTaken,
    NeedsOverride { conflict: HardNextConflict },
    Fatal { message: String, retryable: bool },
}

// ==============================================================================
// OVERRIDE MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideCategory {
    PatientPreference,
    Clinical,
    Capacity,
    Urgent,
    Other,
}

impl fmt::Display for OverrideCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverrideCategory::PatientPreference => write!(f, "patient_preference"),
            OverrideCategory::Clinical => write!(f, "clinical"),
            OverrideCategory::Capacity => write!(f, "capacity"),
            OverrideCategory::Urgent => write!(f, "urgent"),
            OverrideCategory::Other => write!(f, "other"),
        }
    }
}

/// Operator-supplied justification for booking past a hard-next conflict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverridePayload {
    pub category: OverrideCategory,
    pub justification: String,
}

impl OverridePayload {
    pub const MIN_JUSTIFICATION_CHARS: usize = 10;

    /// Gate before any retry attempt: a category must be selected and the
    /// justification must carry at least ten characters of substance.
    pub fn validate(&self) -> Result<(), BookingError> {
        if self.justification.trim().chars().count() < Self::MIN_JUSTIFICATION_CHARS {
            return Err(BookingError::JustificationTooShort {
                min: Self::MIN_JUSTIFICATION_CHARS,
            });
        }
        Ok(())
    }

    /// Combined record transmitted on the override retry.
    pub fn wire_format(&self) -> String {
        format!("[{}] {}", self.category, self.justification.trim())
    }
}

// ==============================================================================
// BATCH RUN MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Running,
    Paused,
    Completed,
    Aborted,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Aborted)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => write!(f, "idle"),
            RunState::Running => write!(f, "running"),
            RunState::Paused => write!(f, "paused"),
            RunState::Completed => write!(f, "completed"),
            RunState::Aborted => write!(f, "aborted"),
        }
    }
}

/// Why a run is paused: a single item awaiting the override sub-flow, or a
/// run-level failure exposing Retry / Skip / Stop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PauseReason {
    OverrideRequired {
        key: WorklistKey,
        slot_id: Uuid,
        conflict: HardNextConflict,
    },
    Failure {
        message: String,
        retryable: bool,
    },
}

/// Final partition of a terminated run. Fired exactly once, and the only
/// channel by which the run's outcome reaches the rest of the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub run_id: Uuid,
    pub booked_keys: BTreeSet<WorklistKey>,
    pub skipped_keys: BTreeSet<WorklistKey>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRunSnapshot {
    pub run_id: Uuid,
    pub state: RunState,
    pub cursor: usize,
    pub total_items: usize,
    pub booked_keys: BTreeSet<WorklistKey>,
    pub skipped_keys: BTreeSet<WorklistKey>,
    pub pause: Option<PauseReason>,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookSlotRequest {
    pub patient_id: Uuid,
    pub episode_id: Option<Uuid>,
    pub step_code: String,
    pub pool: Pool,
    pub slot_id: Uuid,
    #[serde(rename = "override")]
    pub override_payload: Option<OverridePayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartBatchRequest {
    pub keys: Vec<WorklistKey>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmOverrideRequest {
    pub category: OverrideCategory,
    pub justification: String,
}
