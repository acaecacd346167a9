// libs/scheduling-cell/src/models.rs
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use worklist_cell::Pool;

// ==============================================================================
// SLOT MODELS
// ==============================================================================

/// An offerable time slot from the engine's slot query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub id: Uuid,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub pool: Pool,
    pub provider_id: Uuid,
    pub provider_name: String,
}

/// Slots of one calendar day, in the order the engine returned them.
/// Within-day ordering is trusted from upstream, not re-sorted here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotDayGroup {
    pub day: NaiveDate,
    pub slots: Vec<Slot>,
}

#[derive(Debug, Clone)]
pub struct SlotQuery {
    pub pool: Pool,
    pub duration_minutes: i32,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub provider_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotQueryResponse {
    pub slots: Vec<Slot>,
}

// ==============================================================================
// FORECAST MODELS
// ==============================================================================

/// Aggregate expected demand for one ISO week. Display-only; never used to
/// filter or rank slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekDemand {
    pub iso_year: i32,
    pub iso_week: u32,
    pub expected_bookings: u32,
}

// ==============================================================================
// AD-HOC SLOT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAdhocSlotRequest {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub provider_id: Uuid,
    pub pool: Pool,
    pub duration_minutes: i32,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum SchedulingError {
    /// Field-scoped so the operator's in-progress date/time/provider
    /// selections survive a failed attempt.
    #[error("Invalid {field}: {message}")]
    InvalidField { field: String, message: String },

    #[error("Engine error: {0}")]
    EngineError(String),

    #[error("Malformed engine response: {0}")]
    MalformedResponse(String),
}

impl SchedulingError {
    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        SchedulingError::InvalidField {
            field: field.to_string(),
            message: message.into(),
        }
    }
}
