// libs/worklist-cell/src/models.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// CORE WORKLIST MODELS
// ==============================================================================

/// Unique key of a pending step within one worklist fetch:
/// (patient, episode, step).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorklistKey {
    pub patient_id: Uuid,
    pub episode_id: Option<Uuid>,
    pub step_code: String,
}

impl fmt::Display for WorklistKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.episode_id {
            Some(episode) => write!(f, "{}/{}/{}", self.patient_id, episode, self.step_code),
            None => write!(f, "{}/-/{}", self.patient_id, self.step_code),
        }
    }
}

/// Categorical bucket matching a step to compatible slot types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pool {
    Work,
    Consult,
    Control,
}

impl fmt::Display for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pool::Work => write!(f, "work"),
            Pool::Consult => write!(f, "consult"),
            Pool::Control => write!(f, "control"),
        }
    }
}

/// Server-reported unmet precondition keeping a step from being bookable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockingInfo {
    pub code: String,
    pub reason: String,
    pub remedy: Option<String>,
}

impl BlockingInfo {
    /// Blocking code emitted when the episode has no treatment pathway yet;
    /// the remedy is the pathway-assignment mutation.
    pub const NO_PATHWAY: &'static str = "no_pathway";

    pub fn is_missing_pathway(&self) -> bool {
        self.code == Self::NO_PATHWAY
    }
}

/// Forecast figures carried for display on the worklist row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepForecast {
    pub p50_completion: Option<NaiveDate>,
    pub p80_completion: Option<NaiveDate>,
    pub remaining_visits_p50: Option<i32>,
    pub remaining_visits_p80: Option<i32>,
}

/// The appointment the server already holds for this step, if any.
/// Only future appointments are carried; past ones are dropped at fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookedAppointment {
    pub appointment_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub provider_id: Uuid,
    pub provider_name: String,
}

/// A pending next clinical step owed to one patient's episode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorklistItem {
    pub patient_id: Uuid,
    pub episode_id: Option<Uuid>,
    pub patient_name: String,
    pub stage: String,
    pub next_step_label: String,
    pub step_code: String,
    pub step_sequence: i32,
    pub pool: Pool,
    pub duration_minutes: i32,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub overdue_by_days: i64,
    pub blocking: Option<BlockingInfo>,
    pub requires_precommit: bool,
    pub forecast: Option<StepForecast>,
    pub booked_appointment: Option<BookedAppointment>,
}

impl WorklistItem {
    pub fn key(&self) -> WorklistKey {
        WorklistKey {
            patient_id: self.patient_id,
            episode_id: self.episode_id,
            step_code: self.step_code.clone(),
        }
    }

    pub fn is_overdue(&self) -> bool {
        self.overdue_by_days > 0
    }
}

// ==============================================================================
// WIRE MODELS
// ==============================================================================

/// Raw record as returned by the engine's worklist fetch. Overdue-day counts
/// are not on the wire; they are computed from the envelope's server
/// timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorklistRecord {
    pub patient_id: Uuid,
    pub episode_id: Option<Uuid>,
    pub patient_name: String,
    pub stage: String,
    pub next_step_label: String,
    pub step_code: String,
    pub step_sequence: i32,
    pub pool: Pool,
    pub duration_minutes: i32,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub blocking: Option<BlockingInfo>,
    #[serde(default)]
    pub requires_precommit: bool,
    pub forecast: Option<StepForecast>,
    pub booked_appointment: Option<BookedAppointment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorklistFetchResponse {
    pub server_time: DateTime<Utc>,
    pub items: Vec<WorklistRecord>,
}

impl WorklistItem {
    /// Builds an item from a wire record, computing the overdue-day count
    /// against the server timestamp and dropping stale booked appointments.
    pub fn from_record(record: WorklistRecord, server_time: DateTime<Utc>) -> Self {
        let overdue_by_days = (server_time.date_naive() - record.window_end.date_naive())
            .num_days()
            .max(0);

        let booked_appointment = record
            .booked_appointment
            .filter(|appt| appt.start_time > server_time);

        Self {
            patient_id: record.patient_id,
            episode_id: record.episode_id,
            patient_name: record.patient_name,
            stage: record.stage,
            next_step_label: record.next_step_label,
            step_code: record.step_code,
            step_sequence: record.step_sequence,
            pool: record.pool,
            duration_minutes: record.duration_minutes,
            window_start: record.window_start,
            window_end: record.window_end,
            overdue_by_days,
            blocking: record.blocking,
            requires_precommit: record.requires_precommit,
            forecast: record.forecast,
            booked_appointment,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathwayAssignment {
    pub patient_id: Uuid,
    pub episode_id: Option<Uuid>,
    pub pathway_id: Uuid,
    pub assigned_at: DateTime<Utc>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum WorklistError {
    #[error("Worklist item not found")]
    NotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Engine error: {0}")]
    EngineError(String),

    #[error("Malformed engine response: {0}")]
    MalformedResponse(String),
}
