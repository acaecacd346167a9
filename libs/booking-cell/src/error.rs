use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum BookingError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Override justification must be at least {min} characters")]
    JustificationTooShort { min: usize },

    #[error("Batch run not found: {0}")]
    RunNotFound(Uuid),

    #[error("Invalid run state transition from {from} to {to}")]
    InvalidRunTransition { from: String, to: String },

    #[error("Item not eligible for batch booking: {0}")]
    ItemNotEligible(String),

    #[error("Missing identifier: {0}")]
    MissingIdentifier(String),

    #[error("Engine error: {0}")]
    EngineError(String),
}
