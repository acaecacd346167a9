// libs/booking-cell/src/services/negotiation.rs
//
// Classifies one booking attempt against the engine into the four protocol
// branches. Negotiable rejections (slot taken, hard-next violation) are
// outcomes, not errors.

use std::sync::Arc;

use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use shared_config::AppConfig;
use shared_database::{EngineClient, EngineError};
use worklist_cell::{SharedOverlay, WorklistKey};

use crate::models::{
    conflict_codes, BookingAttempt, BookingConfirmation, BookingOutcome, HardNextConflict,
    OverridePayload,
};

pub struct BookingNegotiationService {
    engine: Arc<EngineClient>,
}

/// Clears the key's in-flight marker when dropped, so the marker cannot
/// stick regardless of which branch (or unwind) leaves the attempt.
struct InFlightGuard<'a> {
    overlay: &'a SharedOverlay,
    key: &'a WorklistKey,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.overlay.clear_in_flight(self.key);
    }
}

impl BookingNegotiationService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            engine: Arc::new(EngineClient::new(config)),
        }
    }

    pub fn with_engine(engine: Arc<EngineClient>) -> Self {
        Self { engine }
    }

    /// Attempts to book `attempt.slot_id` for the step. The key's in-flight
    /// marker is set before the engine call and cleared on every exit path.
    pub async fn attempt_booking(
        &self,
        attempt: &BookingAttempt,
        override_payload: Option<&OverridePayload>,
        overlay: &SharedOverlay,
        auth_token: &str,
    ) -> BookingOutcome {
        let key = attempt.key();
        overlay.mark_in_flight(&key);
        let _guard = InFlightGuard {
            overlay,
            key: &key,
        };

        if let Some(payload) = override_payload {
            if let Err(e) = payload.validate() {
                // Gated upstream; reaching here is a caller bug, and no
                // request is issued for an invalid override.
                return BookingOutcome::Fatal {
                    message: e.to_string(),
                    retryable: false,
                };
            }
        }

        debug!("Attempting booking for {} into slot {}", key, attempt.slot_id);

        let body = json!({
            "patient_id": attempt.patient_id,
            "episode_id": attempt.episode_id,
            "slot_id": attempt.slot_id,
            "pool": attempt.pool,
            "step_code": attempt.step_code,
            "override_reason": override_payload.map(OverridePayload::wire_format),
        });

        let result: Result<BookingConfirmation, EngineError> = self
            .engine
            .request(Method::POST, "/api/v1/bookings", Some(auth_token), Some(body))
            .await;

        match result {
            Ok(confirmation) => {
                overlay.clear_needs_review(&key);
                info!(
                    "Booked {} into appointment {}",
                    key, confirmation.appointment_id
                );
                BookingOutcome::Success { confirmation }
            }
            Err(EngineError::Conflict { code, .. }) if code == conflict_codes::SLOT_TAKEN => {
                warn!("Slot {} already claimed, {} stays pending", attempt.slot_id, key);
                BookingOutcome::SlotTaken
            }
            Err(EngineError::Conflict { code, detail })
                if code == conflict_codes::HARD_NEXT_VIOLATION =>
            {
                match parse_hard_next_conflict(&detail) {
                    Some(conflict) => {
                        overlay.mark_needs_review(&key);
                        warn!("Hard-next violation for {}, operator override required", key);
                        BookingOutcome::NeedsOverride { conflict }
                    }
                    None => BookingOutcome::Fatal {
                        message: "Malformed hard-next conflict detail from engine".to_string(),
                        retryable: false,
                    },
                }
            }
            Err(EngineError::Conflict { code, .. }) => BookingOutcome::Fatal {
                message: format!("Unknown engine conflict code: {}", code),
                retryable: false,
            },
            Err(e) => {
                let retryable = e.is_retryable();
                BookingOutcome::Fatal {
                    message: e.to_string(),
                    retryable,
                }
            }
        }
    }
}

fn parse_hard_next_conflict(detail: &Value) -> Option<HardNextConflict> {
    let conflict = detail.get("conflict")?;
    serde_json::from_value(conflict.clone()).ok()
}
