// libs/scheduling-cell/src/services/adhoc.rs
use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde_json::json;
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_database::{EngineClient, EngineError};

use crate::models::{CreateAdhocSlotRequest, SchedulingError, Slot};

/// Ad-hoc slot creation. The created slot's id feeds into the same booking
/// path as a pre-existing slot; downstream code cannot tell the two apart.
pub struct AdhocSlotService {
    engine: Arc<EngineClient>,
}

impl AdhocSlotService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            engine: Arc::new(EngineClient::new(config)),
        }
    }

    pub fn with_engine(engine: Arc<EngineClient>) -> Self {
        Self { engine }
    }

    pub async fn create_adhoc_slot(
        &self,
        request: CreateAdhocSlotRequest,
        auth_token: &str,
    ) -> Result<Slot, SchedulingError> {
        let start = request
            .date
            .and_time(request.time)
            .and_utc();

        validate_start(start, Utc::now())?;
        validate_duration(request.duration_minutes)?;

        debug!(
            "Creating ad-hoc slot at {} for provider {}",
            start, request.provider_id
        );

        let body = json!({
            "start_time": start,
            "provider_id": request.provider_id,
            "pool": request.pool,
            "duration_minutes": request.duration_minutes,
        });

        let slot: Slot = self
            .engine
            .request(Method::POST, "/api/v1/slots", Some(auth_token), Some(body))
            .await
            .map_err(|e| match e {
                EngineError::Decode(msg) => SchedulingError::MalformedResponse(msg),
                other => SchedulingError::EngineError(other.to_string()),
            })?;

        info!("Ad-hoc slot {} created at {}", slot.id, slot.start_time);
        Ok(slot)
    }
}

/// Any start not strictly in the future is rejected, scoped to the time
/// field so the operator's selections survive the failed attempt.
pub fn validate_start(start: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), SchedulingError> {
    if start <= now {
        return Err(SchedulingError::invalid_field(
            "time",
            "Slot start must be in the future",
        ));
    }
    Ok(())
}

pub fn validate_duration(duration_minutes: i32) -> Result<(), SchedulingError> {
    if duration_minutes <= 0 {
        return Err(SchedulingError::invalid_field(
            "duration_minutes",
            "Duration must be positive",
        ));
    }
    Ok(())
}
