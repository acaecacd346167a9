// libs/scheduling-cell/src/services/slots.rs
use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use reqwest::Method;
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_database::{EngineClient, EngineError};

use crate::models::{SchedulingError, Slot, SlotDayGroup, SlotQuery, SlotQueryResponse};

pub struct SlotSelectionService {
    engine: Arc<EngineClient>,
}

impl SlotSelectionService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            engine: Arc::new(EngineClient::new(config)),
        }
    }

    pub fn with_engine(engine: Arc<EngineClient>) -> Self {
        Self { engine }
    }

    /// Queries candidate slots and groups them by calendar day, day keys
    /// ascending. Within a day the engine's ordering is kept as-is; that
    /// ordering is an upstream contract, pinned by a contract test rather
    /// than re-verified here.
    pub async fn query_slots(
        &self,
        query: &SlotQuery,
        auth_token: &str,
    ) -> Result<Vec<SlotDayGroup>, SchedulingError> {
        let path = self.build_query_path(query);
        debug!("Querying slots: {}", path);

        let response: SlotQueryResponse = self
            .engine
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(map_engine_error)?;

        let groups = group_by_day(response.slots);

        info!(
            "Slot query returned {} days for pool {}",
            groups.len(),
            query.pool
        );
        Ok(groups)
    }

    fn build_query_path(&self, query: &SlotQuery) -> String {
        let from_str = query.window_start.to_rfc3339();
        let to_str = query.window_end.to_rfc3339();
        let from = urlencoding::encode(&from_str);
        let to = urlencoding::encode(&to_str);

        let mut path = format!(
            "/api/v1/slots?pool={}&duration={}&from={}&to={}",
            query.pool, query.duration_minutes, from, to
        );
        if let Some(provider_id) = query.provider_id {
            path.push_str(&format!("&provider_id={}", provider_id));
        }
        path
    }
}

fn group_by_day(slots: Vec<Slot>) -> Vec<SlotDayGroup> {
    let mut by_day: BTreeMap<NaiveDate, Vec<Slot>> = BTreeMap::new();
    for slot in slots {
        by_day
            .entry(slot.start_time.date_naive())
            .or_default()
            .push(slot);
    }

    by_day
        .into_iter()
        .map(|(day, slots)| SlotDayGroup { day, slots })
        .collect()
}

fn map_engine_error(e: EngineError) -> SchedulingError {
    match e {
        EngineError::Decode(msg) => SchedulingError::MalformedResponse(msg),
        other => SchedulingError::EngineError(other.to_string()),
    }
}
