// libs/worklist-cell/src/services/fetch.rs
use std::sync::Arc;

use reqwest::Method;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{EngineClient, EngineError};

use crate::models::{
    PathwayAssignment, WorklistError, WorklistFetchResponse, WorklistItem,
};

pub struct WorklistService {
    engine: Arc<EngineClient>,
}

impl WorklistService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            engine: Arc::new(EngineClient::new(config)),
        }
    }

    pub fn with_engine(engine: Arc<EngineClient>) -> Self {
        Self { engine }
    }

    /// Fetches pending next steps, optionally scoped to one patient.
    /// Overdue-day counts are computed against the server timestamp in the
    /// response envelope, not the local clock.
    pub async fn fetch_worklist(
        &self,
        patient_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Vec<WorklistItem>, WorklistError> {
        let path = match patient_id {
            Some(id) => format!("/api/v1/worklist?patient_id={}", id),
            None => "/api/v1/worklist".to_string(),
        };
        debug!("Fetching worklist: {}", path);

        let response: WorklistFetchResponse = self
            .engine
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(map_engine_error)?;

        let server_time = response.server_time;
        let items: Vec<WorklistItem> = response
            .items
            .into_iter()
            .map(|record| WorklistItem::from_record(record, server_time))
            .collect();

        self.check_key_uniqueness(&items);

        info!("Fetched {} worklist items (server time {})", items.len(), server_time);
        Ok(items)
    }

    /// Assigns a treatment pathway to an episode. Invoked for items blocked
    /// with the `no_pathway` code; afterwards a refetch shows the row READY.
    pub async fn assign_pathway(
        &self,
        patient_id: Uuid,
        episode_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<PathwayAssignment, WorklistError> {
        debug!("Assigning pathway for patient {}", patient_id);

        let path = format!("/api/v1/patients/{}/pathway", patient_id);
        let body = json!({ "episode_id": episode_id });

        let assignment: PathwayAssignment = self
            .engine
            .request(Method::POST, &path, Some(auth_token), Some(body))
            .await
            .map_err(map_engine_error)?;

        info!(
            "Pathway {} assigned to patient {}",
            assignment.pathway_id, assignment.patient_id
        );
        Ok(assignment)
    }

    // Keys are unique per fetch by contract; a duplicate is an upstream bug
    // worth surfacing in the logs without failing the fetch.
    fn check_key_uniqueness(&self, items: &[WorklistItem]) {
        let mut seen = std::collections::BTreeSet::new();
        for item in items {
            if !seen.insert(item.key()) {
                warn!("Duplicate worklist key in fetch: {}", item.key());
            }
        }
    }
}

fn map_engine_error(e: EngineError) -> WorklistError {
    match e {
        EngineError::Decode(msg) => WorklistError::MalformedResponse(msg),
        EngineError::Api { status: 404, .. } => WorklistError::NotFound,
        other => WorklistError::EngineError(other.to_string()),
    }
}
