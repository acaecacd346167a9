// libs/worklist-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::AppError;

use crate::models::{WorklistError, WorklistItem};
use crate::services::WorklistService;
use crate::state::{derive_state, sort_worklist, RowState, WorklistLocalState};

#[derive(Debug, Deserialize)]
pub struct WorklistQueryParams {
    pub patient_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct AssignPathwayRequest {
    pub episode_id: Option<Uuid>,
}

#[derive(Debug, serde::Serialize)]
pub struct WorklistRowView {
    #[serde(flatten)]
    pub item: WorklistItem,
    pub state: RowState,
}

/// Returns the worklist in display order with derived row states. A fetch is
/// a full refresh, so derivation runs against an empty overlay.
pub async fn get_worklist(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(params): Query<WorklistQueryParams>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let service = WorklistService::new(&state);
    let mut items = service
        .fetch_worklist(params.patient_id, token)
        .await
        .map_err(map_worklist_error)?;

    let overlay = WorklistLocalState::new();
    sort_worklist(&mut items, &overlay);

    let rows: Vec<WorklistRowView> = items
        .into_iter()
        .map(|item| {
            let state = derive_state(&item, &overlay);
            WorklistRowView { item, state }
        })
        .collect();

    Ok(Json(json!({ "items": rows })))
}

/// Remedy path for rows blocked with the `no_pathway` code.
pub async fn assign_pathway(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(patient_id): Path<Uuid>,
    Json(request): Json<AssignPathwayRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let service = WorklistService::new(&state);
    let assignment = service
        .assign_pathway(patient_id, request.episode_id, token)
        .await
        .map_err(map_worklist_error)?;

    Ok(Json(json!({ "assignment": assignment })))
}

fn map_worklist_error(e: WorklistError) -> AppError {
    match e {
        WorklistError::NotFound => AppError::NotFound("Worklist item not found".to_string()),
        WorklistError::ValidationError(msg) => AppError::BadRequest(msg),
        WorklistError::MalformedResponse(msg) => AppError::ExternalService(msg),
        WorklistError::EngineError(msg) => AppError::ExternalService(msg),
    }
}
