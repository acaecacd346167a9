// libs/scheduling-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::{DateTime, NaiveDate, Utc};
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::AppError;
use worklist_cell::Pool;

use crate::models::{CreateAdhocSlotRequest, SchedulingError, SlotQuery};
use crate::services::{AdhocSlotService, ForecastService, SlotSelectionService};

#[derive(Debug, Deserialize)]
pub struct SlotQueryParams {
    pub pool: Pool,
    pub duration: i32,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub provider_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ForecastQueryParams {
    pub date: NaiveDate,
}

pub async fn query_slots(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(params): Query<SlotQueryParams>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let query = SlotQuery {
        pool: params.pool,
        duration_minutes: params.duration,
        window_start: params.from,
        window_end: params.to,
        provider_id: params.provider_id,
    };

    let service = SlotSelectionService::new(&state);
    let groups = service
        .query_slots(&query, token)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({ "days": groups })))
}

pub async fn get_week_demand(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(params): Query<ForecastQueryParams>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let service = ForecastService::new(&state);
    let demand = service
        .demand_for_week(params.date, token)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({ "demand": demand })))
}

pub async fn create_adhoc_slot(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<CreateAdhocSlotRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let service = AdhocSlotService::new(&state);
    let slot = service
        .create_adhoc_slot(request, token)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(json!({ "slot": slot })))
}

fn map_scheduling_error(e: SchedulingError) -> AppError {
    match e {
        SchedulingError::InvalidField { field, message } => {
            AppError::FieldValidation { field, message }
        }
        SchedulingError::MalformedResponse(msg) => AppError::ExternalService(msg),
        SchedulingError::EngineError(msg) => AppError::ExternalService(msg),
    }
}
