// libs/booking-cell/src/handlers.rs
use axum::{
    extract::{Path, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use tracing::error;
use uuid::Uuid;

use shared_models::AppError;
use worklist_cell::SharedOverlay;

use crate::error::BookingError;
use crate::models::{
    BookSlotRequest, BookingAttempt, BookingOutcome, ConfirmOverrideRequest, OverridePayload,
    StartBatchRequest,
};
use crate::router::BookingState;
use crate::services::negotiation::BookingNegotiationService;

// ==============================================================================
// SINGLE-ITEM BOOKING
// ==============================================================================

/// Books one step into one slot, independent of any batch run. Negotiable
/// rejections come back as tagged outcomes, not errors.
pub async fn book_slot(
    State(state): State<BookingState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<BookSlotRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if let Some(payload) = &request.override_payload {
        payload.validate().map_err(map_booking_error)?;
    }

    let attempt = BookingAttempt {
        patient_id: request.patient_id,
        episode_id: request.episode_id,
        step_code: request.step_code.clone(),
        pool: request.pool,
        slot_id: request.slot_id,
    };

    let service = BookingNegotiationService::new(&state.config);
    let overlay = SharedOverlay::new();
    let outcome = service
        .attempt_booking(&attempt, request.override_payload.as_ref(), &overlay, token)
        .await;

    match outcome {
        BookingOutcome::Success { confirmation } => Ok(Json(json!({
            "outcome": "booked",
            "confirmation": confirmation,
        }))),
        BookingOutcome::SlotTaken => Ok(Json(json!({
            "outcome": "slot_taken",
        }))),
        BookingOutcome::NeedsOverride { conflict } => Ok(Json(json!({
            "outcome": "needs_override",
            "conflict": conflict,
        }))),
        BookingOutcome::Fatal { message, retryable } => {
            error!("Booking attempt failed: {}", message);
            if retryable {
                Err(AppError::ExternalService(message))
            } else {
                Err(AppError::BadRequest(message))
            }
        }
    }
}

// ==============================================================================
// BATCH RUN LIFECYCLE
// ==============================================================================

/// Starts a run over the selected worklist keys and drives it in the
/// background; progress is polled via the snapshot endpoint.
pub async fn start_batch(
    State(state): State<BookingState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<StartBatchRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token().to_string();

    let run_id = state
        .controller
        .start_batch(request.keys, &token)
        .await
        .map_err(map_booking_error)?;

    let controller = state.controller.clone();
    tokio::spawn(async move {
        if let Err(e) = controller.drive(run_id, &token).await {
            error!("Batch run {} driver failed: {}", run_id, e);
        }
    });

    Ok(Json(json!({ "run_id": run_id })))
}

pub async fn get_batch(
    State(state): State<BookingState>,
    Path(run_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let snapshot = state
        .controller
        .snapshot(run_id)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({ "run": snapshot })))
}

/// Confirms the override for the item the run paused on; returns once the
/// run next pauses or finishes.
pub async fn confirm_override(
    State(state): State<BookingState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(run_id): Path<Uuid>,
    Json(request): Json<ConfirmOverrideRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let payload = OverridePayload {
        category: request.category,
        justification: request.justification,
    };

    state
        .controller
        .confirm_override(run_id, payload, token)
        .await
        .map_err(map_booking_error)?;

    let snapshot = state
        .controller
        .snapshot(run_id)
        .await
        .map_err(map_booking_error)?;
    Ok(Json(json!({ "run": snapshot })))
}

pub async fn retry_batch(
    State(state): State<BookingState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(run_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    state
        .controller
        .retry(run_id, auth.token())
        .await
        .map_err(map_booking_error)?;

    let snapshot = state
        .controller
        .snapshot(run_id)
        .await
        .map_err(map_booking_error)?;
    Ok(Json(json!({ "run": snapshot })))
}

pub async fn skip_batch_item(
    State(state): State<BookingState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(run_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    state
        .controller
        .skip(run_id, auth.token())
        .await
        .map_err(map_booking_error)?;

    let snapshot = state
        .controller
        .snapshot(run_id)
        .await
        .map_err(map_booking_error)?;
    Ok(Json(json!({ "run": snapshot })))
}

pub async fn stop_batch(
    State(state): State<BookingState>,
    Path(run_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    state
        .controller
        .stop(run_id)
        .await
        .map_err(map_booking_error)?;

    let snapshot = state
        .controller
        .snapshot(run_id)
        .await
        .map_err(map_booking_error)?;
    Ok(Json(json!({ "run": snapshot })))
}

pub async fn close_batch(
    State(state): State<BookingState>,
    Path(run_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    state
        .controller
        .close(run_id)
        .await
        .map_err(map_booking_error)?;

    let snapshot = state
        .controller
        .snapshot(run_id)
        .await
        .map_err(map_booking_error)?;
    Ok(Json(json!({ "run": snapshot })))
}

fn map_booking_error(e: BookingError) -> AppError {
    match e {
        BookingError::ValidationError(msg) => AppError::BadRequest(msg),
        BookingError::JustificationTooShort { .. } => AppError::FieldValidation {
            field: "justification".to_string(),
            message: e.to_string(),
        },
        BookingError::RunNotFound(run_id) => {
            AppError::NotFound(format!("Batch run {} not found", run_id))
        }
        BookingError::InvalidRunTransition { .. } => AppError::Conflict(e.to_string()),
        BookingError::ItemNotEligible(msg) => AppError::BadRequest(msg),
        BookingError::MissingIdentifier(msg) => AppError::BadRequest(msg),
        BookingError::EngineError(msg) => AppError::ExternalService(msg),
    }
}
