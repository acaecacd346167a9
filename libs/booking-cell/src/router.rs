// libs/booking-cell/src/router.rs
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;

use crate::handlers;
use crate::services::batch::{BatchController, BatchNotifier, BatchRegistry, TracingBatchNotifier};

/// Router state: configuration plus the long-lived batch run controller.
/// Runs outlive individual requests, so the controller cannot be rebuilt
/// per request the way the stateless services are.
#[derive(Clone)]
pub struct BookingState {
    pub config: Arc<AppConfig>,
    pub controller: Arc<BatchController>,
}

impl BookingState {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self::with_notifier(config, Arc::new(TracingBatchNotifier))
    }

    pub fn with_notifier(config: Arc<AppConfig>, notifier: Arc<dyn BatchNotifier>) -> Self {
        let registry = BatchRegistry::new();
        let controller = Arc::new(BatchController::new(&config, registry, notifier));
        Self { config, controller }
    }
}

pub fn booking_routes(state: BookingState) -> Router {
    Router::new()
        .route("/", post(handlers::book_slot))
        .route("/batch", post(handlers::start_batch))
        .route("/batch/{run_id}", get(handlers::get_batch))
        .route("/batch/{run_id}/override", post(handlers::confirm_override))
        .route("/batch/{run_id}/retry", post(handlers::retry_batch))
        .route("/batch/{run_id}/skip", post(handlers::skip_batch_item))
        .route("/batch/{run_id}/stop", post(handlers::stop_batch))
        .route("/batch/{run_id}/close", post(handlers::close_batch))
        .with_state(state)
}
