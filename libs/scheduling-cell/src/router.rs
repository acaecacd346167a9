// libs/scheduling-cell/src/router.rs
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;

use crate::handlers;

pub fn slot_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(handlers::query_slots))
        .route("/", post(handlers::create_adhoc_slot))
        .route("/forecast", get(handlers::get_week_demand))
        .with_state(state)
}
