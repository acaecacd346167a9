// libs/worklist-cell/src/router.rs
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;

use crate::handlers;

pub fn worklist_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(handlers::get_worklist))
        .route("/{patient_id}/pathway", post(handlers::assign_pathway))
        .with_state(state)
}
