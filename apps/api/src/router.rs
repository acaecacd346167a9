use std::sync::Arc;

use axum::{routing::get, Router};

use booking_cell::{booking_routes, BookingState};
use scheduling_cell::slot_routes;
use shared_config::AppConfig;
use worklist_cell::worklist_routes;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    let booking_state = BookingState::new(state.clone());

    Router::new()
        .route("/", get(|| async { "Clinic worklist API is running!" }))
        .nest("/worklist", worklist_routes(state.clone()))
        .nest("/slots", slot_routes(state.clone()))
        .nest("/bookings", booking_routes(booking_state))
}
