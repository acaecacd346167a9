pub mod models;
pub mod services;
pub mod state;
pub mod handlers;
pub mod router;

pub use models::*;
pub use state::{derive_state, sort_worklist, RowState, SharedOverlay, WorklistLocalState};
pub use router::worklist_routes;
