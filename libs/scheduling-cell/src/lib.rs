pub mod models;
pub mod services;
pub mod handlers;
pub mod router;

pub use models::*;
pub use services::{AdhocSlotService, ForecastService, SlotSelectionService};
pub use router::slot_routes;
