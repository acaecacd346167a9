pub mod models;
pub mod services;
pub mod error;
pub mod handlers;
pub mod router;

pub use models::*;
pub use error::*;
pub use services::batch::{BatchController, BatchNotifier, BatchRegistry, BatchRun, TracingBatchNotifier};
pub use services::negotiation::BookingNegotiationService;
pub use router::{booking_routes, BookingState};
