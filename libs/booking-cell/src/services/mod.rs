pub mod batch;
pub mod negotiation;

pub use batch::{BatchController, BatchNotifier, BatchRegistry, BatchRun, TracingBatchNotifier};
pub use negotiation::BookingNegotiationService;
