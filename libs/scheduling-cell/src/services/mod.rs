pub mod adhoc;
pub mod forecast;
pub mod slots;

pub use adhoc::AdhocSlotService;
pub use forecast::ForecastService;
pub use slots::SlotSelectionService;
