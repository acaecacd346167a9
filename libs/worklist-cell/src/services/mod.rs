pub mod fetch;

pub use fetch::WorklistService;
