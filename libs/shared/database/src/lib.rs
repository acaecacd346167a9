pub mod engine;

pub use engine::{EngineClient, EngineError};
