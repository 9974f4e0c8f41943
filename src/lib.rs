// Core modules
pub mod aggregation;
pub mod analyzer;
pub mod config;
pub mod error;
pub mod indicators;
pub mod models;
pub mod notify;
pub mod patterns;
pub mod pipeline;
pub mod store;
pub mod synthetic;
pub mod tracker;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{PipelineError, Result};
pub use models::*;
pub use pipeline::{CycleReport, Pipeline};
