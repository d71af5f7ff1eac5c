//! Infrastructure layer: job queue, worker pool, record stores, external
//! collaborators, and the content-processing pipeline built on them.

pub mod config;
pub mod error;
pub mod external;
pub mod jobs;
pub mod pipeline;
pub mod store;

mod integration_tests;

pub use config::{AiSettings, ConfigError, PipelineConfig};
pub use error::{PipelineError, PipelineResult};
