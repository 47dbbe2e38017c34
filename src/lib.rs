pub mod config;
pub mod constants;
pub mod error;
pub mod idempotency;
pub mod logging;
pub mod pipeline;
pub mod storage;
pub mod types;

pub use error::{PipelineError, Result};
