// Data pipeline: ingestion, processing (models, data tests, docs) and delivery

pub mod delivery;
pub mod ingestion;
pub mod orchestrator;
pub mod processing;

pub use orchestrator::{PipelineExecutionResult, PipelineOrchestrator, Stage, StepResult};
