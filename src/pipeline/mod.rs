// Booking pipeline: raw staging, cleaning, provisioning and merge

pub mod ingestion;
pub mod orchestrator;
pub mod pipeline_config;
pub mod processing;
pub mod steps;

// Re-export key types for convenience
pub use orchestrator::{PipelineExecutionResult, PipelineOrchestrator};
pub use pipeline_config::{PipelineConfig, RetryPolicy, Stage};
pub use steps::{PipelineStep, RunContext, StepResult};
