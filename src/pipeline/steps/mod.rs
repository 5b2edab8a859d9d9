use crate::error::Result;
use crate::pipeline::ingestion::RawLoadReport;
use crate::pipeline::pipeline_config::Stage;
use crate::pipeline::processing::{CleanOutcome, MergeReport};
use crate::storage::{CanonicalStore, RawStore};
use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

pub mod clean;
pub mod load_raw;
pub mod merge;
pub mod provision;

pub use clean::CleanStep;
pub use load_raw::LoadRawStep;
pub use merge::MergeStep;
pub use provision::ProvisionStep;

/// State handed from one stage to the next within a single run.
/// Each stage leaves its complete output here before the next one starts.
pub struct RunContext {
    pub run_id: Uuid,
    pub input_path: PathBuf,
    pub raw_store: Arc<dyn RawStore>,
    pub canonical_store: Arc<dyn CanonicalStore>,
    pub raw_report: Option<RawLoadReport>,
    pub cleaned: Option<CleanOutcome>,
    pub merge_report: Option<MergeReport>,
}

impl RunContext {
    pub fn new(
        input_path: impl Into<PathBuf>,
        raw_store: Arc<dyn RawStore>,
        canonical_store: Arc<dyn CanonicalStore>,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            input_path: input_path.into(),
            raw_store,
            canonical_store,
            raw_report: None,
            cleaned: None,
            merge_report: None,
        }
    }
}

/// Common trait for all pipeline steps
#[async_trait]
pub trait PipelineStep: Send + Sync {
    /// Execute this step against the run's stores, reading and writing `ctx`
    async fn execute(&self, ctx: &mut RunContext) -> Result<StepResult>;

    fn stage(&self) -> Stage;
}

/// Result of executing a pipeline step
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    pub stage: Stage,
    pub processed_count: usize,
    pub skipped_count: usize,
    pub rejected_count: usize,
    pub message: String,
    pub duration_ms: u128,
}

impl StepResult {
    pub fn success(stage: Stage, processed: usize, message: String) -> Self {
        Self {
            stage,
            processed_count: processed,
            skipped_count: 0,
            rejected_count: 0,
            message,
            duration_ms: 0,
        }
    }

    pub fn with_skipped(mut self, skipped: usize) -> Self {
        self.skipped_count = skipped;
        self
    }

    pub fn with_rejected(mut self, rejected: usize) -> Self {
        self.rejected_count = rejected;
        self
    }
}

/// Build the step that implements `stage`
pub fn step_for(stage: Stage) -> Box<dyn PipelineStep> {
    match stage {
        Stage::LoadRaw => Box::new(LoadRawStep),
        Stage::Clean => Box::new(CleanStep),
        Stage::ProvisionCanonical => Box::new(ProvisionStep),
        Stage::Merge => Box::new(MergeStep),
    }
}
