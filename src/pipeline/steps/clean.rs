use super::{PipelineStep, RunContext, StepResult};
use crate::error::Result;
use crate::pipeline::pipeline_config::Stage;
use crate::pipeline::processing::RecordCleaner;
use async_trait::async_trait;
use tracing::{info, warn};

/// Types and de-duplicates everything currently staged
pub struct CleanStep;

#[async_trait]
impl PipelineStep for CleanStep {
    async fn execute(&self, ctx: &mut RunContext) -> Result<StepResult> {
        let raw = ctx.raw_store.load_raw().await?;
        info!("🔧 Cleaning {} staged rows", raw.len());

        let outcome = RecordCleaner::clean(&raw);
        for (kind, count) in outcome.rejections_by_kind() {
            warn!("{} rows rejected: {}", count, kind);
        }

        let message = format!(
            "{} rows read, {} clean, {} duplicates removed, {} rejected",
            outcome.rows_read,
            outcome.records.len(),
            outcome.duplicates_removed,
            outcome.rejected_count()
        );
        let result = StepResult::success(Stage::Clean, outcome.records.len(), message)
            .with_skipped(outcome.duplicates_removed)
            .with_rejected(outcome.rejected_count());
        ctx.cleaned = Some(outcome);
        Ok(result)
    }

    fn stage(&self) -> Stage {
        Stage::Clean
    }
}
