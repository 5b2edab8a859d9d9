use super::{PipelineStep, RunContext, StepResult};
use crate::error::{EtlError, Result};
use crate::pipeline::pipeline_config::Stage;
use crate::pipeline::processing::IdempotentMerge;
use async_trait::async_trait;
use tracing::info;

/// Inserts the cleaned records that are not yet in the canonical table
pub struct MergeStep;

#[async_trait]
impl PipelineStep for MergeStep {
    async fn execute(&self, ctx: &mut RunContext) -> Result<StepResult> {
        let cleaned = ctx.cleaned.as_ref().ok_or_else(|| EtlError::StageOrder {
            stage: Stage::Merge.name(),
            message: "no cleaned records in this run; run the clean stage first".to_string(),
        })?;
        info!("🧩 Merging {} cleaned records", cleaned.records.len());

        let report = IdempotentMerge::merge(&cleaned.records, ctx.canonical_store.as_ref()).await?;
        let message = format!(
            "{} inserted, {} already present",
            report.inserted, report.skipped
        );
        let result = StepResult::success(Stage::Merge, report.inserted, message)
            .with_skipped(report.skipped);
        ctx.merge_report = Some(report);
        Ok(result)
    }

    fn stage(&self) -> Stage {
        Stage::Merge
    }
}
