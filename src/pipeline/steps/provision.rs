use super::{PipelineStep, RunContext, StepResult};
use crate::constants::CANONICAL_TABLE;
use crate::error::Result;
use crate::pipeline::pipeline_config::Stage;
use async_trait::async_trait;

/// Makes sure the canonical table exists before anything is merged into it
pub struct ProvisionStep;

#[async_trait]
impl PipelineStep for ProvisionStep {
    async fn execute(&self, ctx: &mut RunContext) -> Result<StepResult> {
        ctx.canonical_store.ensure_canonical().await?;
        let existing = ctx.canonical_store.count().await?;
        Ok(StepResult::success(
            Stage::ProvisionCanonical,
            0,
            format!("{} ready with {} records", CANONICAL_TABLE, existing),
        ))
    }

    fn stage(&self) -> Stage {
        Stage::ProvisionCanonical
    }
}
