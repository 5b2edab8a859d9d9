use super::{PipelineStep, RunContext, StepResult};
use crate::error::Result;
use crate::pipeline::ingestion::RawLoader;
use crate::pipeline::pipeline_config::Stage;
use async_trait::async_trait;
use tracing::info;

/// Reads the input file and replaces the raw staging table with it
pub struct LoadRawStep;

#[async_trait]
impl PipelineStep for LoadRawStep {
    async fn execute(&self, ctx: &mut RunContext) -> Result<StepResult> {
        info!("📥 Loading {} into raw staging", ctx.input_path.display());
        let report = RawLoader::stage(&ctx.input_path, ctx.raw_store.as_ref()).await?;
        let message = format!(
            "Staged {} rows from {} (sha256 {})",
            report.rows_loaded, report.source, report.fingerprint
        );
        let result = StepResult::success(Stage::LoadRaw, report.rows_loaded, message);
        ctx.raw_report = Some(report);
        Ok(result)
    }

    fn stage(&self) -> Stage {
        Stage::LoadRaw
    }
}
