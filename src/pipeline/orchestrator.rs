use super::pipeline_config::{PipelineConfig, Stage};
use super::steps::{step_for, RunContext, StepResult};
use crate::error::Result;
use crate::pipeline::processing::{CleanOutcome, MergeReport};
use crate::storage::{CanonicalStore, RawStore};
use chrono::{DateTime, Utc};
use metrics::histogram;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Drives the stages in their fixed order against injected stores.
///
/// A stage failure fails the whole run. Retrying means rerunning the pipeline from
/// the first configured stage; the idempotent merge makes that safe.
pub struct PipelineOrchestrator {
    raw_store: Arc<dyn RawStore>,
    canonical_store: Arc<dyn CanonicalStore>,
}

impl PipelineOrchestrator {
    pub fn new(raw_store: Arc<dyn RawStore>, canonical_store: Arc<dyn CanonicalStore>) -> Self {
        Self {
            raw_store,
            canonical_store,
        }
    }

    /// Fresh per-run state bound to this orchestrator's stores
    pub fn context(&self, config: &PipelineConfig) -> RunContext {
        RunContext::new(
            config.input_path.clone(),
            self.raw_store.clone(),
            self.canonical_store.clone(),
        )
    }

    /// Run a single stage against an existing run context
    pub async fn run_stage(&self, stage: Stage, ctx: &mut RunContext) -> Result<StepResult> {
        let step = step_for(stage);
        let started = Instant::now();
        info!("🔄 Executing stage: {}", stage);

        let mut result = step
            .execute(ctx)
            .instrument(info_span!("stage", stage = stage.name()))
            .await?;

        let elapsed = started.elapsed();
        histogram!("etl_stage_duration_seconds", "stage" => stage.name()).record(elapsed.as_secs_f64());
        result.duration_ms = elapsed.as_millis();
        info!("✅ Stage '{}' completed: {}", stage, result.message);
        Ok(result)
    }

    /// One attempt at the configured pipeline. Stops at the first failing stage.
    pub async fn run(&self, config: &PipelineConfig) -> Result<PipelineExecutionResult> {
        config.validate()?;
        let mut ctx = self.context(config);
        let span = info_span!("pipeline", run_id = %ctx.run_id, name = %config.name);

        async {
            info!("🚀 Starting pipeline '{}'", config.name);
            let mut execution = PipelineExecutionResult::new(config.name.clone(), ctx.run_id);

            for (index, stage) in config.stages.iter().enumerate() {
                info!("Stage {}/{}: {}", index + 1, config.stages.len(), stage);
                match self.run_stage(*stage, &mut ctx).await {
                    Ok(result) => execution.step_results.push(result),
                    Err(e) => {
                        error!("❌ Stage '{}' failed: {}", stage, e);
                        return Err(e);
                    }
                }
            }

            execution.cleaned = ctx.cleaned.take();
            execution.merge = ctx.merge_report.take();
            execution.complete();
            info!(
                "🎉 Pipeline '{}' finished: {} inserted, {} skipped, {} rejected",
                config.name,
                execution.inserted(),
                execution.skipped(),
                execution.rejected()
            );
            Ok(execution)
        }
        .instrument(span)
        .await
    }

    /// Rerun the whole pipeline until it succeeds or the retry budget is spent.
    pub async fn run_with_retries(&self, config: &PipelineConfig) -> Result<PipelineExecutionResult> {
        config.validate()?;
        let mut attempt = 1;
        loop {
            match self.run(config).await {
                Ok(mut execution) => {
                    execution.attempts = attempt;
                    return Ok(execution);
                }
                Err(e) if attempt < config.retry.max_attempts => {
                    attempt += 1;
                    let delay = config.retry.delay_before(attempt);
                    warn!(
                        "⚠️ Pipeline attempt {} failed ({}); retrying in {:?}",
                        attempt - 1,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    error!("💥 Pipeline failed after {} attempts: {}", attempt, e);
                    return Err(e);
                }
            }
        }
    }
}

/// Result of executing a complete pipeline
#[derive(Debug, Clone, Serialize)]
pub struct PipelineExecutionResult {
    pub pipeline_name: String,
    pub run_id: Uuid,
    pub attempts: u32,
    pub step_results: Vec<StepResult>,
    pub cleaned: Option<CleanOutcome>,
    pub merge: Option<MergeReport>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl PipelineExecutionResult {
    pub fn new(pipeline_name: String, run_id: Uuid) -> Self {
        Self {
            pipeline_name,
            run_id,
            attempts: 1,
            step_results: Vec::new(),
            cleaned: None,
            merge: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn complete(&mut self) {
        self.completed_at = Some(Utc::now());
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        self.completed_at.map(|end| end - self.started_at)
    }

    pub fn inserted(&self) -> usize {
        self.merge.as_ref().map_or(0, |m| m.inserted)
    }

    pub fn skipped(&self) -> usize {
        self.merge.as_ref().map_or(0, |m| m.skipped)
    }

    pub fn rejected(&self) -> usize {
        self.cleaned.as_ref().map_or(0, |c| c.rejected_count())
    }
}
