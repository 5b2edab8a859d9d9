use crate::constants;
use crate::error::{EtlError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// The pipeline stages, in the only order they may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    LoadRaw,
    Clean,
    ProvisionCanonical,
    Merge,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::LoadRaw,
        Stage::Clean,
        Stage::ProvisionCanonical,
        Stage::Merge,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::LoadRaw => "load_raw",
            Stage::Clean => "clean",
            Stage::ProvisionCanonical => "provision_canonical",
            Stage::Merge => "merge",
        }
    }

    /// Stages whose output this one consumes within the same run.
    /// Clean reads the persisted staging table, so it needs nothing earlier in the run.
    pub fn dependencies(&self) -> Vec<Stage> {
        match self {
            Stage::LoadRaw => vec![],
            Stage::Clean => vec![],
            Stage::ProvisionCanonical => vec![],
            Stage::Merge => vec![Stage::Clean, Stage::ProvisionCanonical],
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Stage {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().replace('-', "_").as_str() {
            "load_raw" => Ok(Stage::LoadRaw),
            "clean" => Ok(Stage::Clean),
            "provision_canonical" | "provision" => Ok(Stage::ProvisionCanonical),
            "merge" => Ok(Stage::Merge),
            other => Err(EtlError::Config(format!("unknown stage '{}'", other))),
        }
    }
}

/// How often, and how patiently, the driver reruns a failed pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: constants::DEFAULT_MAX_ATTEMPTS,
            backoff_ms: constants::DEFAULT_BACKOFF_MS,
        }
    }
}

impl RetryPolicy {
    /// Linear backoff before the given (1-based) retry attempt
    pub fn delay_before(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_ms.saturating_mul(attempt.saturating_sub(1) as u64))
    }
}

/// Configuration for one pipeline execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    pub input_path: PathBuf,
    pub stages: Vec<Stage>,
    pub retry: RetryPolicy,
}

impl PipelineConfig {
    /// Every stage, load through merge
    pub fn full(input_path: impl Into<PathBuf>) -> Self {
        Self {
            name: "provider_bookings".to_string(),
            input_path: input_path.into(),
            stages: Stage::ALL.to_vec(),
            retry: RetryPolicy::default(),
        }
    }

    /// Re-clean whatever is staged and merge it, without reading the input file
    pub fn from_staging(input_path: impl Into<PathBuf>) -> Self {
        Self {
            stages: vec![Stage::Clean, Stage::ProvisionCanonical, Stage::Merge],
            ..Self::full(input_path)
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Validate the pipeline configuration
    pub fn validate(&self) -> Result<()> {
        if self.stages.is_empty() {
            return Err(EtlError::Config("pipeline must have at least one stage".to_string()));
        }
        if self.retry.max_attempts == 0 {
            return Err(EtlError::Config("retry.max_attempts must be at least 1".to_string()));
        }

        let mut seen = HashSet::new();
        let mut previous: Option<Stage> = None;
        for stage in &self.stages {
            if let Some(prev) = previous {
                if *stage <= prev {
                    return Err(EtlError::Config(format!(
                        "stage '{}' cannot follow '{}'",
                        stage, prev
                    )));
                }
            }
            for dep in stage.dependencies() {
                if !seen.contains(&dep) {
                    return Err(EtlError::Config(format!(
                        "stage '{}' depends on '{}' which is not scheduled before it",
                        stage, dep
                    )));
                }
            }
            seen.insert(*stage);
            previous = Some(*stage);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_and_staging_pipelines_validate() {
        PipelineConfig::full("in.csv").validate().unwrap();
        PipelineConfig::from_staging("in.csv").validate().unwrap();
    }

    #[test]
    fn merge_without_clean_is_rejected() {
        let mut config = PipelineConfig::full("in.csv");
        config.stages = vec![Stage::LoadRaw, Stage::ProvisionCanonical, Stage::Merge];
        assert!(matches!(config.validate(), Err(EtlError::Config(_))));
    }

    #[test]
    fn stages_cannot_run_out_of_order() {
        let mut config = PipelineConfig::full("in.csv");
        config.stages = vec![Stage::Clean, Stage::LoadRaw];
        assert!(config.validate().is_err());

        config.stages = vec![Stage::Clean, Stage::Clean];
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_attempts_is_invalid() {
        let config = PipelineConfig::full("in.csv").with_retry(RetryPolicy {
            max_attempts: 0,
            backoff_ms: 0,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn stage_names_parse_leniently() {
        assert_eq!("load-raw".parse::<Stage>().unwrap(), Stage::LoadRaw);
        assert_eq!("provision".parse::<Stage>().unwrap(), Stage::ProvisionCanonical);
        assert!("publish".parse::<Stage>().is_err());
    }

    #[test]
    fn backoff_grows_linearly() {
        let retry = RetryPolicy {
            max_attempts: 3,
            backoff_ms: 100,
        };
        assert_eq!(retry.delay_before(1), Duration::ZERO);
        assert_eq!(retry.delay_before(3), Duration::from_millis(200));
    }
}
