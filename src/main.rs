use anyhow::Context;
use clap::{Parser, Subcommand};
use provider_bookings_etl::config::EtlConfig;
use provider_bookings_etl::logging;
use provider_bookings_etl::pipeline::{PipelineConfig, PipelineExecutionResult, PipelineOrchestrator, Stage};
use provider_bookings_etl::storage::{CanonicalStore, SqliteStore};
use provider_bookings_etl::normalize_currency;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "provider-bookings-etl")]
#[command(about = "Stage, clean and merge provider booking extracts")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to a TOML config file (defaults to ./etl.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline, retrying whole runs on failure
    Run {
        /// Input CSV file
        #[arg(long)]
        input: Option<PathBuf>,
        /// SQLite database holding staging and canonical tables
        #[arg(long)]
        database: Option<PathBuf>,
        /// Stages to run (comma-separated). Available: load_raw, clean, provision_canonical, merge
        #[arg(long)]
        stages: Option<String>,
        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Parse a price string the way the cleaner does
    NormalizePrice {
        text: String,
    },
    /// Show how many records the canonical table holds
    Stats {
        #[arg(long)]
        database: Option<PathBuf>,
    },
}

fn parse_stages(list: &str) -> anyhow::Result<Vec<Stage>> {
    list.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.parse::<Stage>().map_err(anyhow::Error::from))
        .collect()
}

fn print_summary(execution: &PipelineExecutionResult) {
    println!("\n📊 Pipeline Results ({}):", execution.run_id);
    for step in &execution.step_results {
        println!("   {:<20} {} ({} ms)", step.stage.name(), step.message, step.duration_ms);
    }
    println!("   Inserted: {}", execution.inserted());
    println!("   Skipped:  {}", execution.skipped());
    println!("   Rejected: {}", execution.rejected());
    println!("   Attempts: {}", execution.attempts);

    if let Some(cleaned) = &execution.cleaned {
        if !cleaned.rejections.is_empty() {
            println!("\n⚠️  Rejected rows:");
            for rejection in &cleaned.rejections {
                println!(
                    "   - line {} ({}): {}",
                    rejection.line,
                    rejection.provider_booking_id.as_deref().unwrap_or("no key"),
                    rejection.reason
                );
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = EtlConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let _log_guard = logging::init_logging(&config.logging);

    match cli.command {
        Commands::Run {
            input,
            database,
            stages,
            json,
        } => {
            let input = input.unwrap_or_else(|| config.input_path.clone());
            let database = database.unwrap_or_else(|| config.store.database_path.clone());

            let mut pipeline = PipelineConfig::full(&input).with_retry(config.retry.clone());
            if let Some(list) = stages {
                pipeline.stages = parse_stages(&list)?;
            }

            let store = Arc::new(
                SqliteStore::open(&database)
                    .with_context(|| format!("Failed to open {}", database.display()))?,
            );
            let orchestrator = PipelineOrchestrator::new(store.clone(), store);

            info!("Running pipeline on {} into {}", input.display(), database.display());
            match orchestrator.run_with_retries(&pipeline).await {
                Ok(execution) => {
                    if json {
                        println!("{}", serde_json::to_string_pretty(&execution)?);
                    } else {
                        print_summary(&execution);
                        println!("✅ Pipeline completed successfully");
                    }
                }
                Err(e) => {
                    error!("Pipeline failed: {}", e);
                    return Err(e.into());
                }
            }
        }
        Commands::NormalizePrice { text } => match normalize_currency(&text) {
            Ok(value) => println!("{}", value),
            Err(e) => {
                println!("❌ {}", e);
                std::process::exit(1);
            }
        },
        Commands::Stats { database } => {
            let database = database.unwrap_or_else(|| config.store.database_path.clone());
            let store = SqliteStore::open(&database)?;
            store.ensure_canonical().await?;
            println!("📚 {} canonical records in {}", store.count().await?, database.display());
        }
    }
    Ok(())
}
