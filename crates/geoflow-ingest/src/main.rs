//! geoflow - fetch, unpack and segment a GEO series archive

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use geoflow_common::logging::{init_logging, LogConfig, LogLevel};
use geoflow_common::types::DEFAULT_DATASET_ID;
use geoflow_common::DatasetId;
use geoflow_ingest::{HttpTransport, IngestConfig, Pipeline, PipelineContext, StageKind};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "geoflow")]
#[command(author, version, about = "Fetch, unpack and segment GEO series archives")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory holding data/, extracted/ and processed/
    #[arg(short, long, global = true, env = "GEOFLOW_WORK_DIR")]
    workdir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the pipeline up to a stage, skipping stages whose output exists
    Run {
        /// GEO series accession
        #[arg(default_value = DEFAULT_DATASET_ID)]
        dataset: DatasetId,

        /// Last stage to run (acquire, unpack, segment)
        #[arg(long, default_value = "segment")]
        until: StageKind,
    },

    /// Show each stage's output path and whether it is present
    Status {
        /// GEO series accession
        #[arg(default_value = DEFAULT_DATASET_ID)]
        dataset: DatasetId,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log_config = LogConfig::builder()
        .level(LogLevel::Info)
        .log_file_prefix("geoflow")
        .build()
        .merge_env()?;
    // -v wins over GEOFLOW_LOG_LEVEL
    if cli.verbose {
        log_config.level = LogLevel::Debug;
    }
    let _log_guard = init_logging(&log_config)?;

    let mut config = IngestConfig::from_env().context("Invalid geoflow configuration")?;
    if let Some(dir) = cli.workdir {
        config.work_dir = dir;
    }

    match cli.command {
        Command::Run { dataset, until } => {
            let transport = Arc::new(HttpTransport::new(&config)?);
            let pipeline = Pipeline::new(PipelineContext::new(dataset.clone(), config), transport);

            info!(dataset = %dataset, until = %until, "Starting pipeline");
            let report = pipeline.run(until).await.map_err(|e| {
                error!(dataset = %dataset, error = %e, "Pipeline failed");
                e
            })?;
            info!(summary = %report, "Done");
        },
        Command::Status { dataset, json } => {
            // Status never fetches; the transport is only needed to build the chain.
            let transport = Arc::new(HttpTransport::new(&config)?);
            let pipeline = Pipeline::new(PipelineContext::new(dataset.clone(), config), transport);
            let status = pipeline.status()?;

            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!("Dataset: {}", dataset);
                for entry in &status {
                    let mark = if entry.satisfied { "done" } else { "pending" };
                    println!("  {:<8} {:<8} {}", entry.stage, mark, entry.output.display());
                }
            }
        },
    }

    Ok(())
}
