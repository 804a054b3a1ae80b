//! Stagewatch command line.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use stagewatch::observability::{init_tracing, LogFormat};
use stagewatch::utils::format_iso8601;
use stagewatch::{CancellationToken, ConsoleReporter, Pipeline, Stage, WatchSession};
use tracing::info;

/// Stagewatch command line arguments.
#[derive(Parser, Debug)]
#[command(name = "stagewatch")]
#[command(about = "Incremental format, spelling, lint and test checks for a source tree")]
struct Args {
    /// Project root
    #[arg(short, long, value_name = "PATH", default_value = ".")]
    root: PathBuf,

    /// Log format (text or json)
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one pass and exit non-zero if anything failed
    Build,
    /// Re-run stale stages whenever files change
    Watch,
    /// Forget every stage watermark
    Clear,
    /// Print watermarks and recorded outputs
    Status,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_tracing(args.log_format);

    let mut pipeline = Pipeline::builder(&args.root)
        .build()
        .with_context(|| format!("loading project at {}", args.root.display()))?;

    match args.command {
        Command::Build => {
            let passed = pipeline.run_once(&ConsoleReporter, &CancellationToken::new()).await?;
            Ok(if passed { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        Command::Watch => {
            let session = WatchSession::new(pipeline, Arc::new(ConsoleReporter));
            session
                .run(async {
                    let _ = tokio::signal::ctrl_c().await;
                    info!("Interrupted");
                })
                .await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Clear => {
            pipeline.clear_stages()?;
            println!("Cleared stage watermarks in {}", pipeline.store().path().display());
            Ok(ExitCode::SUCCESS)
        }
        Command::Status => {
            print_status(&pipeline);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn print_status(pipeline: &Pipeline) {
    let store = pipeline.store();
    for stage in Stage::VERIFICATION.into_iter().chain([Stage::Install]) {
        let stamp = store
            .watermark(stage)
            .map_or_else(|| "never".to_string(), |stamp| format_iso8601(&stamp));
        println!("{:<12} {stamp}", stage.as_str());
    }
    println!("{} recorded output(s)", store.outputs().len());
    for output in store.outputs() {
        println!("  {}", output.display());
    }
}
