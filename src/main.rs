//! # ASR Stream Tester - Entry Point
//!
//! Load/correctness client for a streaming speech-recognition server. It
//! streams pre-recorded samples over WebSocket, answers the server's
//! acknowledgment protocol, and checks every transcript against the sample's
//! file name.
//!
//! See the library crate for the module layout.
//!
//! ## Exit Status:
//! - `0`: run completed (mismatches do not change this)
//! - `1`: configuration or transport failure, no summary printed
//! - `255`: `--env`, or interrupted by Ctrl-C

use anyhow::Result;
use asr_stream_tester::audio::sample;
use asr_stream_tester::cli::{self, Cli};
use asr_stream_tester::{orchestrator, AppConfig, RunPlan, TesterError};
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Exit status for `--env` and interrupts.
const ABORT_EXIT_CODE: i32 = -1;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    dotenv::dotenv().ok();

    init_tracing()?;

    let cli = Cli::parse();

    if cli.env {
        print!("{}", cli::environments_help());
        std::process::exit(ABORT_EXIT_CODE);
    }

    let mut config = AppConfig::load()?;
    config.apply_cli(&cli);
    config.validate()?;

    // Empty folder and all-missing files end up here alike
    let paths = config.sample_paths();
    let samples = match sample::load_required(&paths) {
        Ok(samples) => Arc::new(samples),
        Err(TesterError::Config(msg)) => {
            error!("Folder has no audio files (.[raw|wav])");
            return Err(TesterError::Config(msg).into());
        }
        Err(e) => return Err(e.into()),
    };

    install_interrupt_handler();

    let plan = RunPlan {
        url: config.ws_url(),
        iterations: config.test.iterations,
        parallel: config.test.parallel,
    };

    info!("Starting asr-stream-tester v{}", env!("CARGO_PKG_VERSION"));

    let summary = match orchestrator::run(&plan, samples).await {
        Ok(summary) => summary,
        Err(e) => {
            error!("FAILURE: {}", e);
            return Err(e.into());
        }
    };

    info!(
        "Run started {} took {:.2?}: {} succeeded, {} mismatched, {} unparseable, {} attempted",
        summary.started_at.to_rfc3339(),
        summary.elapsed,
        summary.tally.successes,
        summary.tally.mismatches,
        summary.tally.errors,
        summary.tally.attempted
    );
    if let Ok(json) = serde_json::to_string(&summary) {
        tracing::debug!("Run summary: {}", json);
    }

    println!("{}", summary.report_line());
    Ok(())
}

/// Console logging, filtered by `RUST_LOG`.
///
/// Defaults to `asr_stream_tester=info`; use `asr_stream_tester=debug` to see
/// every control message and WAVE chunk.
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "asr_stream_tester=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

/// Ctrl-C ends the process on the spot: no draining, no summary.
fn install_interrupt_handler() {
    tokio::spawn(async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("[interrupt] Exiting ...");
                std::process::exit(ABORT_EXIT_CODE);
            }
            Err(e) => error!("Failed to install interrupt handler: {}", e),
        }
    });
}
