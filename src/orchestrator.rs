//! # Test Orchestrator
//!
//! Fans the sample list out over `parallel` independent sessions and folds
//! their verdicts into one tally.
//!
//! ## Work Assignment:
//! Every session gets the *whole* sample list (replication, not
//! partitioning) and runs `iterations` exchanges per sample, so a complete
//! run performs `parallel × iterations × samples` exchanges.
//!
//! ## Failure Policy:
//! The first session that hits a transport error ends the run: the other
//! sessions are aborted and the error is returned without a summary.

use crate::audio::AudioSample;
use crate::error::{TesterError, TesterResult};
use crate::protocol::session;
use crate::state::{spawn_aggregator, Outcome, Tally, VerdictSender};
use chrono::{DateTime, Utc};          // Wall-clock start of the run, for the summary
use serde::Serialize;
use std::sync::Arc;                   // Sample list shared read-only by every session
use std::time::{Duration, Instant};
use tokio::task::JoinSet;             // Owns the session tasks; abort_all() on failure
use tracing::{error, info};

/// Parameters of one run, already validated.
///
/// ## Fields:
/// - `url`: where every session connects; all sessions share one endpoint
/// - `iterations`: how many times each sample is sent on each connection
/// - `parallel`: how many connections run at once
///
/// ## Rust Concepts:
/// - **Clone**: the plan is small; sessions receive owned copies of the URL
///   so their tasks can be `'static`
/// - **usize vs u32**: `parallel` counts tasks (a collection size), while
///   `iterations` is a wire-level index and stays a fixed-width integer
///
/// ## Why not read `AppConfig` directly:
/// The orchestrator only needs these three values. Keeping it independent of
/// the configuration layers lets tests build a plan against a local server.
#[derive(Debug, Clone)]
pub struct RunPlan {
    /// `ws://host:port` or `wss://host:port`
    pub url: String,

    /// Exchanges per sample per session (≥ 1)
    pub iterations: u32,

    /// Concurrent sessions (≥ 1)
    pub parallel: usize,
}

impl RunPlan {
    /// Exchanges a complete run performs for `sample_count` samples.
    pub fn expected_exchanges(&self, sample_count: usize) -> u64 {
        self.parallel as u64 * u64::from(self.iterations) * sample_count as u64
    }
}

/// Final result of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub tally: Tally,

    /// `parallel × iterations × samples`
    pub expected_total: u64,

    pub started_at: DateTime<Utc>,

    pub elapsed: Duration,
}

impl RunSummary {
    /// The line printed at the end of a run.
    pub fn report_line(&self) -> String {
        format!(
            "Successfully matched {} replies out of {} requests",
            self.tally.successes, self.expected_total
        )
    }
}

/// Run every session to completion and return the aggregate.
///
/// ## What this does:
/// 1. Starts the aggregator task and keeps one sender for cloning
/// 2. Spawns `parallel` sessions into a `JoinSet`, each with its own sender
/// 3. Drops the original sender so the channel closes once sessions finish
/// 4. Joins sessions as they complete; the first failure aborts the rest
/// 5. Awaits the aggregator for the final [`Tally`]
///
/// ## Rust Concepts:
/// - **Arc<Vec<AudioSample>>**: every session reads the same samples without
///   copying the audio bytes
/// - **JoinSet**: a set of spawned tasks that can be joined in completion
///   order and cancelled together
/// - **`and_then(|inner| inner)`**: flattens "the task panicked" and "the task
///   returned an error" into one `TesterResult`
///
/// ## Returns:
/// - `Ok(RunSummary)` when every session finished its whole schedule
/// - `Err(TesterError)` for the first transport failure; no summary is built
pub async fn run(plan: &RunPlan, samples: Arc<Vec<AudioSample>>) -> TesterResult<RunSummary> {
    let started_at = Utc::now();
    let clock = Instant::now();
    let expected_total = plan.expected_exchanges(samples.len());

    info!(
        "Starting {} session(s) × {} iteration(s) over {} sample(s) against {}",
        plan.parallel,
        plan.iterations,
        samples.len(),
        plan.url
    );

    let (verdicts, aggregator) = spawn_aggregator();
    let mut sessions = JoinSet::new();

    for id in 0..plan.parallel {
        sessions.spawn(run_session(
            id,
            plan.url.clone(),
            plan.iterations,
            samples.clone(),
            verdicts.clone(),
        ));
    }

    // Sessions hold the only remaining senders; the aggregator finishes when they do
    drop(verdicts);

    while let Some(joined) = sessions.join_next().await {
        let result = joined.map_err(TesterError::from).and_then(|inner| inner);
        if let Err(err) = result {
            error!("Aborting run: {}", err);
            sessions.abort_all();
            return Err(err);
        }
    }

    let tally = aggregator.await?;  // JoinError becomes TesterError::Task

    Ok(RunSummary {
        tally,
        expected_total,
        started_at,
        elapsed: clock.elapsed(),
    })
}

/// One session: connect, then every sample × every iteration in order.
async fn run_session(
    id: usize,
    url: String,
    iterations: u32,
    samples: Arc<Vec<AudioSample>>,
    verdicts: VerdictSender,
) -> TesterResult<()> {
    let mut session = session::connect(id, &url).await?;

    for sample in samples.iter() {
        info!("[{}] [ Processing WAV {} ]", session.id(), sample.path.display());

        for iteration in 1..=iterations {
            let exchange = session.run_exchange(sample, iteration).await?;
            verdicts
                .send(Outcome::from(&exchange.verdict))
                .await
                .map_err(|_| TesterError::Task("verdict aggregator stopped".to_string()))?;
        }
    }

    session.close().await;
    info!("[{}] Session finished", id);
    Ok(())
}
