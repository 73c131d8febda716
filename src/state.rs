//! # Run Tally
//!
//! Collects verdicts from every session into one set of counters.
//!
//! ## Concurrency Pattern:
//! Sessions never touch the counters. Each one holds a clone of a
//! [`VerdictSender`] and pushes one [`Outcome`] per finished exchange into a
//! bounded `mpsc` channel. A single aggregator task owns the [`Tally`] and is
//! the only writer. When the last sender is dropped the channel closes and
//! the aggregator hands back the final tally.
//!
//! ```text
//!  session 0 ──┐
//!  session 1 ──┼──► mpsc ──► aggregator (owns Tally) ──► JoinHandle<Tally>
//!  session N ──┘
//! ```

use crate::protocol::Verdict;
use serde::Serialize;           // The tally is part of the JSON run summary
use tokio::sync::mpsc;          // Multi-producer, single-consumer channel
use tokio::task::JoinHandle;    // Resolves to the final tally

/// Channel capacity between sessions and the aggregator.
const VERDICT_QUEUE_DEPTH: usize = 256;

/// What the tally needs to know about one exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Mismatch,
    Error,
}

impl From<&Verdict> for Outcome {
    fn from(verdict: &Verdict) -> Self {
        match verdict {
            Verdict::Success { .. } => Outcome::Success,
            Verdict::Mismatch { .. } => Outcome::Mismatch,
            Verdict::Error(_) => Outcome::Error,
        }
    }
}

/// Aggregate counts across all sessions.
///
/// `attempted == successes + mismatches + errors` always holds.
///
/// ## Rust Concepts:
/// - **Copy**: four integers, so handing the tally around copies it instead
///   of moving it
/// - **Default**: `Tally::default()` is the all-zero starting point
/// - **u64**: a long run with many sessions can pass four billion exchanges
///
/// ## Why no locks:
/// Only the aggregator task ever holds a `&mut Tally`. Sessions talk to it
/// through the channel, so the counters need no `Mutex` or atomics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub successes: u64,
    pub mismatches: u64,
    pub errors: u64,
    pub attempted: u64,
}

impl Tally {
    /// Count one finished exchange.
    pub fn record(&mut self, outcome: Outcome) {
        self.attempted += 1;
        match outcome {
            Outcome::Success => self.successes += 1,
            Outcome::Mismatch => self.mismatches += 1,
            Outcome::Error => self.errors += 1,
        }
    }
}

/// Producer side handed to each session.
pub type VerdictSender = mpsc::Sender<Outcome>;

/// Spawn the aggregator task.
///
/// Returns the sender to clone into sessions and the handle that resolves to
/// the final tally once every sender is gone.
///
/// ## What this does:
/// 1. Creates a bounded channel of `VERDICT_QUEUE_DEPTH` outcomes
/// 2. Spawns a task that owns a fresh [`Tally`] and records every outcome
/// 3. Ends the task when `recv()` returns `None` (all senders dropped)
///
/// ## Rust Concepts:
/// - **async move**: the receiver is moved into the task, so no one else can
///   read from the channel
/// - **Bounded channel**: a producer that gets ahead of the aggregator waits
///   on `send().await` instead of growing memory without limit
///
/// ## Caller contract:
/// Drop the returned sender once it has been cloned into every producer,
/// or the handle never resolves.
pub fn spawn_aggregator() -> (VerdictSender, JoinHandle<Tally>) {
    let (tx, mut rx) = mpsc::channel(VERDICT_QUEUE_DEPTH);

    let handle = tokio::spawn(async move {
        let mut tally = Tally::default();  // Owned by this task alone
        while let Some(outcome) = rx.recv().await {
            tally.record(outcome);
        }
        tally
    });

    (tx, handle)
}
