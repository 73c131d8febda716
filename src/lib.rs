//! # ASR Stream Tester
//!
//! Load/correctness client for a streaming speech-recognition server. It
//! streams pre-recorded samples over WebSocket, answers the server's
//! acknowledgment protocol, and checks every transcript against the sample's
//! file name.
//!
//! ## Application Architecture:
//! - **cli / config**: flags, `config.toml`, and `APP_` environment variables
//! - **audio**: sample discovery and WAVE payload location
//! - **protocol**: wire messages, reply framing, per-connection session
//! - **orchestrator**: parallel sessions and fail-fast supervision
//! - **state**: the single verdict aggregator
//! - **error**: error types and which of them are fatal

pub mod audio;        // Samples and WAVE parsing
pub mod cli;          // Command-line flags
pub mod config;       // Layered configuration
pub mod error;        // Error types
pub mod orchestrator; // Parallel sessions
pub mod protocol;     // WebSocket protocol client
pub mod state;        // Verdict aggregation

pub use config::AppConfig;
pub use error::{ReplyError, TesterError, TesterResult, TransportError};
pub use orchestrator::{run, RunPlan, RunSummary};
