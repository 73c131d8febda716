//! Command-line flags.
//!
//! Every flag is optional; anything left out falls back to `config.toml`,
//! `APP_` environment variables, or the built-in defaults.

use clap::Parser;
use std::path::PathBuf;

/// Known recognition server deployments, printed by `--env`.
pub const KNOWN_ENVIRONMENTS: &[(&str, &str, &str)] = &[
    ("CAT", "dev", "tap01.dev.exm-platform.com:9350"),
    ("CAT", "prd", "cat-ap.prod.exm-platform.com:9350"),
    ("KB4", "dev", "kb4-dev.exm-platform.com:9350"),
    ("KB4", "ecs", "websocket-server.aws-kb4-dev.exm-platform.com:443"),
    ("KB4", "lt", "52.221.181.65:9350"),
    ("BLD", "dev", "127.0.0.1:9350"),
];

#[derive(Parser, Debug)]
#[command(name = "asr-stream-tester")]
#[command(version, about = "Stream audio samples to a speech recognition server and check the transcripts")]
pub struct Cli {
    /// Folder to scan for *.wav (or *.raw) samples
    #[arg(long, value_name = "DIR")]
    pub wave_folder: Option<PathBuf>,

    /// Additional sample file (repeatable)
    #[arg(long, value_name = "FILE")]
    pub wav: Vec<PathBuf>,

    /// WebSocket server address (host:port)
    #[arg(long, value_name = "HOST:PORT")]
    pub endpoint: Option<String>,

    /// Use an SSL (wss) connection
    #[arg(long, value_name = "BOOL")]
    pub ssl: Option<bool>,

    /// Number of iterations per sample
    #[arg(long)]
    pub iterations: Option<u32>,

    /// Number of parallel clients to spawn
    #[arg(long)]
    pub parallel: Option<usize>,

    /// List known environments (for --endpoint) and exit
    #[arg(long)]
    pub env: bool,
}

/// Text printed by `--env`.
pub fn environments_help() -> String {
    let mut out = String::from("\n    Known Environments\n    ------------------\n\n");
    for (product, stage, endpoint) in KNOWN_ENVIRONMENTS {
        out.push_str(&format!("    {:<6} {:<6} {}\n", product, stage, endpoint));
    }
    out.push('\n');
    out
}
