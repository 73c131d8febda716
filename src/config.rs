//! # Configuration Management
//!
//! Settings come from several layers, highest priority first:
//! 1. Command-line flags (see `cli.rs`)
//! 2. Environment variables with the `APP_` prefix, e.g. `APP_SERVER__ENDPOINT`
//!    or `APP_TEST__ITERATIONS` (a `.env` file is loaded first if present)
//! 3. `config.toml` in the working directory (optional)
//! 4. Built-in defaults
//!
//! ## Example config.toml:
//! ```toml
//! [server]
//! endpoint = "127.0.0.1:9350"
//! ssl = false
//!
//! [test]
//! wave_folder = "./samples"
//! iterations = 5
//! parallel = 4
//! ```

use crate::audio::sample;
use crate::cli::Cli;                     // Flags layered on top of file/env settings
use anyhow::Result;                      // Config errors are reported, not matched on
use serde::{Deserialize, Serialize};     // `config` goes through serde both ways
use std::path::{Path, PathBuf};

/// Everything the tester needs to know before it starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub test: TestConfig,
}

/// Where the recognition server lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// `host:port` of the WebSocket endpoint
    pub endpoint: String,

    /// `wss` when true, `ws` otherwise
    pub ssl: bool,
}

/// What to send and how hard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestConfig {
    /// Folder scanned for `*.wav` (or `*.raw`) samples; empty means none
    pub wave_folder: String,

    /// Extra sample paths, tested after the folder's contents
    pub files: Vec<String>,

    /// Exchanges per sample per session
    pub iterations: u32,

    /// Number of concurrent sessions (one connection each)
    pub parallel: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                endpoint: "127.0.0.1:9350".to_string(),
                ssl: true,
            },
            test: TestConfig {
                wave_folder: String::new(),
                files: Vec::new(),
                iterations: 1,
                parallel: 1,
            },
        }
    }
}

impl AppConfig {
    /// Load defaults, then `config.toml`, then `APP_` environment variables.
    ///
    /// Nested keys use a double underscore so field names can keep theirs:
    /// `APP_TEST__WAVE_FOLDER` sets `test.wave_folder`.
    ///
    /// ## What this does:
    /// 1. Serializes [`AppConfig::default`] as the lowest layer
    /// 2. Merges `config.toml` if it exists in the working directory
    /// 3. Merges `APP_*` environment variables (including any from `.env`)
    /// 4. Deserializes the merged tree back into an `AppConfig`
    ///
    /// ## Rust Concepts:
    /// - **Builder pattern**: each `add_source` returns the builder, later
    ///   sources override earlier ones
    /// - **`?` operator**: any layer that fails to parse stops loading
    /// - **`try_deserialize`**: serde turns the generic config tree into our
    ///   typed struct, so a non-numeric `APP_TEST__ITERATIONS` is an error here
    ///
    /// ## Examples:
    /// - `APP_SERVER__SSL=false`: plain `ws://`
    /// - `APP_TEST__PARALLEL=8`: eight concurrent sessions
    pub fn load() -> Result<Self> {
        let settings = config::Config::builder()
            // 1. Defaults
            .add_source(config::Config::try_from(&AppConfig::default())?)
            // 2. config.toml, optional
            .add_source(config::File::with_name("config").required(false))
            // 3. APP_SECTION__FIELD variables
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Layer command-line flags on top. Only flags that were given override.
    ///
    /// ## Rust Concepts:
    /// - **&mut self**: updates this config in place
    /// - **Option fields on `Cli`**: `None` means "flag not given", so a file
    ///   or environment value survives unless the user overrode it
    /// - **`if let Some(...)`**: touches a field only when the flag was present
    ///
    /// ## Exception:
    /// `--wav` paths are *appended* to any files listed in the config rather
    /// than replacing them.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(endpoint) = &cli.endpoint {
            self.server.endpoint = endpoint.clone();
        }
        if let Some(ssl) = cli.ssl {
            self.server.ssl = ssl;
        }
        if let Some(folder) = &cli.wave_folder {
            self.test.wave_folder = folder.display().to_string();
        }
        if let Some(iterations) = cli.iterations {
            self.test.iterations = iterations;
        }
        if let Some(parallel) = cli.parallel {
            self.test.parallel = parallel;
        }
        self.test
            .files
            .extend(cli.wav.iter().map(|path| path.display().to_string()));
    }

    /// Reject settings that cannot produce a run.
    pub fn validate(&self) -> Result<()> {
        if self.server.endpoint.trim().is_empty() {
            return Err(anyhow::anyhow!("You must specify a target endpoint"));
        }

        if self.test.iterations == 0 {
            return Err(anyhow::anyhow!("Iterations must be greater than 0"));
        }

        if self.test.parallel == 0 {
            return Err(anyhow::anyhow!("Parallel clients must be greater than 0"));
        }

        Ok(())
    }

    /// Scheme chosen by the `ssl` flag.
    pub fn scheme(&self) -> &'static str {
        if self.server.ssl {
            "wss"
        } else {
            "ws"
        }
    }

    /// Full WebSocket URL of the endpoint.
    pub fn ws_url(&self) -> String {
        format!("{}://{}", self.scheme(), self.server.endpoint)
    }

    /// Sample paths to test: the folder's contents first, then explicit files.
    pub fn sample_paths(&self) -> Vec<PathBuf> {
        let mut paths = if self.test.wave_folder.is_empty() {
            Vec::new()
        } else {
            sample::discover(Path::new(&self.test.wave_folder))
        };
        paths.extend(self.test.files.iter().map(PathBuf::from));
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.endpoint, "127.0.0.1:9350");
        assert!(config.server.ssl);
        assert_eq!(config.test.iterations, 1);
        assert_eq!(config.test.parallel, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        config.test.iterations = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.test.parallel = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.server.endpoint = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ws_url_follows_ssl_flag() {
        let mut config = AppConfig::default();
        assert_eq!(config.ws_url(), "wss://127.0.0.1:9350");

        config.server.ssl = false;
        config.server.endpoint = "asr.local:8080".to_string();
        assert_eq!(config.ws_url(), "ws://asr.local:8080");
    }

    #[test]
    fn test_cli_overrides_only_given_flags() {
        let cli = Cli::parse_from([
            "asr-stream-tester",
            "--ssl",
            "false",
            "--parallel",
            "4",
            "--wav",
            "a.wav",
            "--wav",
            "b.raw",
        ]);

        let mut config = AppConfig::default();
        config.apply_cli(&cli);

        assert!(!config.server.ssl);
        assert_eq!(config.test.parallel, 4);
        assert_eq!(config.test.iterations, 1);
        assert_eq!(config.server.endpoint, "127.0.0.1:9350");
        assert_eq!(config.test.files, vec!["a.wav", "b.raw"]);
    }

    #[test]
    fn test_sample_paths_folder_then_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("one.wav"), b"x").unwrap();

        let mut config = AppConfig::default();
        config.test.wave_folder = dir.path().display().to_string();
        config.test.files = vec!["extra.raw".to_string()];

        let paths = config.sample_paths();
        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("one.wav"));
        assert_eq!(paths[1], PathBuf::from("extra.raw"));
    }
}
