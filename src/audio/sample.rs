//! # Audio Samples
//!
//! A sample is a pre-recorded utterance whose file name is its expected
//! transcript: `hello_world.wav` is expected to come back as "hello world".
//! Samples are read into memory once and shared read-only by every session.

use crate::error::{TesterError, TesterResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use walkdir::WalkDir;

/// One audio file plus the transcript the server should produce for it.
#[derive(Debug, Clone)]
pub struct AudioSample {
    /// Where the sample was loaded from (its identity)
    pub path: PathBuf,

    /// Expected transcript derived from the file name
    pub expected: String,

    /// Entire file contents, container header included
    pub data: Arc<[u8]>,
}

impl AudioSample {
    /// Build a sample from bytes already in memory.
    pub fn new(path: impl Into<PathBuf>, data: impl Into<Arc<[u8]>>) -> Self {
        let path = path.into();
        let expected = expected_label(&path);
        Self {
            path,
            expected,
            data: data.into(),
        }
    }

    /// Read a sample from disk.
    pub fn load(path: &Path) -> TesterResult<Self> {
        info!("Reading audio source data {}", path.display());
        let data = std::fs::read(path)
            .map_err(|e| TesterError::Io(format!("{}: {}", path.display(), e)))?;
        Ok(Self::new(path, data))
    }

    /// Case-insensitive comparison of a server transcript with the label.
    pub fn matches(&self, transcript: &str) -> bool {
        transcript.to_lowercase() == self.expected.to_lowercase()
    }
}

/// Derive the expected transcript from a file path.
///
/// The base name loses its extension and underscores become spaces.
pub fn expected_label(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().replace('_', " "))
        .unwrap_or_default()
}

/// List the samples in `folder`: every `*.wav` directly inside it, or every
/// `*.raw` if there are no WAVE files. Sorted by file name.
pub fn discover(folder: &Path) -> Vec<PathBuf> {
    let wav = list_with_extension(folder, "wav");
    if !wav.is_empty() {
        return wav;
    }
    list_with_extension(folder, "raw")
}

fn list_with_extension(folder: &Path, extension: &str) -> Vec<PathBuf> {
    WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().map_or(false, |ext| ext == extension))
        .collect()
}

/// Load every path in order. Paths that do not exist are logged and
/// skipped; any other read failure ends the run.
pub fn load_all(paths: &[PathBuf]) -> TesterResult<Vec<AudioSample>> {
    let mut samples = Vec::with_capacity(paths.len());

    for path in paths {
        if !path.exists() {
            warn!("File {} not found", path.display());
            continue;
        }

        let sample = AudioSample::load(path)?;
        info!("Expected text [{}]", sample.expected);
        samples.push(sample);
    }

    Ok(samples)
}

/// Load `paths` like [`load_all`], but treat an empty result as a
/// configuration error.
///
/// ## What this catches:
/// - no paths at all (empty folder, no `--wav` flags)
/// - paths that were given but none of them exist
///
/// Either way there is nothing to stream, so the run stops before any
/// connection is opened.
pub fn load_required(paths: &[PathBuf]) -> TesterResult<Vec<AudioSample>> {
    let samples = load_all(paths)?;

    if samples.is_empty() {
        return Err(TesterError::Config("no audio samples to test".to_string()));
    }

    Ok(samples)
}
