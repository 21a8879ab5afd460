//! Run configuration.
//!
//! [`SiftConfig`] holds everything [`pipeline::run`](crate::pipeline::run)
//! needs. Every field has a default, so a JSON config file only lists what it
//! changes; command-line flags are applied on top by the binary.
//!
//! ```json
//! {
//!   "output_dir": "out",
//!   "previous": "archive/results.csv.gz",
//!   "wbc_diff": "include",
//!   "queue_capacity": 50000
//! }
//! ```

use crate::diff::DEFAULT_COMPANION_COLUMNS;
use crate::error::SiftError;
use crate::store::LoadSettings;
use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Whether WBC rows count as new data for the incremental diff.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WbcPolicy {
    /// WBC rows are written to their outputs but never diffed.
    #[default]
    Exclude,
    /// WBC rows are diffed like the report categories.
    Include,
}

/// Settings for one run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiftConfig {
    /// Input CSV; `None` reads standard input.
    pub input: Option<PathBuf>,
    /// Directory receiving every output file.
    pub output_dir: PathBuf,
    /// Prior run's `results.csv`, the row-level diff baseline.
    pub previous: Option<PathBuf>,
    /// Directory holding the prior run's unique-string files. Defaults to `output_dir`.
    pub previous_dir: Option<PathBuf>,
    /// Skip classification and pass every row to the full output and the diff.
    pub no_filter: bool,
    pub wbc_diff: WbcPolicy,
    /// Treat every row as new when no baseline is configured. When false, the
    /// diff outputs are skipped without a baseline.
    pub diff_without_baseline: bool,
    /// Classifier worker count; derived from available cores when unset.
    pub workers: Option<usize>,
    /// Cores left to the reader and writer stages when deriving `workers`.
    pub reserved_io_cores: usize,
    /// Capacity of every inter-stage queue.
    pub queue_capacity: usize,
    /// Throughput logging interval in milliseconds.
    pub progress_interval_ms: u64,
    /// Columns written next to each new identifier, when present in the input.
    pub companion_columns: Vec<String>,
    /// Where to save the JSON run summary, if anywhere.
    pub metrics_file: Option<PathBuf>,
}

impl Default for SiftConfig {
    fn default() -> Self {
        Self {
            input: None,
            output_dir: PathBuf::from("."),
            previous: None,
            previous_dir: None,
            no_filter: false,
            wbc_diff: WbcPolicy::default(),
            diff_without_baseline: true,
            workers: None,
            reserved_io_cores: 2,
            queue_capacity: 10_000,
            progress_interval_ms: 2_000,
            companion_columns: DEFAULT_COMPANION_COLUMNS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            metrics_file: None,
        }
    }
}

impl SiftConfig {
    /// Load a JSON config file; absent fields take their defaults.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, does not parse, or fails
    /// [`validate`](Self::validate).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no run can use.
    ///
    /// # Errors
    /// Returns [`SiftError::Configuration`] naming the offending field.
    pub fn validate(&self) -> Result<(), SiftError> {
        if self.queue_capacity == 0 {
            return Err(SiftError::Configuration(
                "queue_capacity must be at least 1".into(),
            ));
        }
        if self.progress_interval_ms == 0 {
            return Err(SiftError::Configuration(
                "progress_interval_ms must be at least 1".into(),
            ));
        }
        if self.workers == Some(0) {
            return Err(SiftError::Configuration("workers must be at least 1".into()));
        }
        Ok(())
    }

    /// Classifier pool size: the explicit setting, or available cores minus
    /// the reserved I/O cores with a floor of two.
    #[must_use]
    pub fn classifier_workers(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            num_cpus::get()
                .saturating_sub(self.reserved_io_cores)
                .max(2)
        })
    }

    #[must_use]
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    /// Directory holding the prior run's unique-string files.
    #[must_use]
    pub fn previous_dir(&self) -> &Path {
        self.previous_dir.as_deref().unwrap_or(&self.output_dir)
    }

    /// Path of an output file inside `output_dir`.
    #[must_use]
    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.output_dir.join(file_name)
    }

    /// Settings for loading a fingerprint baseline.
    #[must_use]
    pub fn load_settings(&self) -> LoadSettings {
        LoadSettings {
            workers: num_cpus::get().max(1),
            queue_capacity: self.queue_capacity,
            progress_interval: self.progress_interval(),
        }
    }
}
