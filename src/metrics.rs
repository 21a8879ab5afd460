//! Run counters and the end-of-run summary.
//!
//! [`RunMetrics`] is shared by every classifier worker and bumped with relaxed
//! atomic increments. Once all stages are joined the orchestrator takes a
//! [`RunSummary`] snapshot, which can be logged or saved as JSON.
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! use labsift::config::SiftConfig;
//! use labsift::io::RowSource;
//!
//! let config = SiftConfig::default();
//! let summary = labsift::pipeline::run(&config, RowSource::open("extract.csv")?)?;
//! summary.log_summary();
//! summary.save_to_file("metrics.json")?;
//! # Ok(())
//! # }
//! ```

use crate::classify::Category;
use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Live counters for one run.
pub struct RunMetrics {
    started: Instant,
    processed: Arc<AtomicU64>,
    per_category: [AtomicU64; Category::ALL.len()],
    diff_worthy: AtomicU64,
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self {
            started: Instant::now(),
            processed: Arc::new(AtomicU64::new(0)),
            per_category: Default::default(),
            diff_worthy: AtomicU64::new(0),
        }
    }
}

impl RunMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one classified row.
    pub fn record(&self, category: Category, diff_worthy: bool) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        self.per_category[category as usize].fetch_add(1, Ordering::Relaxed);
        if diff_worthy {
            self.diff_worthy.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Count one row that bypassed classification.
    pub fn record_unfiltered(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        self.diff_worthy.fetch_add(1, Ordering::Relaxed);
    }

    /// Processed-row counter, for a throughput reporter to sample.
    #[must_use]
    pub fn processed_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.processed)
    }

    #[must_use]
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn count(&self, category: Category) -> u64 {
        self.per_category[category as usize].load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn diff_worthy(&self) -> u64 {
        self.diff_worthy.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Outcome of one unique-string tracker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerSummary {
    /// Distinct snippets seen this run.
    pub unique: u64,
    /// Distinct snippets absent from the prior run's baseline.
    pub new: u64,
}

/// Snapshot of a finished run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub rows_read: u64,
    pub processed: u64,
    /// Rows per category; empty when classification was skipped.
    pub categories: BTreeMap<Category, u64>,
    pub diff_worthy: u64,
    /// Identifiers written to the new-ids output, if a diff ran.
    pub new_identifiers: Option<u64>,
    /// Records written per output file name.
    pub written: BTreeMap<String, u64>,
    pub pdl1: Option<TrackerSummary>,
    pub msi: Option<TrackerSummary>,
    pub elapsed_ms: u64,
}

impl RunSummary {
    /// Rows classified into `category`.
    #[must_use]
    pub fn count(&self, category: Category) -> u64 {
        self.categories.get(&category).copied().unwrap_or(0)
    }

    /// Records written to the output named `file_name`.
    #[must_use]
    pub fn written_to(&self, file_name: &str) -> Option<u64> {
        self.written.get(file_name).copied()
    }

    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<Value> {
        serde_json::to_value(self).context("serialize run summary")
    }

    /// Log the summary at info level, one line per figure.
    pub fn log_summary(&self) {
        info!("========== Run Summary ==========");
        info!("rows read: {}", self.rows_read);
        info!("rows processed: {}", self.processed);
        for (category, n) in &self.categories {
            info!("  {category}: {n}");
        }
        info!("diff-worthy rows: {}", self.diff_worthy);
        if let Some(ids) = self.new_identifiers {
            info!("new identifiers: {ids}");
        }
        for (label, tracker) in [("pdl1", self.pdl1), ("msi", self.msi)] {
            if let Some(t) = tracker {
                info!("{label} strings: {} unique, {} new", t.unique, t.new);
            }
        }
        for (file, n) in &self.written {
            info!("  {file}: {n} records");
        }
        info!("elapsed: {} ms", self.elapsed_ms);
        info!("=================================");
    }

    /// Save the summary as pretty-printed JSON.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or written.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let formatted =
            serde_json::to_string_pretty(self).context("serialize run summary")?;
        let mut file =
            File::create(path).with_context(|| format!("create {}", path.display()))?;
        file.write_all(formatted.as_bytes())
            .with_context(|| format!("write {}", path.display()))?;
        info!("run summary saved to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_tracks_category_and_diff() {
        let m = RunMetrics::new();
        m.record(Category::Cpd, true);
        m.record(Category::Excluded, false);
        m.record(Category::Cpd, true);
        assert_eq!(m.processed(), 3);
        assert_eq!(m.count(Category::Cpd), 2);
        assert_eq!(m.count(Category::Excluded), 1);
        assert_eq!(m.diff_worthy(), 2);
    }

    #[test]
    fn summary_json_uses_category_names() -> anyhow::Result<()> {
        let mut summary = RunSummary::default();
        summary.categories.insert(Category::PdL1, 4);
        let json = summary.to_json()?;
        assert_eq!(json["categories"]["pdl1"], 4);
        assert_eq!(summary.count(Category::PdL1), 4);
        assert_eq!(summary.count(Category::Msi), 0);
        Ok(())
    }
}
