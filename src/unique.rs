//! Run-over-run tracking of extracted result strings.
//!
//! A [`UniqueStringTracker`] consumes the snippet groups extracted from one
//! report family and keeps two lists:
//!
//! - every distinct snippet seen in this run (`<name>-unique-strings.csv`)
//! - the subset absent from the previous run's list (`<name>-unique-strings-new.csv`)
//!
//! The previous run's list is loaded into a [`RecordStore`] as one-field rows,
//! so a snippet and the row `[snippet]` share a fingerprint. The in-run set is
//! private to the tracker's own thread and needs no lock.

use crate::error::SiftError;
use crate::fingerprint::Fingerprint;
use crate::io::RowSink;
use crate::metrics::TrackerSummary;
use crate::stage::StageHandle;
use crate::store::{LoadSettings, RecordStore};
use anyhow::Result;
use crossbeam_channel::Receiver;
use log::info;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Header of both unique-string outputs.
pub const UNIQUE_HEADER: &str = "unique-result";

/// File name of the all-unique list for tracker `name`.
#[must_use]
pub fn unique_file_name(name: &str) -> String {
    format!("{name}-unique-strings.csv")
}

/// File name of the new-unique list for tracker `name`.
#[must_use]
pub fn new_unique_file_name(name: &str) -> String {
    format!("{name}-unique-strings-new.csv")
}

/// What observing one snippet revealed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Observation {
    /// The snippet had not been seen earlier in this run.
    pub first_in_run: bool,
    /// The snippet is first in this run and missing from the baseline.
    pub new_vs_baseline: bool,
}

/// Distinct-snippet tracker for one report family.
pub struct UniqueStringTracker {
    name: String,
    baseline: RecordStore,
    seen: HashSet<Fingerprint>,
    unique: Vec<String>,
    new: Vec<String>,
}

impl UniqueStringTracker {
    #[must_use]
    pub fn new(name: impl Into<String>, baseline: RecordStore) -> Self {
        Self {
            name: name.into(),
            baseline,
            seen: HashSet::new(),
            unique: Vec::new(),
            new: Vec::new(),
        }
    }

    /// Build a tracker whose baseline is the previous run's all-unique list in
    /// `previous_dir`. A missing file means an empty baseline.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be loaded.
    pub fn from_baseline_file(
        name: impl Into<String>,
        previous_dir: impl AsRef<Path>,
        settings: &LoadSettings,
    ) -> Result<Self> {
        let name = name.into();
        let path = previous_dir.as_ref().join(unique_file_name(&name));
        let baseline = if path.is_file() {
            info!("reading patterns from existing records file {}", path.display());
            RecordStore::build_from_file(&path, settings)?
        } else {
            info!(
                "no previous file {} for {name}, treating all as new",
                path.display()
            );
            RecordStore::new()
        };
        Ok(Self::new(name, baseline))
    }

    /// Record one snippet.
    ///
    /// # Errors
    /// Returns [`SiftError::Fingerprint`] if the snippet cannot be encoded.
    pub fn observe(&mut self, snippet: &str) -> Result<Observation, SiftError> {
        let fp = Fingerprint::of_str(snippet)?;
        if !self.seen.insert(fp) {
            return Ok(Observation::default());
        }
        self.unique.push(snippet.to_string());
        let new_vs_baseline = !self.baseline.contains(&fp);
        if new_vs_baseline {
            info!("New string: {snippet}");
            self.new.push(snippet.to_string());
        }
        Ok(Observation {
            first_in_run: true,
            new_vs_baseline,
        })
    }

    /// Record every snippet of one row, in order.
    ///
    /// # Errors
    /// See [`observe`](Self::observe).
    pub fn observe_group(&mut self, snippets: &[String]) -> Result<(), SiftError> {
        for snippet in snippets {
            self.observe(snippet)?;
        }
        Ok(())
    }

    /// Distinct snippets in first-seen order.
    #[must_use]
    pub fn unique(&self) -> &[String] {
        &self.unique
    }

    /// Distinct snippets missing from the baseline, in first-seen order.
    #[must_use]
    pub fn new_strings(&self) -> &[String] {
        &self.new
    }

    #[must_use]
    pub fn summary(&self) -> TrackerSummary {
        TrackerSummary {
            unique: self.unique.len() as u64,
            new: self.new.len() as u64,
        }
    }

    /// Write both lists into `output_dir`.
    ///
    /// # Errors
    /// Returns an error if either file cannot be written.
    pub fn write_outputs(&self, output_dir: &Path) -> Result<TrackerSummary> {
        for (file_name, strings) in [
            (unique_file_name(&self.name), &self.unique),
            (new_unique_file_name(&self.name), &self.new),
        ] {
            let mut sink = RowSink::create(output_dir.join(file_name), &[UNIQUE_HEADER])?;
            for s in strings {
                sink.write_row(&[s])?;
            }
            sink.finish()?;
        }
        Ok(self.summary())
    }

    /// Run as a stage draining `groups`, then write both lists.
    ///
    /// # Errors
    /// Returns an error if the stage thread cannot be spawned.
    pub fn spawn(
        mut self,
        groups: Receiver<Vec<String>>,
        output_dir: PathBuf,
    ) -> Result<StageHandle<TrackerSummary>> {
        let stage = format!("unique {}", self.name);
        StageHandle::spawn(stage, move || {
            for group in groups {
                self.observe_group(&group)?;
            }
            let summary = self.write_outputs(&output_dir)?;
            info!(
                "{}: {} unique strings, {} new",
                self.name, summary.unique, summary.new
            );
            Ok(summary)
        })
    }
}
