//! Incremental new-record detection.
//!
//! [`IncrementalDiff`] sees every diff-worthy row of a run. Each row is
//! fingerprinted and checked against the baseline built from the prior run's
//! full output; a row absent from the baseline marks its patient as having new
//! data. Patients are keyed by the identifier column, so several new rows for
//! one patient yield a single entry in the identifiers output.
//!
//! As a stage, the diff forwards every row unchanged before examining it, so the
//! incremental results writer downstream still sees the full stream.

use crate::error::SiftError;
use crate::header::{Header, Row};
use crate::io::RowSink;
use crate::stage::{StageHandle, forward};
use crate::store::RecordStore;
use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender};
use log::{info, warn};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Descriptive columns written next to each new identifier by default.
pub const DEFAULT_COMPANION_COLUMNS: [&str; 4] =
    ["MRNFacility", "MedViewPatientID", "PatientName", "DOB"];

/// First column of the identifiers output.
pub const IDENTIFIER_HEADER: &str = "identifier";

/// Find the column that identifies a patient.
///
/// The first column whose name contains `MRN` wins; failing that, the first
/// containing `UID`.
///
/// # Errors
/// Returns [`SiftError::IdentifierColumn`] when neither exists.
pub fn resolve_identifier_column(header: &Header) -> Result<(usize, &str), SiftError> {
    header
        .find_containing("MRN")
        .or_else(|| header.find_containing("UID"))
        .ok_or(SiftError::IdentifierColumn)
}

/// Pending set of patients with at least one row missing from the baseline.
pub struct IncrementalDiff {
    id_column: usize,
    id_name: String,
    companions: Vec<(usize, String)>,
    baseline: Option<Arc<RecordStore>>,
    pending: BTreeMap<String, Vec<String>>,
    new_rows: u64,
}

impl IncrementalDiff {
    /// Set up a diff for rows shaped by `header`.
    ///
    /// `companions` names the columns recorded alongside each identifier; names
    /// the header lacks are skipped. Without a `baseline` every row is new.
    ///
    /// # Errors
    /// Returns [`SiftError::IdentifierColumn`] if no identifier column exists.
    pub fn new<S: AsRef<str>>(
        header: &Header,
        baseline: Option<Arc<RecordStore>>,
        companions: &[S],
    ) -> Result<Self, SiftError> {
        let (id_column, id_name) = resolve_identifier_column(header)?;
        let companions = companions
            .iter()
            .map(AsRef::as_ref)
            .filter_map(|name| header.index_of(name).map(|i| (i, name.to_string())))
            .collect();
        Ok(Self {
            id_column,
            id_name: id_name.to_string(),
            companions,
            baseline,
            pending: BTreeMap::new(),
            new_rows: 0,
        })
    }

    /// Examine one row; returns whether it is absent from the baseline.
    ///
    /// # Errors
    /// Returns [`SiftError::Fingerprint`] if the row cannot be encoded.
    pub fn observe(&mut self, row: &[String]) -> Result<bool, SiftError> {
        if let Some(baseline) = &self.baseline
            && baseline.check(row)?
        {
            return Ok(false);
        }
        self.new_rows += 1;
        let id = row.get(self.id_column).map_or("", String::as_str);
        if !self.pending.contains_key(id) {
            let companions = self
                .companions
                .iter()
                .map(|(i, _)| row.get(*i).cloned().unwrap_or_default())
                .collect();
            self.pending.insert(id.to_string(), companions);
        }
        Ok(true)
    }

    /// Rows found new so far.
    #[must_use]
    pub fn new_rows(&self) -> u64 {
        self.new_rows
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Pending identifiers in ascending order, each with its companion values.
    pub fn new_identifiers(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.pending
            .iter()
            .map(|(id, companions)| (id.as_str(), companions.as_slice()))
    }

    /// `identifier` followed by the companion column names.
    #[must_use]
    pub fn output_header(&self) -> Vec<String> {
        std::iter::once(IDENTIFIER_HEADER.to_string())
            .chain(self.companions.iter().map(|(_, name)| name.clone()))
            .collect()
    }

    /// Write the pending identifiers to `path`; returns how many were written.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or written.
    pub fn write_identifiers(&self, path: impl AsRef<Path>) -> Result<u64> {
        let mut sink = RowSink::create(path, &self.output_header())?;
        for (id, companions) in self.new_identifiers() {
            let mut record = Vec::with_capacity(companions.len() + 1);
            record.push(id);
            record.extend(companions.iter().map(String::as_str));
            sink.write_row(&record)?;
        }
        sink.finish()
    }

    /// Drain `rows`, forwarding each to `passthrough` before examining it, then
    /// write the identifiers file.
    ///
    /// # Errors
    /// Fails on a fingerprint error, a closed passthrough queue, or a write error.
    pub fn run(
        mut self,
        rows: &Receiver<Row>,
        passthrough: Option<&Sender<Row>>,
        ids_path: &Path,
    ) -> Result<u64> {
        match &self.baseline {
            Some(store) => info!(
                "diffing rows by '{}' against {} baseline records",
                self.id_name,
                store.len()
            ),
            None => warn!("no baseline records; every row counts as new"),
        }
        for row in rows {
            self.observe(&row)
                .context("check row against baseline")?;
            if let Some(out) = passthrough {
                forward(out, row, "results-increment")?;
            }
        }
        let written = self.write_identifiers(ids_path)?;
        info!(
            "patients with new records: {written} ({} new rows)",
            self.new_rows
        );
        Ok(written)
    }

    /// Run the diff as a stage. Resolves to the number of identifiers written.
    ///
    /// # Errors
    /// Returns an error if the stage thread cannot be spawned.
    pub fn spawn(
        self,
        rows: Receiver<Row>,
        passthrough: Option<Sender<Row>>,
        ids_path: PathBuf,
    ) -> Result<StageHandle<u64>> {
        StageHandle::spawn("diff", move || {
            self.run(&rows, passthrough.as_ref(), &ids_path)
        })
    }
}
