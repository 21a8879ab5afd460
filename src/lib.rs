//! # labsift
//!
//! Classify, deduplicate and incrementally diff laboratory result extracts.
//!
//! A run reads one CSV extract and writes:
//!
//! - per-category row files (`wbc`, `cpd`, `pdl1`, `msi`) plus `results` with
//!   every emitted row
//! - `results-increment` and `new-ids`: the diff-worthy rows and the patients
//!   that have at least one row missing from the previous run's output
//! - for PD-L1 and MSI reports, the distinct result snippets of this run and the
//!   ones the previous run had not seen
//!
//! Re-running on a grown extract in the same output directory reports only what
//! is new since the last run.
//!
//! ## Quick Start
//!
//! ```no_run
//! use labsift::config::SiftConfig;
//! use labsift::io::RowSource;
//! # use anyhow::Result;
//!
//! # fn main() -> Result<()> {
//! let config = SiftConfig {
//!     output_dir: "out".into(),
//!     previous: Some("archive/results.csv".into()),
//!     ..SiftConfig::default()
//! };
//! let summary = labsift::pipeline::run(&config, RowSource::open("extract.csv")?)?;
//! println!("{} patients with new records", summary.new_identifiers.unwrap_or(0));
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Classification
//!
//! [`Classifier`] applies an ordered rule table to each row; the first match
//! decides its [`Category`]. PD-L1 and MSI matches also yield result snippets
//! extracted from the free-text `Value` column.
//!
//! ### Fingerprints
//!
//! Rows are compared by [`Fingerprint`], a SHA-256 digest of the row's
//! postcard encoding. A [`RecordStore`] is a thread-safe set of them, built by
//! replaying a previous output file on a hashing pool.
//!
//! ### Stages
//!
//! Every step runs on its own thread and hands rows on through bounded queues
//! (see [`stage`]). A full queue blocks its producer. [`pipeline::run`] joins
//! every stage and returns the first root-cause error.
//!
//! ## Feature Flags
//!
//! Compressed inputs and baselines are detected by extension or magic bytes:
//! `compression-gzip`, `compression-zstd`, `compression-bzip2`,
//! `compression-xz` (all on by default).

pub mod classify;
pub mod config;
pub mod diff;
pub mod error;
pub mod fingerprint;
pub mod header;
pub mod io;
pub mod metrics;
pub mod pipeline;
pub mod progress;
pub mod stage;
pub mod store;
pub mod testing;
pub mod unique;

pub use classify::{Category, Classification, Classifier};
pub use config::{SiftConfig, WbcPolicy};
pub use diff::{IncrementalDiff, resolve_identifier_column};
pub use error::SiftError;
pub use fingerprint::Fingerprint;
pub use header::{Header, Row};
pub use metrics::{RunSummary, TrackerSummary};
pub use store::{LoadSettings, RecordStore};
pub use unique::{Observation, UniqueStringTracker};
