//! Domain errors for labsift.
//!
//! Fatal I/O failures travel as [`anyhow::Error`] with context attached at the
//! boundary where they happen. The variants here are the conditions callers may
//! want to match on: a header that does not fit the rule tables, an encoding
//! failure while fingerprinting, or a stage that stopped because its neighbour
//! went away.

use thiserror::Error;

/// Error type for header resolution, fingerprinting, and stage coordination.
#[derive(Debug, Error)]
pub enum SiftError {
    #[error("required column '{0}' not found in header")]
    MissingColumn(String),
    #[error("column '{0}' appears more than once in header")]
    DuplicateColumn(String),
    #[error("cannot identify patient identifier column: no column name contains 'MRN' or 'UID'")]
    IdentifierColumn,
    #[error("row has {found} fields but header has {expected}")]
    Arity { expected: usize, found: usize },
    #[error("failed to encode row for fingerprinting: {0}")]
    Fingerprint(#[from] postcard::Error),
    #[error("queue '{0}' was closed by its consumer")]
    Disconnected(String),
    #[error("stage '{0}' panicked")]
    StagePanicked(String),
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl SiftError {
    /// True for errors that only echo a failure elsewhere in the pipeline.
    #[must_use]
    pub fn is_follow_on(&self) -> bool {
        matches!(self, Self::Disconnected(_))
    }
}
