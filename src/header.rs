//! Column header and row types.
//!
//! A [`Header`] is the ordered list of column names read from the first record
//! of an input. Every component resolves the columns it needs through it once,
//! then indexes rows positionally.

use crate::error::SiftError;
use std::collections::HashMap;

/// One record: ordered string fields, positions meaningful only via a [`Header`].
pub type Row = Vec<String>;

/// Ordered, unique column names with a name-to-index lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl Header {
    /// Build a header, rejecting duplicate column names.
    ///
    /// # Errors
    /// Returns [`SiftError::DuplicateColumn`] if a name occurs twice.
    pub fn new<I, S>(names: I) -> Result<Self, SiftError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let mut index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            if index.insert(name.clone(), i).is_some() {
                return Err(SiftError::DuplicateColumn(name.clone()));
            }
        }
        Ok(Self { names, index })
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Position of an exact column name.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Position of a column that must be present.
    ///
    /// # Errors
    /// Returns [`SiftError::MissingColumn`] when the name is absent.
    pub fn require(&self, name: &str) -> Result<usize, SiftError> {
        self.index_of(name)
            .ok_or_else(|| SiftError::MissingColumn(name.to_string()))
    }

    /// First column (in header order) whose name contains `fragment`.
    #[must_use]
    pub fn find_containing(&self, fragment: &str) -> Option<(usize, &str)> {
        self.names
            .iter()
            .enumerate()
            .find(|(_, name)| name.contains(fragment))
            .map(|(i, name)| (i, name.as_str()))
    }

    /// Check that `row` has one field per column.
    ///
    /// # Errors
    /// Returns [`SiftError::Arity`] on a length mismatch.
    pub fn check_arity(&self, row: &[String]) -> Result<(), SiftError> {
        if row.len() == self.names.len() {
            Ok(())
        } else {
            Err(SiftError::Arity {
                expected: self.names.len(),
                found: row.len(),
            })
        }
    }
}
