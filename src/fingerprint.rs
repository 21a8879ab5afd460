//! Content fingerprints for rows.
//!
//! A [`Fingerprint`] is the SHA-256 digest of a row's postcard encoding. postcard
//! writes the field count followed by each field as a length-prefixed string, so
//! the encoding is order-preserving and unambiguous about field boundaries:
//! `["ab", "c"]` and `["a", "bc"]` hash differently.
//!
//! Equality of fingerprints is the only notion of row equality used for
//! deduplication. It is purely structural; two rows differing only in a
//! timestamp are different rows.

use crate::error::SiftError;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;

/// 256-bit content digest of an encoded row.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; Fingerprint::LEN]);

impl Fingerprint {
    /// Digest size in bytes.
    pub const LEN: usize = 32;

    /// Fingerprint a row's field sequence.
    ///
    /// # Errors
    /// Returns [`SiftError::Fingerprint`] if the fields cannot be encoded.
    pub fn of_row(fields: &[String]) -> Result<Self, SiftError> {
        Self::of_fields(fields)
    }

    /// Fingerprint a single string as a one-field row.
    ///
    /// `Fingerprint::of_str(s)` equals `Fingerprint::of_row(&[s.to_string()])`,
    /// which is what lets a one-column output file serve as a string baseline.
    ///
    /// # Errors
    /// Returns [`SiftError::Fingerprint`] if the string cannot be encoded.
    pub fn of_str(value: &str) -> Result<Self, SiftError> {
        Self::of_fields(&[value])
    }

    fn of_fields<S: Serialize>(fields: &[S]) -> Result<Self, SiftError> {
        let encoded = postcard::to_allocvec(fields)?;
        let digest = Sha256::digest(&encoded);
        let mut bytes = [0u8; Self::LEN];
        bytes.copy_from_slice(&digest);
        Ok(Self(bytes))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({self})")
    }
}
