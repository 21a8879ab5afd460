//! Row ingestion and output plumbing.

pub mod compression;
pub mod csv;

pub use self::csv::{RowSink, RowSource};
