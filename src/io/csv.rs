//! Delimited-text row source and sink.
//!
//! This module provides:
//! - **[`RowSource`]**: reads a header and then streams rows from a CSV path
//!   (optionally compressed) or any reader, as a stage feeding a bounded queue
//! - **[`RowSink`]**: truncates an output file, writes the header, then appends
//!   rows in arrival order, as a stage draining a bounded queue
//!
//! # Design notes
//! - Rows are plain `Vec<String>`; no Serde typing, because column sets differ
//!   between extracts and only a few names matter to classification.
//! - The reader is strict about arity: a record with a different field count
//!   than the header is a fatal error.
//! - Quotes are parsed leniently, matching what database exports tend to emit.

use crate::header::{Header, Row};
use crate::io::compression::{DynRead, auto_detect_reader};
use crate::progress::ThroughputReporter;
use crate::stage::{StageHandle, forward};
use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender};
use log::info;
use std::fs::{File, create_dir_all};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::time::Duration;

/// A header plus a lazy, finite, non-restartable sequence of rows.
pub struct RowSource {
    label: String,
    header: Header,
    reader: csv::Reader<DynRead>,
}

impl RowSource {
    /// Open a CSV file, decompressing it if needed, and read its header.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or its header is invalid.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
        let reader = auto_detect_reader(f, path)
            .with_context(|| format!("setup decompression for {}", path.display()))?;
        Self::from_boxed(reader, path.display().to_string())
    }

    /// Read CSV from standard input.
    ///
    /// # Errors
    /// Returns an error if the header cannot be read.
    pub fn stdin() -> Result<Self> {
        Self::from_reader(std::io::stdin(), "stdin")
    }

    /// Read CSV from an arbitrary byte stream.
    ///
    /// # Errors
    /// Returns an error if the header cannot be read or has duplicate names.
    pub fn from_reader<R: Read + Send + 'static>(reader: R, label: impl Into<String>) -> Result<Self> {
        Self::from_boxed(Box::new(reader), label.into())
    }

    fn from_boxed(reader: DynRead, label: String) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(reader);
        let names: Vec<String> = reader
            .headers()
            .with_context(|| format!("read header from {label}"))?
            .iter()
            .map(str::to_owned)
            .collect();
        let header =
            Header::new(names).with_context(|| format!("parse header from {label}"))?;
        Ok(Self {
            label,
            header,
            reader,
        })
    }

    #[must_use]
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Read the next row, or `None` at end of input.
    ///
    /// # Errors
    /// Returns an error on malformed CSV or a row whose arity differs from the header.
    pub fn next_row(&mut self) -> Result<Option<Row>> {
        let mut record = csv::StringRecord::new();
        let more = self
            .reader
            .read_record(&mut record)
            .with_context(|| format!("read CSV record from {}", self.label))?;
        if !more {
            return Ok(None);
        }
        let row: Row = record.iter().map(str::to_owned).collect();
        self.header
            .check_arity(&row)
            .with_context(|| format!("CSV record from {}", self.label))?;
        Ok(Some(row))
    }

    /// Drain every remaining row into memory.
    ///
    /// # Errors
    /// See [`next_row`](Self::next_row).
    pub fn collect_rows(mut self) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        while let Some(row) = self.next_row()? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Run the source as a stage pushing every row onto `out`.
    ///
    /// The stage resolves to the number of rows read. The queue closes when the
    /// stage ends because `out` is dropped with it.
    ///
    /// # Errors
    /// Returns an error if the stage thread cannot be spawned.
    pub fn spawn(self, out: Sender<Row>, interval: Duration) -> Result<StageHandle<u64>> {
        let name = format!("read {}", self.label);
        StageHandle::spawn(name, move || self.pump(&out, interval))
    }

    fn pump(mut self, out: &Sender<Row>, interval: Duration) -> Result<u64> {
        info!("reading rows from {}", self.label);
        let reporter = ThroughputReporter::start(format!("read ({})", self.label), interval);
        let counter = reporter.counter();
        while let Some(row) = self.next_row()? {
            forward(out, row, "rows")?;
            counter.fetch_add(1, Ordering::Relaxed);
        }
        Ok(reporter.stop())
    }
}

/// Truncate-then-append CSV writer for one named output.
pub struct RowSink {
    path: PathBuf,
    writer: csv::Writer<File>,
    written: u64,
}

impl RowSink {
    /// Create (or truncate) `path` and write `header` as its first record.
    ///
    /// Parent directories are created if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the file or directories cannot be created.
    pub fn create<S: AsRef<[u8]>>(path: impl AsRef<Path>, header: &[S]) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            create_dir_all(parent).with_context(|| format!("mkdir -p {}", parent.display()))?;
        }
        let f = File::create(&path).with_context(|| format!("create {}", path.display()))?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(f);
        writer
            .write_record(header)
            .with_context(|| format!("write header to {}", path.display()))?;
        Ok(Self {
            path,
            writer,
            written: 0,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record.
    ///
    /// # Errors
    /// Returns an error if the record cannot be written.
    pub fn write_row<S: AsRef<[u8]>>(&mut self, row: &[S]) -> Result<()> {
        self.writer
            .write_record(row)
            .with_context(|| format!("write record #{} to {}", self.written + 1, self.path.display()))?;
        self.written += 1;
        Ok(())
    }

    /// Flush and close, returning the number of records written (header excluded).
    ///
    /// # Errors
    /// Returns an error if the final flush fails.
    pub fn finish(mut self) -> Result<u64> {
        self.writer
            .flush()
            .with_context(|| format!("flush {}", self.path.display()))?;
        info!("wrote {} records to {}", self.written, self.path.display());
        Ok(self.written)
    }

    /// Run the sink as a stage draining `rows` until the queue closes.
    ///
    /// # Errors
    /// Returns an error if the stage thread cannot be spawned.
    pub fn spawn(self, rows: Receiver<Row>) -> Result<StageHandle<u64>> {
        let name = format!("write {}", self.path.display());
        StageHandle::spawn(name, move || {
            let mut sink = self;
            for row in rows {
                sink.write_row(&row)?;
            }
            sink.finish()
        })
    }
}

