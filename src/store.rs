//! Concurrency-safe set of row fingerprints.
//!
//! [`RecordStore`] is the one structure several threads mutate at once: during
//! a bulk load every hashing worker inserts into it, and afterwards the diff
//! stage only reads it. A single coarse [`Mutex`] guards a plain `HashSet`; the
//! expensive part (encoding and hashing) happens outside the lock.
//!
//! Both deduplication mechanisms use it: row-level diffing against a prior
//! full-output file, and string-level diffing against a prior unique-strings
//! file.

use crate::error::SiftError;
use crate::fingerprint::Fingerprint;
use crate::io::RowSource;
use crate::progress::{DEFAULT_INTERVAL, ThroughputReporter};
use crate::stage::queue;
use anyhow::{Context, Result};
use log::info;
use rayon::iter::{ParallelBridge, ParallelIterator};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Tuning for [`RecordStore::build_from_file`].
#[derive(Clone, Debug)]
pub struct LoadSettings {
    /// Hashing threads.
    pub workers: usize,
    /// Capacity of the queue between the file reader and the hashing pool.
    pub queue_capacity: usize,
    /// Throughput logging interval.
    pub progress_interval: Duration,
}

impl Default for LoadSettings {
    fn default() -> Self {
        Self {
            workers: num_cpus::get().max(1),
            queue_capacity: 10_000,
            progress_interval: DEFAULT_INTERVAL,
        }
    }
}

/// Set of [`Fingerprint`]s shared between threads.
#[derive(Default)]
pub struct RecordStore {
    set: Mutex<HashSet<Fingerprint>>,
}

impl RecordStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<Fingerprint>> {
        // a panic mid-insert cannot leave a HashSet<Copy> half-written
        self.set.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fingerprint `row` and insert it. Inserting a known row is a no-op.
    ///
    /// # Errors
    /// Returns [`SiftError::Fingerprint`] if the row cannot be encoded.
    pub fn add(&self, row: &[String]) -> Result<(), SiftError> {
        let fp = Fingerprint::of_row(row)?;
        self.add_fingerprint(fp);
        Ok(())
    }

    /// Insert a precomputed fingerprint; returns `true` if it was not present.
    pub fn add_fingerprint(&self, fp: Fingerprint) -> bool {
        self.lock().insert(fp)
    }

    /// Whether a row with exactly these fields has been added.
    ///
    /// # Errors
    /// Returns [`SiftError::Fingerprint`] if the row cannot be encoded.
    pub fn check(&self, row: &[String]) -> Result<bool, SiftError> {
        let fp = Fingerprint::of_row(row)?;
        Ok(self.contains(&fp))
    }

    #[must_use]
    pub fn contains(&self, fp: &Fingerprint) -> bool {
        self.lock().contains(fp)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Replay every row of a prior output file into a new store.
    ///
    /// The file is read by the standard CSV row source (header skipped) on its
    /// own thread, and rows are fanned out over a pool of `settings.workers`
    /// hashing threads that each call [`add`](Self::add). All workers are joined
    /// before the store is returned.
    ///
    /// # Errors
    /// Any read or encoding failure aborts the whole load.
    pub fn build_from_file(path: impl AsRef<Path>, settings: &LoadSettings) -> Result<Self> {
        let path = path.as_ref();
        info!("reading file {} to fingerprint store", path.display());

        let source = RowSource::open(path)?;
        let (tx, rx) = queue(settings.queue_capacity);
        let reader = source.spawn(tx, settings.progress_interval)?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(settings.workers.max(1))
            .thread_name(|i| format!("hash-{i}"))
            .build()
            .context("build hashing thread pool")?;

        let store = Self::new();
        let reporter = ThroughputReporter::start("hashed", settings.progress_interval);
        let counter = reporter.counter();
        let hashed = pool.install(|| {
            rx.into_iter().par_bridge().try_for_each(|row| {
                store.add(&row)?;
                counter.fetch_add(1, Ordering::Relaxed);
                Ok::<(), SiftError>(())
            })
        });
        let read = reader.join();

        hashed.with_context(|| format!("fingerprint rows of {}", path.display()))?;
        read?;
        reporter.stop();
        info!("{} distinct records in {}", store.len(), path.display());
        Ok(store)
    }
}
