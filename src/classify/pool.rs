//! Classifier worker pool.
//!
//! Workers share one input queue and one set of output queues. Each worker
//! holds its own clones of the senders, so an output queue closes only after
//! the last worker exits. A supervisor stage owns the scoped worker threads and
//! the `filtered` throughput reporter.

use super::{Category, Classifier};
use crate::config::WbcPolicy;
use crate::header::Row;
use crate::metrics::RunMetrics;
use crate::progress::ThroughputReporter;
use crate::stage::{StageHandle, forward};
use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender};
use log::{debug, info};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Output queues of the classifier stage.
#[derive(Clone)]
pub struct Routes {
    /// Every emitted row.
    pub results: Sender<Row>,
    pub wbc: Sender<Row>,
    pub cpd: Sender<Row>,
    pub pdl1: Sender<Row>,
    pub msi: Sender<Row>,
    /// Diff-worthy rows; `None` when no diff runs.
    pub diff: Option<Sender<Row>>,
    pub pdl1_snippets: Sender<Vec<String>>,
    pub msi_snippets: Sender<Vec<String>>,
}

impl Routes {
    fn category(&self, category: Category) -> Option<(&Sender<Row>, &'static str)> {
        match category {
            Category::Wbc => Some((&self.wbc, "wbc")),
            Category::Cpd => Some((&self.cpd, "cpd")),
            Category::PdL1 => Some((&self.pdl1, "pdl1")),
            Category::Msi => Some((&self.msi, "msi")),
            Category::Excluded | Category::Unmatched => None,
        }
    }

    fn snippets(&self, category: Category) -> Option<&Sender<Vec<String>>> {
        match category {
            Category::PdL1 => Some(&self.pdl1_snippets),
            Category::Msi => Some(&self.msi_snippets),
            _ => None,
        }
    }
}

/// Pool sizing and policy.
#[derive(Clone, Copy, Debug)]
pub struct PoolSettings {
    pub workers: usize,
    pub wbc: WbcPolicy,
    pub progress_interval: Duration,
}

struct Worker {
    classifier: Arc<Classifier>,
    input: Receiver<Row>,
    routes: Routes,
    metrics: Arc<RunMetrics>,
    wbc: WbcPolicy,
}

impl Worker {
    fn run(self) -> Result<()> {
        for row in &self.input {
            let classification = self.classifier.classify(&row);
            let category = classification.category;
            let diff_worthy = category.is_diff_worthy(self.wbc);
            self.metrics.record(category, diff_worthy);

            let Some((queue, queue_name)) = self.routes.category(category) else {
                continue;
            };
            if diff_worthy && let Some(diff) = &self.routes.diff {
                forward(diff, row.clone(), "diff")?;
            }
            forward(queue, row.clone(), queue_name)?;
            forward(&self.routes.results, row, "results")?;

            if !classification.snippets.is_empty()
                && let Some(snippets) = self.routes.snippets(category)
            {
                forward(snippets, classification.snippets, "snippets")?;
            }
        }
        Ok(())
    }
}

/// Start the classifier pool as one stage.
///
/// The stage resolves to the number of rows classified. `routes` is consumed:
/// once every worker has returned, all output queues close.
///
/// # Errors
/// Returns an error if the supervisor thread cannot be spawned.
pub fn spawn(
    classifier: Classifier,
    input: Receiver<Row>,
    routes: Routes,
    metrics: Arc<RunMetrics>,
    settings: PoolSettings,
) -> Result<StageHandle<u64>> {
    let classifier = Arc::new(classifier);
    StageHandle::spawn("classify", move || {
        let workers = settings.workers.max(1);
        info!("classifying with {workers} workers");
        let reporter = ThroughputReporter::with_counter(
            "filtered",
            settings.progress_interval,
            metrics.processed_counter(),
        );

        let outcome = thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|i| {
                    let worker = Worker {
                        classifier: Arc::clone(&classifier),
                        input: input.clone(),
                        routes: routes.clone(),
                        metrics: Arc::clone(&metrics),
                        wbc: settings.wbc,
                    };
                    thread::Builder::new()
                        .name(format!("classify-{i}"))
                        .spawn_scoped(scope, move || worker.run())
                        .with_context(|| format!("spawn classifier worker {i}"))
                })
                .collect();
            // workers own the only remaining senders from here on
            drop(routes);
            drop(input);

            let mut first_error = None;
            for (i, handle) in handles.into_iter().enumerate() {
                let result = match handle {
                    Ok(handle) => handle
                        .join()
                        .unwrap_or_else(|_| Err(anyhow::anyhow!("classifier worker {i} panicked"))),
                    Err(err) => Err(err),
                };
                debug!("classifier worker {i} finished");
                if let Err(err) = result {
                    first_error.get_or_insert(err);
                }
            }
            first_error.map_or(Ok(()), Err)
        });

        let total = reporter.stop();
        outcome.map(|()| total)
    })
}
