//! Run orchestration.
//!
//! [`run`] wires one row source through the stages and waits for all of them:
//!
//! ```text
//!                        ┌─> wbc / cpd / pdl1 / msi / results sinks
//! reader ─> classifier ──┼─> diff ─> results-increment sink   (+ new-ids)
//!                        ├─> pdl1 unique-string tracker
//!                        └─> msi unique-string tracker
//! ```
//!
//! With `no_filter` the classifier is replaced by a split stage that sends every
//! row to the results sink and to the diff.
//!
//! Everything that reads a previous run's files happens before any output is
//! opened, so a run may use its own output directory as the baseline. Stages
//! are joined in dependency order (reader, classifier, trackers, diff, sinks);
//! every stage is joined even after a failure and the first root-cause error is
//! returned.

use crate::classify::pool::{self, PoolSettings, Routes};
use crate::classify::{Category, Classifier};
use crate::config::SiftConfig;
use crate::diff::IncrementalDiff;
use crate::header::{Header, Row};
use crate::io::{RowSink, RowSource};
use crate::metrics::{RunMetrics, RunSummary, TrackerSummary};
use crate::progress::ThroughputReporter;
use crate::stage::{Completion, StageHandle, forward, queue};
use crate::store::RecordStore;
use crate::unique::UniqueStringTracker;
use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender};
use log::info;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Every emitted row (filter mode) or every row (no-filter mode).
pub const RESULTS_FILE: &str = "results.csv";
/// Rows passed through the incremental diff.
pub const INCREMENT_FILE: &str = "results-increment.csv";
/// Patients with at least one row missing from the baseline.
pub const NEW_IDS_FILE: &str = "new-ids.csv";

/// Tracker names; also the prefixes of their output files.
pub const PDL1_TRACKER: &str = "pdl1";
pub const MSI_TRACKER: &str = "msi";

/// Output file for a category's rows.
#[must_use]
pub fn category_file(category: Category) -> String {
    format!("{}.csv", category.name())
}

/// A sink stage and the file name it reports under.
struct SinkStage {
    file_name: String,
    handle: StageHandle<u64>,
}

fn spawn_sink(
    config: &SiftConfig,
    file_name: String,
    header: &Header,
) -> Result<(Sender<Row>, SinkStage)> {
    let (tx, rx) = queue(config.queue_capacity);
    let sink = RowSink::create(config.output_path(&file_name), header.names())?;
    let handle = sink.spawn(rx)?;
    Ok((tx, SinkStage { file_name, handle }))
}

/// Load the prior run's full output, if one is configured.
///
/// Returns `Ok(None)` when no diff should run.
fn load_baseline(config: &SiftConfig) -> Result<Option<Option<Arc<RecordStore>>>> {
    match &config.previous {
        Some(path) if path.is_file() => {
            let store = RecordStore::build_from_file(path, &config.load_settings())
                .with_context(|| format!("load baseline {}", path.display()))?;
            Ok(Some(Some(Arc::new(store))))
        }
        Some(path) => {
            info!(
                "no previous file {}, treating all as new",
                path.display()
            );
            Ok(Some(None))
        }
        None if config.diff_without_baseline => Ok(Some(None)),
        None => {
            info!("no previous file configured, skipping incremental diff");
            Ok(None)
        }
    }
}

/// Split stage for no-filter mode: every row goes to `results` and to `diff`.
fn spawn_split(
    input: Receiver<Row>,
    results: Sender<Row>,
    diff: Option<Sender<Row>>,
    metrics: Arc<RunMetrics>,
    config: &SiftConfig,
) -> Result<StageHandle<u64>> {
    let interval = config.progress_interval();
    StageHandle::spawn("split", move || {
        let reporter =
            ThroughputReporter::with_counter("processed", interval, metrics.processed_counter());
        for row in input {
            metrics.record_unfiltered();
            if let Some(diff) = &diff {
                forward(diff, row.clone(), "diff")?;
            }
            forward(&results, row, "results")?;
        }
        Ok(reporter.stop())
    })
}

/// Run one extract through classification, diffing and string tracking.
///
/// # Errors
/// Fails on an invalid config, a header missing a required or identifier
/// column, an unreadable baseline, or any stage error. Header problems are
/// reported before any output file is touched.
pub fn run(config: &SiftConfig, source: RowSource) -> Result<RunSummary> {
    config.validate()?;
    let header = source.header().clone();
    let metrics = Arc::new(RunMetrics::new());
    let settings = config.load_settings();

    let classifier = if config.no_filter {
        None
    } else {
        Some(Classifier::new(&header)?)
    };
    let diff = load_baseline(config)?
        .map(|baseline| IncrementalDiff::new(&header, baseline, &config.companion_columns))
        .transpose()?;
    let trackers = if config.no_filter {
        None
    } else {
        Some((
            UniqueStringTracker::from_baseline_file(PDL1_TRACKER, config.previous_dir(), &settings)?,
            UniqueStringTracker::from_baseline_file(MSI_TRACKER, config.previous_dir(), &settings)?,
        ))
    };

    info!("writing outputs to {}", config.output_dir.display());
    let mut sinks = Vec::new();
    let (results_tx, stage) = spawn_sink(config, RESULTS_FILE.to_string(), &header)?;
    sinks.push(stage);

    let mut diff_stage = None;
    let diff_tx = match diff {
        Some(diff) => {
            let (increment_tx, stage) = spawn_sink(config, INCREMENT_FILE.to_string(), &header)?;
            sinks.push(stage);
            let (tx, rx) = queue(config.queue_capacity);
            diff_stage = Some(diff.spawn(rx, Some(increment_tx), config.output_path(NEW_IDS_FILE))?);
            Some(tx)
        }
        None => None,
    };

    let (rows_tx, rows_rx) = queue(config.queue_capacity);
    let mut tracker_stages = Vec::new();
    let process_stage = match (classifier, trackers) {
        (Some(classifier), Some((pdl1, msi))) => {
            let mut category_sink = |category: Category| -> Result<Sender<Row>> {
                let (tx, stage) = spawn_sink(config, category_file(category), &header)?;
                sinks.push(stage);
                Ok(tx)
            };
            let wbc = category_sink(Category::Wbc)?;
            let cpd = category_sink(Category::Cpd)?;
            let pdl1_rows = category_sink(Category::PdL1)?;
            let msi_rows = category_sink(Category::Msi)?;
            let (pdl1_tx, pdl1_rx) = queue(config.queue_capacity);
            let (msi_tx, msi_rx) = queue(config.queue_capacity);
            tracker_stages.push((PDL1_TRACKER, pdl1.spawn(pdl1_rx, config.output_dir.clone())?));
            tracker_stages.push((MSI_TRACKER, msi.spawn(msi_rx, config.output_dir.clone())?));

            let routes = Routes {
                results: results_tx,
                wbc,
                cpd,
                pdl1: pdl1_rows,
                msi: msi_rows,
                diff: diff_tx,
                pdl1_snippets: pdl1_tx,
                msi_snippets: msi_tx,
            };
            pool::spawn(
                classifier,
                rows_rx,
                routes,
                Arc::clone(&metrics),
                PoolSettings {
                    workers: config.classifier_workers(),
                    wbc: config.wbc_diff,
                    progress_interval: config.progress_interval(),
                },
            )?
        }
        _ => spawn_split(rows_rx, results_tx, diff_tx, Arc::clone(&metrics), config)?,
    };
    let reader = source.spawn(rows_tx, config.progress_interval())?;

    let mut completion = Completion::default();
    let rows_read = completion.record(reader.join()).unwrap_or(0);
    completion.record(process_stage.join());
    let mut tracked: BTreeMap<&str, TrackerSummary> = BTreeMap::new();
    for (name, stage) in tracker_stages {
        if let Some(summary) = completion.record(stage.join()) {
            tracked.insert(name, summary);
        }
    }
    let new_identifiers = diff_stage.and_then(|stage| completion.record(stage.join()));
    let mut written = BTreeMap::new();
    for SinkStage { file_name, handle } in sinks {
        if let Some(n) = completion.record(handle.join()) {
            written.insert(file_name, n);
        }
    }
    completion.finish()?;

    let categories = if config.no_filter {
        BTreeMap::new()
    } else {
        Category::ALL
            .iter()
            .map(|&c| (c, metrics.count(c)))
            .collect()
    };
    let summary = RunSummary {
        rows_read,
        processed: metrics.processed(),
        categories,
        diff_worthy: metrics.diff_worthy(),
        new_identifiers,
        written,
        pdl1: tracked.get(PDL1_TRACKER).copied(),
        msi: tracked.get(MSI_TRACKER).copied(),
        elapsed_ms: u64::try_from(metrics.elapsed().as_millis()).unwrap_or(u64::MAX),
    };
    if let Some(path) = &config.metrics_file {
        summary.save_to_file(path)?;
    }
    Ok(summary)
}
