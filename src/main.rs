use anyhow::{Context, Result};
use clap::Parser;
use labsift::config::{SiftConfig, WbcPolicy};
use labsift::io::RowSource;
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

/// Select laboratory results for report generation and review.
///
/// Reads a CSV extract (from a file or stdin), writes per-category outputs,
/// and reports patients and result strings that are new since the last run.
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Input CSV extract; reads stdin when omitted
    input: Option<PathBuf>,

    /// JSON config file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for all output files
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Existing results.csv from the last run, used for the incremental diff
    #[arg(long, visible_alias = "old")]
    previous: Option<PathBuf>,

    /// Directory holding the last run's unique-string files (defaults to the output directory)
    #[arg(long)]
    previous_dir: Option<PathBuf>,

    /// Write every row to results.csv without classification
    #[arg(long)]
    no_filter: bool,

    /// Whether WBC rows count towards the incremental diff
    #[arg(long, value_enum, ignore_case = true)]
    wbc_diff: Option<WbcPolicy>,

    /// Classifier worker threads
    #[arg(short, long)]
    workers: Option<usize>,

    /// Capacity of each inter-stage queue
    #[arg(long)]
    queue_capacity: Option<usize>,

    /// Save a JSON run summary to this path
    #[arg(long)]
    metrics_file: Option<PathBuf>,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    print_config: bool,
}

impl Cli {
    fn into_config(self) -> Result<(SiftConfig, bool)> {
        let mut config = match &self.config {
            Some(path) => SiftConfig::from_file(path)?,
            None => SiftConfig::default(),
        };
        if let Some(input) = self.input {
            config.input = Some(input);
        }
        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }
        if let Some(previous) = self.previous {
            config.previous = Some(previous);
        }
        if let Some(dir) = self.previous_dir {
            config.previous_dir = Some(dir);
        }
        if self.no_filter {
            config.no_filter = true;
        }
        if let Some(policy) = self.wbc_diff {
            config.wbc_diff = policy;
        }
        if let Some(workers) = self.workers {
            config.workers = Some(workers);
        }
        if let Some(capacity) = self.queue_capacity {
            config.queue_capacity = capacity;
        }
        if let Some(path) = self.metrics_file {
            config.metrics_file = Some(path);
        }
        config.validate()?;
        Ok((config, self.print_config))
    }
}

fn try_main() -> Result<()> {
    let (config, print_config) = Cli::parse().into_config()?;
    if print_config {
        println!(
            "{}",
            serde_json::to_string_pretty(&config).context("serialize config")?
        );
        return Ok(());
    }

    let start = Instant::now();
    let source = match &config.input {
        Some(path) => RowSource::open(path)?,
        None => RowSource::stdin()?,
    };
    let summary = labsift::pipeline::run(&config, source)?;
    summary.log_summary();
    info!("finished in {:?}", start.elapsed());
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match try_main() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
