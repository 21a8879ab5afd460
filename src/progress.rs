//! Periodic throughput logging for long-running stages.
//!
//! A [`ThroughputReporter`] owns a shared counter that worker threads bump with
//! a relaxed atomic increment. A background thread samples it on a fixed
//! interval and logs the running total until [`stop`](ThroughputReporter::stop)
//! is called or the reporter is dropped.

use crossbeam_channel::{Sender, select, tick};
use log::info;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Default sampling interval.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);

/// Logs `"<label> N records"` every interval while a stage runs.
pub struct ThroughputReporter {
    label: String,
    counter: Arc<AtomicU64>,
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ThroughputReporter {
    /// Start a reporter with a fresh counter.
    #[must_use]
    pub fn start(label: impl Into<String>, interval: Duration) -> Self {
        Self::with_counter(label, interval, Arc::new(AtomicU64::new(0)))
    }

    /// Start a reporter that samples an existing counter.
    #[must_use]
    pub fn with_counter(
        label: impl Into<String>,
        interval: Duration,
        counter: Arc<AtomicU64>,
    ) -> Self {
        let label = label.into();
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let ticker = tick(interval.max(Duration::from_millis(1)));
        let sampled = Arc::clone(&counter);
        let thread_label = label.clone();
        let handle = thread::spawn(move || {
            loop {
                select! {
                    recv(stop_rx) -> _ => break,
                    recv(ticker) -> _ => {
                        info!("{thread_label} {} records", sampled.load(Ordering::Relaxed));
                    }
                }
            }
        });
        Self {
            label,
            counter,
            stop: Some(stop_tx),
            handle: Some(handle),
        }
    }

    /// Shared counter for workers to increment.
    #[must_use]
    pub fn counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.counter)
    }

    #[must_use]
    pub fn count(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }

    /// Stop sampling, log the total, and return it.
    pub fn stop(mut self) -> u64 {
        self.shutdown();
        let total = self.count();
        info!("total {}: {total} records", self.label);
        total
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            // the sampler may already be gone; dropping the sender wakes it either way
            stop.send(()).ok();
        }
        if let Some(handle) = self.handle.take() {
            handle.join().ok();
        }
    }
}

impl Drop for ThroughputReporter {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_returns_final_count() {
        let reporter = ThroughputReporter::start("test", Duration::from_millis(5));
        let counter = reporter.counter();
        for _ in 0..42 {
            counter.fetch_add(1, Ordering::Relaxed);
        }
        thread::sleep(Duration::from_millis(20));
        assert_eq!(reporter.stop(), 42);
    }

    #[test]
    fn drop_without_stop_does_not_hang() {
        let reporter = ThroughputReporter::start("dropped", Duration::from_secs(60));
        drop(reporter);
    }
}
