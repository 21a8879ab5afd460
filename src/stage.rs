//! Bounded queues and stage threads.
//!
//! Every pipeline stage runs on its own named thread and talks to its
//! neighbours through bounded [`crossbeam_channel`] queues. A producer blocks
//! when its downstream queue is full and a consumer blocks when its upstream
//! queue is empty; a queue closes once every sender has been dropped.
//!
//! Completion is explicit: each stage returns a [`StageHandle`] whose
//! [`join`](StageHandle::join) yields the stage's result. [`Completion`]
//! collects those results in the order the caller joins them and keeps the most
//! informative error.

use crate::error::SiftError;
use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender};
use log::debug;
use std::thread::{self, JoinHandle};

/// Create a bounded multi-producer, multi-consumer queue.
///
/// A capacity of zero is raised to one so that a queue always buffers.
#[must_use]
pub fn queue<T>(capacity: usize) -> (Sender<T>, Receiver<T>) {
    crossbeam_channel::bounded(capacity.max(1))
}

/// Push `item` downstream, blocking while the queue is full.
///
/// # Errors
/// Returns [`SiftError::Disconnected`] if every receiver has gone away, which
/// only happens when the consuming stage already failed.
pub fn forward<T>(tx: &Sender<T>, item: T, queue: &str) -> Result<(), SiftError> {
    tx.send(item)
        .map_err(|_| SiftError::Disconnected(queue.to_string()))
}

/// Handle to a running stage thread.
pub struct StageHandle<T> {
    name: String,
    handle: JoinHandle<Result<T>>,
}

impl<T: Send + 'static> StageHandle<T> {
    /// Run `work` on a new thread named after the stage.
    ///
    /// # Errors
    /// Returns an error if the OS refuses to spawn the thread.
    pub fn spawn<F>(name: impl Into<String>, work: F) -> Result<Self>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let name = name.into();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(work)
            .with_context(|| format!("spawn stage '{name}'"))?;
        debug!("started stage '{name}'");
        Ok(Self { name, handle })
    }

    /// Block until the stage finishes and return its result.
    ///
    /// # Errors
    /// Returns the stage's own error with the stage name attached, or
    /// [`SiftError::StagePanicked`] if the thread panicked.
    pub fn join(self) -> Result<T> {
        let Self { name, handle } = self;
        match handle.join() {
            Ok(result) => result.with_context(|| format!("stage '{name}' failed")),
            Err(_) => Err(SiftError::StagePanicked(name).into()),
        }
    }
}

/// Accumulates stage results, keeping the first root-cause error.
///
/// A failing stage drops its queues, so its neighbours fail next with
/// [`SiftError::Disconnected`]. Those follow-on errors are only kept when
/// nothing better was seen.
#[derive(Default)]
pub struct Completion {
    error: Option<anyhow::Error>,
}

impl Completion {
    /// Record one stage result; returns the value on success.
    pub fn record<T>(&mut self, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                let replace = self
                    .error
                    .as_ref()
                    .is_none_or(|current| is_follow_on(current) && !is_follow_on(&err));
                if replace {
                    self.error = Some(err);
                } else {
                    debug!("suppressed follow-on stage error: {err:#}");
                }
                None
            }
        }
    }

    /// Finish collecting and surface the retained error, if any.
    ///
    /// # Errors
    /// Returns the first root-cause error recorded.
    pub fn finish(self) -> Result<()> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn is_follow_on(err: &anyhow::Error) -> bool {
    err.downcast_ref::<SiftError>()
        .is_some_and(SiftError::is_follow_on)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn root_cause_beats_disconnect() {
        let mut completion = Completion::default();
        completion.record::<()>(Err(SiftError::Disconnected("rows".into()).into()));
        completion.record::<()>(Err(anyhow!("disk full")));
        completion.record::<()>(Err(anyhow!("later failure")));
        let err = completion.finish().unwrap_err();
        assert_eq!(err.to_string(), "disk full");
    }

    #[test]
    fn join_reports_stage_panic() {
        let stage = StageHandle::<()>::spawn("boom", || panic!("boom")).unwrap();
        let err = stage.join().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SiftError>(),
            Some(SiftError::StagePanicked(name)) if name == "boom"
        ));
    }

    #[test]
    fn forward_after_consumer_drop_is_disconnect() {
        let (tx, rx) = queue::<u8>(1);
        drop(rx);
        assert!(matches!(
            forward(&tx, 1, "test"),
            Err(SiftError::Disconnected(name)) if name == "test"
        ));
    }
}
