//! Best-effort background work.
//!
//! Handlers hand off work that must not hold up their result (cache
//! write-backs). A failed task is logged and goes nowhere else. The host
//! may `settle()` to wait for everything outstanding, the way an event is
//! kept alive until its registered promises finish. Dropping the last
//! handle aborts whatever is still running.

use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::task::JoinSet;
use tracing::{trace, warn};

use crate::WorkerError;

/// A set of detached tasks owned by one worker.
#[derive(Debug, Clone, Default)]
pub struct BackgroundTasks {
    set: Arc<Mutex<JoinSet<()>>>,
}

impl BackgroundTasks {
    /// Create an empty task set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a task. Must be called from within a Tokio runtime.
    pub fn spawn<F>(&self, label: &'static str, task: F)
    where
        F: Future<Output = Result<(), WorkerError>> + Send + 'static,
    {
        let mut set = self.set.lock().unwrap_or_else(|e| e.into_inner());

        // Reap whatever already finished so the set does not grow unbounded.
        while let Some(done) = set.try_join_next() {
            log_join(done);
        }

        set.spawn(async move {
            match task.await {
                Ok(()) => trace!(task = label, "Background task finished"),
                Err(e) => warn!(task = label, error = %e, "Background task failed"),
            }
        });
    }

    /// Number of tasks not yet reaped.
    pub fn pending(&self) -> usize {
        self.set.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Wait until every task (including ones spawned meanwhile) is done.
    pub async fn settle(&self) {
        loop {
            let mut batch = {
                let mut set = self.set.lock().unwrap_or_else(|e| e.into_inner());
                std::mem::take(&mut *set)
            };
            if batch.is_empty() {
                break;
            }
            while let Some(done) = batch.join_next().await {
                log_join(done);
            }
        }
    }
}

fn log_join(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            warn!(error = %e, "Background task panicked");
        }
    }
}
