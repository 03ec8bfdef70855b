//! Spawning of pipeline executions with an optional concurrency ceiling.

use std::{future::Future, sync::Arc, time::Duration};

use {
    tokio::sync::Semaphore,
    tokio_util::task::TaskTracker,
    tracing::{info, warn},
};

/// How many pipelines may run at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcurrencyLimit {
    Unbounded,
    Max(usize),
}

impl ConcurrencyLimit {
    /// `0` means unbounded.
    #[must_use]
    pub fn from_max_in_flight(max: usize) -> Self {
        match max {
            0 => Self::Unbounded,
            n => Self::Max(n),
        }
    }
}

/// Tracks every spawned execution so shutdown can wait for them.
///
/// With [`ConcurrencyLimit::Max`] each task waits for a permit inside its own
/// task, so [`spawn`](Self::spawn) never blocks the caller.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    tracker: TaskTracker,
    permits: Option<Arc<Semaphore>>,
}

impl WorkerPool {
    #[must_use]
    pub fn new(limit: ConcurrencyLimit) -> Self {
        Self {
            tracker: TaskTracker::new(),
            permits: match limit {
                ConcurrencyLimit::Unbounded => None,
                ConcurrencyLimit::Max(n) => Some(Arc::new(Semaphore::new(n))),
            },
        }
    }

    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permits = self.permits.clone();
        self.tracker.spawn(async move {
            let _permit = match permits {
                Some(semaphore) => match semaphore.acquire_owned().await {
                    Ok(permit) => Some(permit),
                    // Closed semaphore: run anyway rather than drop the job.
                    Err(_) => None,
                },
                None => None,
            };
            task.await;
        });
    }

    /// Spawned tasks that have not finished, including those waiting for a
    /// permit.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Close the pool and wait up to `grace` for the
    /// remaining tasks. Returns `true` if everything finished in time.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.tracker.close();
        let remaining = self.tracker.len();
        if remaining > 0 {
            info!(remaining, grace_secs = grace.as_secs(), "waiting for in-flight jobs");
        }
        match tokio::time::timeout(grace, self.tracker.wait()).await {
            Ok(()) => true,
            Err(_) => {
                warn!(remaining = self.tracker.len(), "in-flight jobs still running after grace period");
                false
            },
        }
    }
}
