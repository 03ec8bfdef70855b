//! The recurring scan that moves jobs from the queue store into the pool.

use std::{sync::Arc, time::Duration};

use {
    async_trait::async_trait,
    tokio_util::sync::CancellationToken,
    tracing::{debug, info},
};

#[cfg(feature = "metrics")]
use linkdrop_metrics::{counter, jobs as job_metrics};

use crate::{job::Job, pool::WorkerPool, store::QueueStore};

/// Consumer of dispatched jobs.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    async fn handle(&self, job: Job);
}

/// Advances every non-empty requester queue by one job per cycle.
pub struct Dispatcher {
    store: Arc<QueueStore>,
    handler: Arc<dyn JobHandler>,
    pool: WorkerPool,
    interval: Duration,
}

impl Dispatcher {
    pub fn new(
        store: Arc<QueueStore>,
        handler: Arc<dyn JobHandler>,
        pool: WorkerPool,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            handler,
            pool,
            interval,
        }
    }

    /// Run one cycle: drain at most one job per requester and spawn each.
    /// Returns the number of jobs dispatched.
    pub fn tick(&self) -> usize {
        let jobs = self.store.drain_cycle();
        let count = jobs.len();

        for job in jobs {
            debug!(
                job_id = %job.id,
                requester = %job.requester_id,
                queued_ms = (chrono::Utc::now() - job.enqueued_at).num_milliseconds(),
                "dispatching job"
            );
            let handler = Arc::clone(&self.handler);
            self.pool.spawn(async move { handler.handle(job).await });
        }

        #[cfg(feature = "metrics")]
        if count > 0 {
            counter!(job_metrics::DISPATCHED_TOTAL).increment(count as u64);
        }

        count
    }

    /// Tick every `interval` until `cancel` fires.
    ///
    /// Cancellation stops new dispatch only. Running jobs keep going; wait for
    /// them through the [`WorkerPool`].
    pub async fn run(&self, cancel: CancellationToken) {
        info!(interval_ms = self.interval.as_millis() as u64, "dispatch loop started");
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(self.interval) => {},
            }
            self.tick();
        }
        info!(pending = self.store.len(), "dispatch loop stopped");
    }

    #[must_use]
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }
}
