//! Metric names and label keys.

/// Job queue and pipeline metrics
pub mod jobs {
    /// Jobs accepted by admission and enqueued
    pub const ENQUEUED_TOTAL: &str = "linkdrop_jobs_enqueued_total";
    /// Jobs removed from the queue and handed to a pipeline
    pub const DISPATCHED_TOTAL: &str = "linkdrop_jobs_dispatched_total";
    /// Jobs that reached a terminal state, labelled by `outcome`
    pub const COMPLETED_TOTAL: &str = "linkdrop_jobs_completed_total";
    /// Pipelines currently running
    pub const IN_FLIGHT: &str = "linkdrop_jobs_in_flight";
    /// Jobs waiting in all per-requester queues
    pub const QUEUED: &str = "linkdrop_jobs_queued";
    /// Wall-clock time from dispatch to terminal state
    pub const DURATION_SECONDS: &str = "linkdrop_job_duration_seconds";
    /// Temp files that could not be removed
    pub const CLEANUP_FAILURES_TOTAL: &str = "linkdrop_cleanup_failures_total";
}

/// Admission filter metrics
pub mod admission {
    /// Inbound messages rejected before queueing, labelled by `reason`
    pub const REJECTED_TOTAL: &str = "linkdrop_admission_rejected_total";
}

/// Telegram transport metrics
pub mod telegram {
    /// Inbound messages received from getUpdates
    pub const MESSAGES_RECEIVED_TOTAL: &str = "linkdrop_telegram_messages_received_total";
    /// Bot API calls that hit a rate limit
    pub const RATE_LIMITED_TOTAL: &str = "linkdrop_telegram_rate_limited_total";
}

/// Common label keys
pub mod labels {
    pub const OUTCOME: &str = "outcome";
    pub const REASON: &str = "reason";
    pub const MEDIA_KIND: &str = "media_kind";
}

/// Histogram buckets
pub mod buckets {
    /// Job durations: downloads range from seconds to many minutes.
    pub const JOB_DURATION: [f64; 10] = [1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1200.0];
}
