//! Metrics for the linkdrop job queue.
//!
//! Call sites record through the `metrics` facade macros re-exported here;
//! without an installed recorder they are no-ops. The `prometheus` feature adds
//! a scrape endpoint.
//!
//! ```rust,ignore
//! use linkdrop_metrics::{counter, jobs};
//!
//! counter!(jobs::ENQUEUED_TOTAL).increment(1);
//! ```

mod definitions;
mod recorder;

pub use {
    definitions::*,
    recorder::{MetricsRecorderConfig, init_metrics},
};

pub use metrics::{counter, gauge, histogram};
