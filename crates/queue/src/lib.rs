//! Request queueing and pipeline execution for linkdrop.
//!
//! Inbound chat messages pass the [`AdmissionFilter`] and become [`Job`]s in
//! the per-requester [`QueueStore`]. The [`Dispatcher`] wakes on a fixed
//! interval, takes at most one job from every non-empty queue and hands each
//! to the [`WorkerPool`], where a [`PipelineRunner`] downloads, optionally
//! converts, delivers and cleans up. The [`ResultNotifier`] turns every
//! terminal state into exactly one user-visible outcome.

pub mod admission;
pub mod dispatch;
pub mod error;
pub mod extract;
pub mod job;
pub mod notifier;
pub mod pipeline;
pub mod pool;
pub mod store;
pub mod transcode;

pub use {
    admission::{Admitted, AdmissionFilter, AdmissionService},
    dispatch::{Dispatcher, JobHandler},
    error::{ConvertError, ExtractError, PipelineError, Rejection, TransportError},
    extract::{DownloadTarget, Extractor, Probe},
    job::{Job, JobId, MediaKind, MessageRef, ReplyTarget, RequesterId},
    notifier::{ResultNotifier, Transport},
    pipeline::{JobReport, PipelineContext, PipelineRunner, PipelineSettings, Stage},
    pool::{ConcurrencyLimit, WorkerPool},
    store::QueueStore,
    transcode::Transcoder,
};
