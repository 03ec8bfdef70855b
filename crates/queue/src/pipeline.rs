//! One job's lifecycle: download, optional conversion, delivery, cleanup.

use std::{
    any::Any,
    collections::BTreeSet,
    panic::AssertUnwindSafe,
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use {
    async_trait::async_trait,
    futures::FutureExt,
    linkdrop_config::PipelineConfig,
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use linkdrop_metrics::{counter, gauge, histogram, jobs as job_metrics, labels};

use crate::{
    dispatch::JobHandler,
    error::PipelineError,
    extract::{DownloadTarget, Extractor},
    job::{Job, JobId, MediaKind, RequesterId},
    notifier::ResultNotifier,
    transcode::{Transcoder, has_container},
};

/// Where a job is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Queued,
    Downloading,
    Converting,
    Delivering,
    CleaningUp,
    Done,
    Errored,
}

impl Stage {
    fn rank(self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::Downloading => 1,
            Self::Converting => 2,
            Self::Delivering => 3,
            Self::CleaningUp => 4,
            Self::Done | Self::Errored => 5,
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Errored)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Downloading => "downloading",
            Self::Converting => "converting",
            Self::Delivering => "delivering",
            Self::CleaningUp => "cleaning_up",
            Self::Done => "done",
            Self::Errored => "errored",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-job mutable state, owned by the runner executing it.
#[derive(Debug)]
pub struct PipelineContext {
    target: DownloadTarget,
    files: Vec<PathBuf>,
    stage: Stage,
    history: Vec<Stage>,
}

impl PipelineContext {
    #[must_use]
    pub fn new(target: DownloadTarget) -> Self {
        Self {
            target,
            files: Vec::new(),
            stage: Stage::Queued,
            history: vec![Stage::Queued],
        }
    }

    /// Move to `next`. Backward moves and moves out of a terminal stage are
    /// refused and return `false`.
    pub fn advance(&mut self, next: Stage) -> bool {
        if self.stage.is_terminal() || next.rank() <= self.stage.rank() {
            warn!(from = %self.stage, to = %next, "refused stage transition");
            return false;
        }
        debug!(from = %self.stage, stage = %next, "stage transition");
        self.stage = next;
        self.history.push(next);
        true
    }

    /// Record a file this job created so cleanup removes it.
    pub fn track(&mut self, path: PathBuf) {
        if !self.files.contains(&path) {
            self.files.push(path);
        }
    }

    #[must_use]
    pub fn target(&self) -> &DownloadTarget {
        &self.target
    }

    #[must_use]
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    #[must_use]
    pub fn history(&self) -> &[Stage] {
        &self.history
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    pub tmp_dir: PathBuf,
    /// Applies to video jobs only.
    pub max_video_duration_secs: u64,
    pub video_container: String,
}

impl PipelineSettings {
    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            tmp_dir: config.tmp_dir.clone(),
            max_video_duration_secs: config.max_video_duration_secs,
            video_container: config.video_container.clone(),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

/// Summary of a finished job.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub job_id: JobId,
    pub requester_id: RequesterId,
    pub stages: Vec<Stage>,
    pub outcome: Result<(), PipelineError>,
    pub elapsed: Duration,
}

impl JobReport {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Executes jobs end to end. Cheap to clone; one instance serves every job.
#[derive(Clone)]
pub struct PipelineRunner {
    extractor: Arc<dyn Extractor>,
    transcoder: Arc<dyn Transcoder>,
    notifier: ResultNotifier,
    settings: PipelineSettings,
}

impl PipelineRunner {
    pub fn new(
        extractor: Arc<dyn Extractor>,
        transcoder: Arc<dyn Transcoder>,
        notifier: ResultNotifier,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            extractor,
            transcoder,
            notifier,
            settings,
        }
    }

    /// Run `job` to a terminal stage.
    ///
    /// Never fails and never unwinds: every failure, including a panic in a
    /// stage, ends in cleanup followed by exactly one error notification.
    pub async fn run(&self, job: Job) -> JobReport {
        let started = Instant::now();
        let mut ctx = PipelineContext::new(DownloadTarget::for_job(
            &self.settings.tmp_dir,
            job.id,
            job.media_kind,
        ));

        #[cfg(feature = "metrics")]
        gauge!(job_metrics::IN_FLIGHT).increment(1.0);

        info!(
            job_id = %job.id,
            requester = %job.requester_id,
            kind = %job.media_kind,
            url = %job.url,
            "job started"
        );

        if let Some(ack) = &job.ack {
            self.notifier.dismiss(&job.reply_target, ack).await;
        }
        let progress = self
            .notifier
            .notify_progress(&job.reply_target, job.media_kind)
            .await;

        let outcome = match AssertUnwindSafe(self.execute(&job, &mut ctx))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(payload) => Err(PipelineError::internal(panic_message(&*payload))),
        };

        ctx.advance(Stage::CleaningUp);
        self.cleanup(&job, &ctx).await;
        if let Some(progress) = &progress {
            self.notifier.dismiss(&job.reply_target, progress).await;
        }

        match &outcome {
            Ok(()) => {
                ctx.advance(Stage::Done);
            },
            Err(error) => {
                ctx.advance(Stage::Errored);
                self.notifier
                    .notify_error(&job.requester_id, &job.reply_target, &error.to_string())
                    .await;
            },
        }

        let elapsed = started.elapsed();
        let outcome_label = match &outcome {
            Ok(()) => "success",
            Err(error) => error.kind(),
        };
        info!(
            job_id = %job.id,
            requester = %job.requester_id,
            outcome = outcome_label,
            elapsed_ms = elapsed.as_millis() as u64,
            "job finished"
        );

        #[cfg(feature = "metrics")]
        {
            gauge!(job_metrics::IN_FLIGHT).decrement(1.0);
            counter!(job_metrics::COMPLETED_TOTAL, labels::OUTCOME => outcome_label).increment(1);
            histogram!(job_metrics::DURATION_SECONDS, labels::MEDIA_KIND => job.media_kind.as_str())
                .record(elapsed.as_secs_f64());
        }

        JobReport {
            job_id: job.id,
            requester_id: job.requester_id,
            stages: ctx.history,
            outcome,
            elapsed,
        }
    }

    async fn execute(&self, job: &Job, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        ctx.advance(Stage::Downloading);

        let probe = self.extractor.probe(&job.url).await?;
        if !probe.available {
            return Err(PipelineError::ExtractionFailed {
                message: "media is not available".into(),
            });
        }
        if job.media_kind == MediaKind::Video
            && let Some(duration_secs) = probe.duration_secs
            && duration_secs > self.settings.max_video_duration_secs as f64
        {
            return Err(PipelineError::DurationExceeded {
                duration_secs,
                limit_secs: self.settings.max_video_duration_secs,
            });
        }

        let downloaded = self
            .extractor
            .fetch(&job.url, job.media_kind, ctx.target())
            .await?;
        ctx.track(downloaded.clone());
        debug!(job_id = %job.id, file = %downloaded.display(), "download complete");

        let deliverable = if job.media_kind == MediaKind::Video
            && !has_container(&downloaded, &self.settings.video_container)
        {
            ctx.advance(Stage::Converting);
            let output = ctx
                .target()
                .derived("converted", &self.settings.video_container);
            ctx.track(output.clone());
            self.transcoder.convert(&downloaded, &output).await?;
            output
        } else {
            downloaded
        };

        ctx.advance(Stage::Delivering);
        self.notifier
            .deliver(&job.reply_target, &deliverable, job.media_kind)
            .await?;
        Ok(())
    }

    /// Remove tracked files plus anything in the scratch directory carrying
    /// this job's stem. Failures are logged, never escalated.
    async fn cleanup(&self, job: &Job, ctx: &PipelineContext) {
        let target = ctx.target();
        let mut paths: BTreeSet<PathBuf> = ctx.files().iter().cloned().collect();

        match tokio::fs::read_dir(target.dir()).await {
            Ok(mut entries) => loop {
                match entries.next_entry().await {
                    Ok(Some(entry)) => {
                        let path = entry.path();
                        if target.owns(&path) {
                            paths.insert(path);
                        }
                    },
                    Ok(None) => break,
                    Err(e) => {
                        warn!(job_id = %job.id, error = %e, "failed to scan scratch directory");
                        break;
                    },
                }
            },
            Err(e) => {
                debug!(job_id = %job.id, dir = %target.dir().display(), error = %e, "scratch directory not readable");
            },
        }

        for path in paths {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!(job_id = %job.id, file = %path.display(), "removed temp file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
                Err(e) => {
                    warn!(job_id = %job.id, file = %path.display(), error = %e, "failed to remove temp file");
                    #[cfg(feature = "metrics")]
                    counter!(job_metrics::CLEANUP_FAILURES_TOTAL).increment(1);
                },
            }
        }
    }
}

#[async_trait]
impl JobHandler for PipelineRunner {
    async fn handle(&self, job: Job) {
        self.run(job).await;
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panic: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panic: {message}")
    } else {
        "panic in pipeline stage".to_string()
    }
}
