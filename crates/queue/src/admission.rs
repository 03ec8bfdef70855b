//! Gatekeeping for inbound messages: URL extraction, site policy and the
//! audio modifier.

use std::sync::Arc;

use {
    linkdrop_config::SitePolicy,
    regex::Regex,
    tracing::{debug, info},
};

#[cfg(feature = "metrics")]
use linkdrop_metrics::{admission as admission_metrics, counter, labels};

use crate::{
    error::Rejection,
    job::{Job, JobId, MediaKind, ReplyTarget, RequesterId},
    notifier::ResultNotifier,
    store::QueueStore,
};

const URL_PATTERN: &str = r"https?://\S+";

/// What a message asks for once it passes the filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admitted {
    pub url: String,
    pub media_kind: MediaKind,
}

/// Pure classification of message text. No side effects.
#[derive(Debug, Clone)]
pub struct AdmissionFilter {
    policy: SitePolicy,
    audio_flag: String,
    url_pattern: Regex,
}

impl AdmissionFilter {
    pub fn new(policy: SitePolicy, audio_flag: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            policy,
            audio_flag: audio_flag.trim().to_lowercase(),
            url_pattern: Regex::new(URL_PATTERN)?,
        })
    }

    /// Classify `text`.
    ///
    /// The first `http(s)://` run is the URL. The allow-list is checked
    /// before the block-list.
    pub fn check(&self, text: &str) -> Result<Admitted, Rejection> {
        let url = self
            .url_pattern
            .find(text)
            .map(|m| m.as_str().to_string())
            .ok_or(Rejection::NoUrlFound)?;

        if !self.policy.is_allowed(&url) {
            return Err(Rejection::NotAllowed);
        }
        if self.policy.is_blocked(&url) {
            return Err(Rejection::Blocked);
        }

        Ok(Admitted {
            url,
            media_kind: self.media_kind(text),
        })
    }

    fn media_kind(&self, text: &str) -> MediaKind {
        let wants_audio = !self.audio_flag.is_empty()
            && text
                .split_whitespace()
                .any(|token| token.to_lowercase() == self.audio_flag);
        if wants_audio {
            MediaKind::Audio
        } else {
            MediaKind::Video
        }
    }
}

/// Admission with side effects: acknowledgement, job creation, enqueue.
#[derive(Clone)]
pub struct AdmissionService {
    filter: Arc<AdmissionFilter>,
    store: Arc<QueueStore>,
    notifier: ResultNotifier,
}

impl AdmissionService {
    pub fn new(filter: AdmissionFilter, store: Arc<QueueStore>, notifier: ResultNotifier) -> Self {
        Self {
            filter: Arc::new(filter),
            store,
            notifier,
        }
    }

    /// Admit `text` from `requester`, enqueueing a job on success.
    ///
    /// A message without a URL prompts the sender in a direct chat and is
    /// ignored elsewhere. Policy rejections are always silent.
    pub async fn admit(
        &self,
        requester: RequesterId,
        text: &str,
        reply_target: ReplyTarget,
    ) -> Result<JobId, Rejection> {
        let admitted = match self.filter.check(text) {
            Ok(admitted) => admitted,
            Err(rejection) => {
                debug!(
                    requester = %requester,
                    chat_id = %reply_target.chat_id,
                    reason = rejection.as_str(),
                    "message rejected"
                );
                #[cfg(feature = "metrics")]
                counter!(admission_metrics::REJECTED_TOTAL, labels::REASON => rejection.as_str())
                    .increment(1);

                if rejection == Rejection::NoUrlFound && !reply_target.chat_type.is_shared() {
                    self.notifier.prompt_for_url(&reply_target).await;
                }
                return Err(rejection);
            },
        };

        let ack = self.notifier.notify_queued(&reply_target).await;
        let job = Job::new(
            requester,
            admitted.url,
            admitted.media_kind,
            reply_target,
            ack,
        );
        let id = job.id;
        info!(
            job_id = %id,
            requester = %job.requester_id,
            kind = %job.media_kind,
            url = %job.url,
            "job admitted"
        );
        self.store.enqueue(job);
        Ok(id)
    }

    #[must_use]
    pub fn store(&self) -> &Arc<QueueStore> {
        &self.store
    }
}
