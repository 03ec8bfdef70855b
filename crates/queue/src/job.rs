use std::fmt;

use {
    chrono::{DateTime, Utc},
    linkdrop_common::ChatType,
    uuid::Uuid,
};

/// Unique id assigned at admission, used for log correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(Uuid);

impl JobId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Short form used in temp file names.
    #[must_use]
    pub fn simple(&self) -> String {
        self.0.simple().to_string()
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identity of the user who asked for a job; the fairness key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequesterId(String);

impl RequesterId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RequesterId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<u64> for RequesterId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for RequesterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Video,
    Audio,
}

impl MediaKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Platform message id of something the bot sent (or received).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageRef(pub String);

/// Where notifications for a job go.
///
/// Opaque to the queue; only the transport interprets `chat_id` and
/// `message_id`. `chat_type` decides how much error detail is shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyTarget {
    pub chat_id: String,
    /// The originating message, replied to when the transport supports it.
    pub message_id: Option<String>,
    pub chat_type: ChatType,
}

/// One admitted download-and-deliver request. Never mutated after creation.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub requester_id: RequesterId,
    pub url: String,
    pub media_kind: MediaKind,
    pub reply_target: ReplyTarget,
    /// The "queued" acknowledgement, dismissed once processing starts.
    pub ack: Option<MessageRef>,
    pub enqueued_at: DateTime<Utc>,
}

impl Job {
    #[must_use]
    pub fn new(
        requester_id: RequesterId,
        url: impl Into<String>,
        media_kind: MediaKind,
        reply_target: ReplyTarget,
        ack: Option<MessageRef>,
    ) -> Self {
        Self {
            id: JobId::new(),
            requester_id,
            url: url.into(),
            media_kind,
            reply_target,
            ack,
            enqueued_at: Utc::now(),
        }
    }
}
