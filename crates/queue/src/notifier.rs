//! User-visible outcomes: acknowledgements, progress notices, deliveries and
//! error messages.

use std::{path::Path, sync::Arc};

use {
    async_trait::async_trait,
    tracing::{debug, info, warn},
};

use crate::{
    error::TransportError,
    job::{MediaKind, MessageRef, ReplyTarget, RequesterId},
};

pub const QUEUED_TEXT: &str = "✅ Task added to queue. Processing...";
pub const PROMPT_TEXT: &str = "Please include the URL in the message.";
pub const GENERIC_ERROR_TEXT: &str =
    "❌ Error when processing your request. Please try again or contact support.";
pub const VIDEO_CAPTION: &str = "🎬 Your video";
pub const AUDIO_CAPTION: &str = "🎵 Your audio";
pub const GREETING_TEXT: &str = "👋 Send me a link to a video and I'll send the file back.\n\n\
Add -a after the link to get just the audio, e.g.\n\
https://www.youtube.com/watch?v=... -a\n\n\
Works with YouTube, TikTok, Instagram, X (Twitter), Reddit, Vimeo and most other sites supported by yt-dlp.";

/// Outbound side of the chat platform.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_text(&self, to: &ReplyTarget, text: &str) -> Result<MessageRef, TransportError>;

    async fn send_video_file(
        &self,
        to: &ReplyTarget,
        path: &Path,
        caption: &str,
    ) -> Result<MessageRef, TransportError>;

    async fn send_audio_file(
        &self,
        to: &ReplyTarget,
        path: &Path,
        caption: &str,
    ) -> Result<MessageRef, TransportError>;

    async fn delete_message(
        &self,
        to: &ReplyTarget,
        message: &MessageRef,
    ) -> Result<(), TransportError>;
}

#[must_use]
pub fn progress_text(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Video => "⏳ Downloading video…",
        MediaKind::Audio => "⏳ Downloading audio…",
    }
}

/// Turns pipeline events into transport calls.
///
/// Transient notices (ack, progress, prompts) are best-effort: failures are
/// logged and swallowed. Only [`deliver`](Self::deliver) reports an error,
/// because a failed delivery is itself a job outcome.
#[derive(Clone)]
pub struct ResultNotifier {
    transport: Arc<dyn Transport>,
}

impl ResultNotifier {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub async fn notify_queued(&self, to: &ReplyTarget) -> Option<MessageRef> {
        self.send_best_effort(to, QUEUED_TEXT, "queued ack").await
    }

    pub async fn notify_progress(&self, to: &ReplyTarget, kind: MediaKind) -> Option<MessageRef> {
        self.send_best_effort(to, progress_text(kind), "progress notice")
            .await
    }

    /// Upload the finished file. This is the success notification.
    pub async fn deliver(
        &self,
        to: &ReplyTarget,
        file: &Path,
        kind: MediaKind,
    ) -> Result<(), TransportError> {
        match kind {
            MediaKind::Video => self.transport.send_video_file(to, file, VIDEO_CAPTION).await?,
            MediaKind::Audio => self.transport.send_audio_file(to, file, AUDIO_CAPTION).await?,
        };
        info!(chat_id = %to.chat_id, kind = %kind, file = %file.display(), "media delivered");
        Ok(())
    }

    /// Report a terminal failure.
    ///
    /// Direct chats see the detail; shared chats get a generic line so
    /// internal failure text is never posted where others can read it.
    pub async fn notify_error(&self, requester: &RequesterId, to: &ReplyTarget, detail: &str) {
        warn!(
            requester = %requester,
            chat_id = %to.chat_id,
            chat_type = %to.chat_type,
            error = detail,
            "job failed"
        );
        let text = if to.chat_type.is_shared() {
            GENERIC_ERROR_TEXT.to_string()
        } else {
            format!("❌ Error: {detail}")
        };
        if let Err(e) = self.transport.send_text(to, &text).await {
            warn!(chat_id = %to.chat_id, error = %e, "failed to send error notification");
        }
    }

    /// Delete a transient notice; missing or already-deleted messages are fine.
    pub async fn dismiss(&self, to: &ReplyTarget, message: &MessageRef) {
        if let Err(e) = self.transport.delete_message(to, message).await {
            debug!(chat_id = %to.chat_id, message_id = %message.0, error = %e, "could not dismiss notice");
        }
    }

    pub async fn prompt_for_url(&self, to: &ReplyTarget) {
        let _ = self.send_best_effort(to, PROMPT_TEXT, "url prompt").await;
    }

    pub async fn greet(&self, to: &ReplyTarget) {
        let _ = self.send_best_effort(to, GREETING_TEXT, "greeting").await;
    }

    async fn send_best_effort(&self, to: &ReplyTarget, text: &str, what: &str) -> Option<MessageRef> {
        match self.transport.send_text(to, text).await {
            Ok(message) => Some(message),
            Err(e) => {
                warn!(chat_id = %to.chat_id, error = %e, "failed to send {what}");
                None
            },
        }
    }
}
