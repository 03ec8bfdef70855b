use std::{
    future::Future,
    path::{Path, PathBuf},
    time::Duration,
};

use {
    async_trait::async_trait,
    teloxide::{
        RequestError,
        payloads::{SendAudioSetters, SendMessageSetters, SendVideoSetters},
        prelude::*,
        types::{ChatId, InputFile, MessageId, ReplyParameters},
    },
    tracing::{info, warn},
};

use linkdrop_queue::{MessageRef, ReplyTarget, Transport, TransportError};

#[cfg(feature = "metrics")]
use linkdrop_metrics::{counter, telegram as tg_metrics};

const TELEGRAM_RETRY_AFTER_MAX_RETRIES: usize = 4;

/// Outbound message sender for Telegram.
#[derive(Clone)]
pub struct TelegramOutbound {
    bot: Bot,
    reply_to_message: bool,
}

impl TelegramOutbound {
    #[must_use]
    pub fn new(bot: Bot, reply_to_message: bool) -> Self {
        Self {
            bot,
            reply_to_message,
        }
    }

    /// Build reply parameters only when `reply_to_message` is enabled.
    fn reply_params(&self, to: &ReplyTarget) -> Option<ReplyParameters> {
        if self.reply_to_message {
            parse_reply_params(to.message_id.as_deref())
        } else {
            None
        }
    }

    async fn run_telegram_request_with_retry<T, F, Fut>(
        &self,
        to: &str,
        operation: &'static str,
        mut request: F,
    ) -> Result<T, TransportError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RequestError>>,
    {
        let mut retries = 0usize;

        loop {
            match request().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let Some(wait) = retry_after_duration(&err) else {
                        return Err(TransportError::external(operation, err));
                    };

                    #[cfg(feature = "metrics")]
                    counter!(tg_metrics::RATE_LIMITED_TOTAL).increment(1);

                    if retries >= TELEGRAM_RETRY_AFTER_MAX_RETRIES {
                        warn!(
                            chat_id = to,
                            operation,
                            retries,
                            retry_after_secs = wait.as_secs(),
                            "telegram rate limit persisted after retries"
                        );
                        return Err(TransportError::external(operation, err));
                    }

                    retries += 1;
                    warn!(
                        chat_id = to,
                        operation,
                        retries,
                        max_retries = TELEGRAM_RETRY_AFTER_MAX_RETRIES,
                        retry_after_secs = wait.as_secs(),
                        "telegram rate limited, waiting before retry"
                    );
                    tokio::time::sleep(wait).await;
                },
            }
        }
    }
}

fn chat_id(to: &ReplyTarget) -> Result<ChatId, TransportError> {
    to.chat_id
        .parse::<i64>()
        .map(ChatId)
        .map_err(|e| TransportError::external("invalid chat id", e))
}

/// Parse a platform message ID string into Telegram `ReplyParameters`.
/// Returns `None` if the string is not a valid i32 (Telegram message IDs are i32).
fn parse_reply_params(reply_to: Option<&str>) -> Option<ReplyParameters> {
    reply_to
        .and_then(|id| id.parse::<i32>().ok())
        .map(|id| ReplyParameters::new(MessageId(id)).allow_sending_without_reply())
}

fn retry_after_duration(error: &RequestError) -> Option<Duration> {
    match error {
        RequestError::RetryAfter(wait) => Some(wait.duration()),
        _ => None,
    }
}

fn message_ref(message: &Message) -> MessageRef {
    MessageRef(message.id.0.to_string())
}

#[async_trait]
impl Transport for TelegramOutbound {
    async fn send_text(&self, to: &ReplyTarget, text: &str) -> Result<MessageRef, TransportError> {
        let chat_id = chat_id(to)?;
        let rp = self.reply_params(to);

        let message = self
            .run_telegram_request_with_retry(&to.chat_id, "send message", || {
                let mut req = self.bot.send_message(chat_id, text);
                if let Some(rp) = &rp {
                    req = req.reply_parameters(rp.clone());
                }
                async move { req.await }
            })
            .await?;
        Ok(message_ref(&message))
    }

    async fn send_video_file(
        &self,
        to: &ReplyTarget,
        path: &Path,
        caption: &str,
    ) -> Result<MessageRef, TransportError> {
        let chat_id = chat_id(to)?;
        let rp = self.reply_params(to);
        let file: PathBuf = path.to_path_buf();

        let message = self
            .run_telegram_request_with_retry(&to.chat_id, "send video", || {
                let mut req = self
                    .bot
                    .send_video(chat_id, InputFile::file(file.clone()))
                    .caption(caption)
                    .supports_streaming(true);
                if let Some(rp) = &rp {
                    req = req.reply_parameters(rp.clone());
                }
                async move { req.await }
            })
            .await?;
        info!(chat_id = %to.chat_id, file = %path.display(), "telegram outbound video sent");
        Ok(message_ref(&message))
    }

    async fn send_audio_file(
        &self,
        to: &ReplyTarget,
        path: &Path,
        caption: &str,
    ) -> Result<MessageRef, TransportError> {
        let chat_id = chat_id(to)?;
        let rp = self.reply_params(to);
        let file: PathBuf = path.to_path_buf();

        let message = self
            .run_telegram_request_with_retry(&to.chat_id, "send audio", || {
                let mut req = self
                    .bot
                    .send_audio(chat_id, InputFile::file(file.clone()))
                    .caption(caption);
                if let Some(rp) = &rp {
                    req = req.reply_parameters(rp.clone());
                }
                async move { req.await }
            })
            .await?;
        info!(chat_id = %to.chat_id, file = %path.display(), "telegram outbound audio sent");
        Ok(message_ref(&message))
    }

    async fn delete_message(
        &self,
        to: &ReplyTarget,
        message: &MessageRef,
    ) -> Result<(), TransportError> {
        let chat_id = chat_id(to)?;
        let message_id = message
            .0
            .parse::<i32>()
            .map(MessageId)
            .map_err(|e| TransportError::external("invalid message id", e))?;

        self.run_telegram_request_with_retry(&to.chat_id, "delete message", || {
            let req = self.bot.delete_message(chat_id, message_id);
            async move { req.await }
        })
        .await?;
        Ok(())
    }
}
