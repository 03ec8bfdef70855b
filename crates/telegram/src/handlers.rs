use {
    teloxide::{
        prelude::*,
        types::{ChatKind, MediaKind, MessageKind, PublicChatKind},
    },
    tracing::debug,
};

use {
    linkdrop_common::ChatType,
    linkdrop_queue::{ReplyTarget, RequesterId},
};

#[cfg(feature = "metrics")]
use linkdrop_metrics::{counter, telegram as tg_metrics};

use crate::state::BotState;

/// Bot commands answered directly instead of being admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
}

/// Handle a single inbound Telegram message (called from the polling loop).
///
/// `/start` and `/help` get the greeting; everything else goes through
/// admission, which decides whether the text becomes a job.
pub async fn handle_message(msg: &Message, state: &BotState) {
    #[cfg(feature = "metrics")]
    counter!(tg_metrics::MESSAGES_RECEIVED_TOTAL).increment(1);

    let Some(text) = extract_text(msg) else {
        debug!(chat_id = msg.chat.id.0, "ignoring non-text message");
        return;
    };

    let target = ReplyTarget {
        chat_id: msg.chat.id.0.to_string(),
        message_id: Some(msg.id.0.to_string()),
        chat_type: classify_chat(msg),
    };

    if let Some(command) = parse_command(&text, state.bot_username.as_deref()) {
        debug!(chat_id = %target.chat_id, ?command, "command received");
        state.notifier.greet(&target).await;
        return;
    }

    let requester = requester_id(msg);
    match state.admission.admit(requester, &text, target).await {
        Ok(job_id) => debug!(chat_id = msg.chat.id.0, %job_id, "message admitted"),
        Err(rejection) => debug!(chat_id = msg.chat.id.0, reason = rejection.as_str(), "message not admitted"),
    }
}

/// Extract text content from a message, including media captions.
fn extract_text(msg: &Message) -> Option<String> {
    match &msg.kind {
        MessageKind::Common(common) => match &common.media_kind {
            MediaKind::Text(t) => Some(t.text.clone()),
            MediaKind::Photo(p) => p.caption.clone(),
            MediaKind::Document(d) => d.caption.clone(),
            MediaKind::Video(vid) => vid.caption.clone(),
            MediaKind::Animation(a) => a.caption.clone(),
            _ => None,
        },
        _ => None,
    }
}

/// Classify the chat type.
fn classify_chat(msg: &Message) -> ChatType {
    match msg.chat.kind {
        ChatKind::Private(_) => ChatType::Dm,
        ChatKind::Public(ref p) => match p.kind {
            PublicChatKind::Channel(_) => ChatType::Channel,
            _ => ChatType::Group,
        },
    }
}

/// The sending user, or the chat itself for anonymous channel posts.
fn requester_id(msg: &Message) -> RequesterId {
    match &msg.from {
        Some(user) => RequesterId::from(user.id.0),
        None => RequesterId::new(msg.chat.id.0.to_string()),
    }
}

/// Recognise `/start` and `/help`, optionally addressed as `/start@bot`.
/// Commands addressed to another bot are ignored.
fn parse_command(text: &str, bot_username: Option<&str>) -> Option<Command> {
    let first = text.split_whitespace().next()?;
    let name = first.strip_prefix('/')?;
    let (name, addressee) = match name.split_once('@') {
        Some((name, addressee)) => (name, Some(addressee)),
        None => (name, None),
    };
    if let Some(addressee) = addressee
        && !bot_username.is_some_and(|me| me.eq_ignore_ascii_case(addressee))
    {
        return None;
    }
    match name.to_ascii_lowercase().as_str() {
        "start" => Some(Command::Start),
        "help" => Some(Command::Help),
        _ => None,
    }
}
