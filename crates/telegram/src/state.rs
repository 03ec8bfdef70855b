use std::sync::Arc;

use linkdrop_queue::{AdmissionService, ResultNotifier};

/// Everything the inbound handlers need, shared with the polling task.
pub struct BotState {
    pub bot: teloxide::Bot,
    pub bot_username: Option<String>,
    pub admission: AdmissionService,
    pub notifier: ResultNotifier,
    /// Long-poll timeout passed to `getUpdates`, in seconds.
    pub poll_timeout_secs: u32,
}

pub type SharedState = Arc<BotState>;
