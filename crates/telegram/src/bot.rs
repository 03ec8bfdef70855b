use std::time::Duration;

use {
    linkdrop_config::TelegramConfig,
    secrecy::ExposeSecret,
    teloxide::{
        ApiError, RequestError,
        prelude::*,
        types::{AllowedUpdate, BotCommand, UpdateKind},
    },
    tokio::task::JoinHandle,
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

use crate::{error::Result, handlers, state::SharedState};

/// A bot whose credentials have been verified.
pub struct ConnectedBot {
    pub bot: Bot,
    pub username: Option<String>,
}

/// Verify the token, clear any webhook so long polling works, and register
/// the command list.
pub async fn connect(config: &TelegramConfig) -> Result<ConnectedBot> {
    // Client timeout must outlast the long-poll timeout or every idle poll
    // would abort before Telegram answers.
    let client = teloxide::net::default_reqwest_settings()
        .timeout(Duration::from_secs(u64::from(config.poll_timeout_secs) + 15))
        .build()?;
    let bot = Bot::with_client(config.token.expose_secret(), client);

    let me = bot.get_me().await?;
    let username = me.username.clone();

    bot.delete_webhook().send().await?;

    let commands = vec![
        BotCommand::new("start", "How to use this bot"),
        BotCommand::new("help", "How to use this bot"),
    ];
    if let Err(e) = bot.set_my_commands(commands).await {
        warn!("failed to register bot commands: {e}");
    }

    info!(username = ?username, "telegram bot connected (webhook cleared)");
    Ok(ConnectedBot { bot, username })
}

/// Spawn the manual `getUpdates` loop.
///
/// Runs until `cancel` fires. If another instance is polling with the same
/// token the loop cancels `cancel` itself so the process shuts down.
pub fn spawn_polling(state: SharedState, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("starting telegram polling loop");
        let mut offset: i32 = 0;

        loop {
            let request = state
                .bot
                .get_updates()
                .offset(offset)
                .timeout(state.poll_timeout_secs)
                .allowed_updates(vec![AllowedUpdate::Message]);

            let result = tokio::select! {
                () = cancel.cancelled() => break,
                result = request.send() => result,
            };

            match result {
                Ok(updates) => {
                    debug!(count = updates.len(), "got telegram updates");
                    for update in updates {
                        offset = update.id.as_offset();
                        match update.kind {
                            UpdateKind::Message(msg) => {
                                debug!(chat_id = msg.chat.id.0, "received telegram message");
                                handlers::handle_message(&msg, &state).await;
                            },
                            other => {
                                debug!("ignoring non-message update: {other:?}");
                            },
                        }
                    }
                },
                Err(e) => {
                    if is_conflict(&e) {
                        error!(
                            "telegram polling stopped: another instance is already running with this token"
                        );
                        cancel.cancel();
                        break;
                    }

                    warn!(error = %e, "telegram getUpdates failed");
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(Duration::from_secs(5)) => {},
                    }
                },
            }
        }
        info!("telegram polling stopped");
    })
}

/// Another bot instance is running with the same token.
fn is_conflict(error: &RequestError) -> bool {
    matches!(error, RequestError::Api(ApiError::TerminatedByOtherGetUpdates))
}
