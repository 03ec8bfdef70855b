//! Telegram front end for linkdrop.
//!
//! A manual `getUpdates` loop feeds inbound messages to the admission
//! service; [`TelegramOutbound`] implements the queue's `Transport` for
//! acknowledgements, uploads and error replies.

pub mod bot;
pub mod error;
pub mod handlers;
pub mod outbound;
pub mod state;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod mock_api;

pub use {
    bot::{ConnectedBot, connect, spawn_polling},
    error::{Error, Result},
    outbound::TelegramOutbound,
    state::BotState,
};
