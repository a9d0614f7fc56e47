//! Minimal Telegram Bot API surface used by the relay.
//!
//! Only the handful of methods the bot actually calls are modelled:
//! `getUpdates`, `deleteWebhook`, `getMe`, `sendMessage`, `sendAudio`, `copyMessage`,
//! `deleteMessage`, `getFile`, `sendDocument` and the file download endpoint.

pub mod client;
pub mod types;

pub use client::{AudioUpload, BotApi, API_BASE};
pub use types::{
    ApiResponse, Audio, Chat, Document, File, KeyboardButton, Message, MessageId, ReplyMarkup,
    Update, User,
};
