//! Bot handlers module
//!
//! This module contains all Telegram bot handlers organized by type:
//! - Command handlers for bot commands
//! - Callback handlers for inline keyboard interactions
//! - Message handlers for wizard input and photo uploads

pub mod commands;
pub mod callbacks;
pub mod messages;

pub use commands::{handle_command, Command};
pub use callbacks::handle_callback_query;
pub use messages::handle_message;

use teloxide::{prelude::*, types::{ChatId, User}};
use tracing::{error, warn};
use crate::i18n::I18n;
use crate::services::TelemetryService;
use crate::utils::errors::{CbxError, ErrorSeverity, Result};

/// Telegram rejects messages longer than this
pub const MAX_MESSAGE_CHARS: usize = 4000;

/// Language to answer a Telegram user in
pub fn user_language(i18n: &I18n, user: &User) -> String {
    i18n.detect_user_language(user.language_code.as_deref())
}

/// Text shown to the user for a failed request.
///
/// Input errors carry their own translation key; everything else maps to a
/// generic message per error class.
pub fn error_text(i18n: &I18n, error: &CbxError, lang: &str) -> String {
    if let CbxError::InvalidInput(key) = error {
        if i18n.has_key(key, lang) {
            return i18n.t(key, lang, None);
        }
    }
    i18n.t(error.user_message_key(), lang, None)
}

/// Log the error, tell the user, then report it to telemetry
pub async fn reply_error(
    bot: &Bot,
    chat_id: ChatId,
    error: &CbxError,
    telemetry: &TelemetryService,
    i18n: &I18n,
    lang: &str,
    operation: &str,
) {
    match error.severity() {
        ErrorSeverity::Info | ErrorSeverity::Warning => {
            warn!(chat_id = chat_id.0, operation, error = %error, "Handler rejected request");
        }
        ErrorSeverity::Error | ErrorSeverity::Critical => {
            error!(chat_id = chat_id.0, operation, error = %error, "Handler failed");
        }
    }

    if let Err(e) = bot.send_message(chat_id, error_text(i18n, error, lang)).await {
        error!(chat_id = chat_id.0, error = %e, "Failed to send error reply");
    }

    telemetry.capture_error(error, serde_json::json!({
        "chat_id": chat_id.0,
        "operation": operation,
        "recoverable": error.is_recoverable(),
    })).await;
}

/// Split text on line boundaries into chunks Telegram accepts
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        let line_len = line.chars().count();
        if !current.is_empty() && current.chars().count() + line_len + 1 > max_chars {
            chunks.push(std::mem::take(&mut current));
        }
        if line_len > max_chars {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(max_chars) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

pub async fn send_long(bot: &Bot, chat_id: ChatId, text: &str) -> Result<()> {
    for chunk in split_message(text, MAX_MESSAGE_CHARS) {
        bot.send_message(chat_id, chunk).await?;
    }
    Ok(())
}
