//! Logging middleware
//!
//! Logs incoming updates and how long their handlers took.

use std::time::{Duration, Instant};
use teloxide::types::{CallbackQuery, MediaKind, Message, MessageKind};
use tracing::{debug, info, warn, Span};

/// Commands whose arguments carry personal data and are never logged
const REDACTED_COMMANDS: &[&str] = &["/login"];

const SLOW_HANDLER: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct LoggingMiddleware {
    log_user_interactions: bool,
    log_performance: bool,
}

impl LoggingMiddleware {
    pub fn new(log_user_interactions: bool, log_performance: bool) -> Self {
        Self {
            log_user_interactions,
            log_performance,
        }
    }

    pub fn log_message(&self, message: &Message) {
        if !self.log_user_interactions {
            return;
        }

        let user_id = message.from.as_ref().map(|u| u.id.0);
        let message_type = match &message.kind {
            MessageKind::Common(common) => match &common.media_kind {
                MediaKind::Text(text) => {
                    debug!(user_id = ?user_id, text = %redact(&text.text), "Text message received");
                    "text"
                }
                MediaKind::Photo(_) => "photo",
                MediaKind::Document(_) => "document",
                _ => "other_media",
            },
            _ => "other",
        };

        info!(
            user_id = ?user_id,
            chat_id = message.chat.id.0,
            message_type,
            message_id = message.id.0,
            "Message received"
        );
    }

    pub fn log_callback(&self, query: &CallbackQuery) {
        if !self.log_user_interactions {
            return;
        }

        info!(
            user_id = query.from.id.0,
            callback_data = query.data.as_deref().unwrap_or("none"),
            "Callback query received"
        );
    }

    /// Start timing a handler. Returns `None` when performance logging is off.
    pub fn track(&self, operation: &str) -> Option<HandlerTimer> {
        self.log_performance.then(|| HandlerTimer::new(operation))
    }
}

impl Default for LoggingMiddleware {
    fn default() -> Self {
        Self::new(true, true)
    }
}

fn redact(text: &str) -> String {
    let command = text.split_whitespace().next().unwrap_or_default();
    let command = command.split('@').next().unwrap_or_default();
    if REDACTED_COMMANDS.contains(&command) {
        format!("{} [redacted]", command)
    } else {
        text.to_string()
    }
}

/// Measures a handler from creation until `complete`
pub struct HandlerTimer {
    operation: String,
    started: Instant,
    _span: Span,
}

impl HandlerTimer {
    fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            started: Instant::now(),
            _span: tracing::info_span!("handler", operation = %operation),
        }
    }

    pub fn complete(self, success: bool) -> Duration {
        let elapsed = self.started.elapsed();
        let duration_ms = elapsed.as_millis() as u64;

        if success {
            info!(operation = %self.operation, duration_ms, "Handler completed");
        } else {
            warn!(operation = %self.operation, duration_ms, "Handler failed");
        }
        if elapsed > SLOW_HANDLER {
            warn!(operation = %self.operation, duration_ms, "Slow handler");
        }

        elapsed
    }
}
