//! Error handling for CBX Rentals
//!
//! This module defines the main error type used throughout the application
//! and classifies failures so handlers can decide what to tell the user.

use thiserror::Error;

/// Main error type for the CBX Rentals application
#[derive(Error, Debug)]
pub enum CbxError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Telegram API error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    #[error("Telegram download error: {0}")]
    Download(#[from] teloxide::DownloadError),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Attendee not found: {attendee_id}")]
    AttendeeNotFound { attendee_id: i64 },

    #[error("Booking not found: {booking_id}")]
    BookingNotFound { booking_id: i64 },

    #[error("Property not found: {property_id}")]
    PropertyNotFound { property_id: i64 },

    #[error("Event not found: {event_id}")]
    EventNotFound { event_id: i64 },

    #[error("Photo not found: {photo_id}")]
    PhotoNotFound { photo_id: i64 },

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Blob storage error: {0}")]
    Storage(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

/// Result type alias for CBX Rentals operations
pub type Result<T> = std::result::Result<T, CbxError>;

impl From<config::ConfigError> for CbxError {
    fn from(e: config::ConfigError) -> Self {
        CbxError::Config(e.to_string())
    }
}

impl CbxError {
    /// Check if the error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            CbxError::Database(e) => is_transient_sqlx(e),
            CbxError::Migration(_) => false,
            CbxError::Telegram(_) => true,
            CbxError::Download(_) => true,
            CbxError::Redis(_) => true,
            CbxError::Http(_) => true,
            CbxError::Serialization(_) => false,
            CbxError::Io(_) => true,
            CbxError::UrlParse(_) => false,
            CbxError::Config(_) => false,
            CbxError::PermissionDenied(_) => false,
            CbxError::Authentication(_) => false,
            CbxError::AttendeeNotFound { .. } => false,
            CbxError::BookingNotFound { .. } => false,
            CbxError::PropertyNotFound { .. } => false,
            CbxError::EventNotFound { .. } => false,
            CbxError::PhotoNotFound { .. } => false,
            CbxError::InvalidStateTransition { .. } => false,
            CbxError::InvalidInput(_) => false,
            CbxError::RateLimitExceeded => true,
            CbxError::Storage(_) => true,
            CbxError::ServiceUnavailable(_) => true,
        }
    }

    /// Whether the failure came from the network path rather than from the data
    pub fn is_network(&self) -> bool {
        match self {
            CbxError::Database(e) => is_transient_sqlx(e),
            CbxError::Http(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            CbxError::Redis(e) => e.is_io_error() || e.is_connection_dropped() || e.is_timeout(),
            CbxError::Io(_) => true,
            _ => false,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            CbxError::Database(_) => ErrorSeverity::Critical,
            CbxError::Migration(_) => ErrorSeverity::Critical,
            CbxError::Config(_) => ErrorSeverity::Critical,
            CbxError::PermissionDenied(_) => ErrorSeverity::Warning,
            CbxError::Authentication(_) => ErrorSeverity::Warning,
            CbxError::RateLimitExceeded => ErrorSeverity::Warning,
            CbxError::InvalidInput(_) => ErrorSeverity::Info,
            CbxError::InvalidStateTransition { .. } => ErrorSeverity::Info,
            _ => ErrorSeverity::Error,
        }
    }

    /// Translation key of the message shown to the user for this error
    pub fn user_message_key(&self) -> &'static str {
        match self {
            CbxError::PermissionDenied(_) => "errors.permission_denied",
            CbxError::Authentication(_) => "errors.not_logged_in",
            CbxError::AttendeeNotFound { .. }
            | CbxError::BookingNotFound { .. }
            | CbxError::PropertyNotFound { .. }
            | CbxError::EventNotFound { .. }
            | CbxError::PhotoNotFound { .. } => "errors.not_found",
            CbxError::InvalidInput(_) => "errors.invalid_input",
            CbxError::InvalidStateTransition { .. } => "errors.flow_expired",
            CbxError::RateLimitExceeded => "errors.rate_limited",
            _ => "errors.generic",
        }
    }
}

fn is_transient_sqlx(e: &sqlx::Error) -> bool {
    matches!(
        e,
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed
    )
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "INFO"),
            ErrorSeverity::Warning => write!(f, "WARN"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_errors_map_to_one_message() {
        assert_eq!(CbxError::AttendeeNotFound { attendee_id: 1 }.user_message_key(), "errors.not_found");
        assert_eq!(CbxError::BookingNotFound { booking_id: 1 }.user_message_key(), "errors.not_found");
        assert_eq!(CbxError::Config("x".into()).user_message_key(), "errors.generic");
    }

    #[test]
    fn test_pool_timeout_is_network() {
        let err = CbxError::Database(sqlx::Error::PoolTimedOut);
        assert!(err.is_network());
        assert!(err.is_recoverable());

        let err = CbxError::Database(sqlx::Error::RowNotFound);
        assert!(!err.is_network());
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_severity() {
        assert_eq!(CbxError::InvalidInput("bad".into()).severity(), ErrorSeverity::Info);
        assert_eq!(CbxError::RateLimitExceeded.severity(), ErrorSeverity::Warning);
        assert_eq!(CbxError::Config("x".into()).severity(), ErrorSeverity::Critical);
        assert_eq!(ErrorSeverity::Warning.to_string(), "WARN");
    }
}
