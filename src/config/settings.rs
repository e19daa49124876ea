//! Application settings management
//!
//! This module defines the configuration structure and provides methods
//! for loading settings from TOML files and environment variables.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Main application configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub bot: BotConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub trip: TripConfig,
    pub storage: StorageConfig,
    pub telemetry: TelemetryConfig,
    pub i18n: I18nConfig,
    pub logging: LoggingConfig,
    pub rate_limit: RateLimitConfig,
}

/// Telegram bot configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BotConfig {
    pub token: String,
    pub admin_ids: Vec<i64>,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Redis configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedisConfig {
    pub url: String,
    pub prefix: String,
    pub ttl_seconds: u64,
}

/// Trip window and money settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TripConfig {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub currency: String,
}

/// Blob storage for photo uploads
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    pub base_url: String,
    pub bucket: String,
    pub api_key: String,
    /// Base used to build the public URL of an uploaded object
    pub public_base_url: Option<String>,
    pub max_upload_bytes: u64,
    pub timeout_seconds: u64,
}

/// Error telemetry ingestion
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    pub enabled: bool,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub environment: String,
    pub timeout_seconds: u64,
}

/// Internationalization configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct I18nConfig {
    pub default_language: String,
    pub supported_languages: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_path: String,
    pub json: bool,
}

/// Per-user request limits
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    pub per_minute: u32,
    pub burst: u32,
}

impl Settings {
    /// Load settings from configuration file and environment variables
    pub fn new() -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();

        let defaults = config::Config::try_from(&Settings::default())?;
        let settings = config::Config::builder()
            .add_source(defaults)
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("CBX")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("bot.admin_ids")
                    .with_list_parse_key("i18n.supported_languages")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), crate::utils::errors::CbxError> {
        super::validation::validate_settings(self)
    }

    /// Check whether a Telegram user is a configured admin
    pub fn is_admin(&self, telegram_id: i64) -> bool {
        self.bot.admin_ids.contains(&telegram_id)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bot: BotConfig {
                token: String::new(),
                admin_ids: vec![],
            },
            database: DatabaseConfig {
                url: "postgresql://localhost/cbx_rentals".to_string(),
                max_connections: 10,
                min_connections: 1,
            },
            redis: RedisConfig {
                url: "redis://localhost:6379".to_string(),
                prefix: "cbx:".to_string(),
                ttl_seconds: 7 * 24 * 3600,
            },
            trip: TripConfig {
                name: "CBX Experience".to_string(),
                start_date: NaiveDate::from_ymd_opt(2026, 3, 12).unwrap_or(NaiveDate::MIN),
                end_date: NaiveDate::from_ymd_opt(2026, 3, 17).unwrap_or(NaiveDate::MIN),
                currency: "USD".to_string(),
            },
            storage: StorageConfig {
                base_url: "http://localhost:54321/storage/v1".to_string(),
                bucket: "photos".to_string(),
                api_key: String::new(),
                public_base_url: None,
                max_upload_bytes: 10 * 1024 * 1024,
                timeout_seconds: 30,
            },
            telemetry: TelemetryConfig {
                enabled: false,
                endpoint: None,
                api_key: None,
                environment: "development".to_string(),
                timeout_seconds: 5,
            },
            i18n: I18nConfig {
                default_language: "en".to_string(),
                supported_languages: vec!["en".to_string(), "es".to_string()],
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file_path: "logs".to_string(),
                json: false,
            },
            rate_limit: RateLimitConfig {
                per_minute: 30,
                burst: 10,
            },
        }
    }
}
