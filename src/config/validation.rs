//! Configuration validation module
//!
//! This module provides validation functions for application configuration
//! to ensure all required settings are properly configured.

use crate::utils::errors::{CbxError, Result};
use super::Settings;

/// Validate all configuration settings
pub fn validate_settings(settings: &Settings) -> Result<()> {
    validate_bot_config(&settings.bot)?;
    validate_database_config(&settings.database)?;
    validate_redis_config(&settings.redis)?;
    validate_trip_config(&settings.trip)?;
    validate_storage_config(&settings.storage)?;
    validate_telemetry_config(&settings.telemetry)?;
    validate_i18n_config(&settings.i18n)?;
    validate_logging_config(&settings.logging)?;
    validate_rate_limit_config(&settings.rate_limit)?;

    Ok(())
}

/// Validate bot configuration
fn validate_bot_config(config: &super::BotConfig) -> Result<()> {
    if config.token.is_empty() {
        return Err(CbxError::Config("Bot token is required".to_string()));
    }

    if config.admin_ids.is_empty() {
        return Err(CbxError::Config(
            "At least one admin ID must be configured".to_string()
        ));
    }

    Ok(())
}

/// Validate database configuration
fn validate_database_config(config: &super::DatabaseConfig) -> Result<()> {
    if config.url.is_empty() {
        return Err(CbxError::Config("Database URL is required".to_string()));
    }

    if config.max_connections == 0 {
        return Err(CbxError::Config(
            "Max connections must be greater than 0".to_string()
        ));
    }

    if config.min_connections > config.max_connections {
        return Err(CbxError::Config(
            "Min connections cannot be greater than max connections".to_string()
        ));
    }

    Ok(())
}

/// Validate Redis configuration
fn validate_redis_config(config: &super::RedisConfig) -> Result<()> {
    if config.url.is_empty() {
        return Err(CbxError::Config("Redis URL is required".to_string()));
    }

    if config.ttl_seconds == 0 {
        return Err(CbxError::Config("Redis TTL must be greater than 0".to_string()));
    }

    Ok(())
}

fn validate_trip_config(config: &super::TripConfig) -> Result<()> {
    if config.end_date <= config.start_date {
        return Err(CbxError::Config(format!(
            "Trip end date {} must be after start date {}",
            config.end_date, config.start_date
        )));
    }

    if config.currency.len() != 3 {
        return Err(CbxError::Config(format!(
            "Currency must be a 3-letter code, got '{}'",
            config.currency
        )));
    }

    Ok(())
}

fn validate_storage_config(config: &super::StorageConfig) -> Result<()> {
    if config.base_url.is_empty() {
        return Err(CbxError::Config("Storage base URL is required".to_string()));
    }
    url::Url::parse(&config.base_url)?;

    if config.bucket.is_empty() {
        return Err(CbxError::Config("Storage bucket is required".to_string()));
    }

    if config.max_upload_bytes == 0 {
        return Err(CbxError::Config(
            "Max upload size must be greater than 0".to_string()
        ));
    }

    Ok(())
}

fn validate_telemetry_config(config: &super::TelemetryConfig) -> Result<()> {
    if !config.enabled {
        return Ok(());
    }

    match &config.endpoint {
        Some(endpoint) if !endpoint.is_empty() => {
            url::Url::parse(endpoint)?;
            Ok(())
        }
        _ => Err(CbxError::Config(
            "Telemetry endpoint is required when telemetry is enabled".to_string()
        )),
    }
}

/// Validate internationalization configuration
fn validate_i18n_config(config: &super::I18nConfig) -> Result<()> {
    if config.default_language.is_empty() {
        return Err(CbxError::Config("Default language is required".to_string()));
    }

    if !config.supported_languages.contains(&config.default_language) {
        return Err(CbxError::Config(
            "Default language must be in supported languages list".to_string()
        ));
    }

    Ok(())
}

/// Validate logging configuration
fn validate_logging_config(config: &super::LoggingConfig) -> Result<()> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.level.as_str()) {
        return Err(CbxError::Config(
            format!("Invalid log level: {}. Valid levels: {:?}", config.level, valid_levels)
        ));
    }

    Ok(())
}

fn validate_rate_limit_config(config: &super::RateLimitConfig) -> Result<()> {
    if config.per_minute == 0 {
        return Err(CbxError::Config(
            "Rate limit per minute must be greater than 0".to_string()
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::NaiveDate;

    fn valid_settings() -> Settings {
        let mut settings = Settings::default();
        settings.bot.token = "12345:token".to_string();
        settings.bot.admin_ids = vec![42];
        settings
    }

    #[test]
    fn test_valid_settings_pass() {
        assert!(validate_settings(&valid_settings()).is_ok());
    }

    #[test]
    fn test_missing_token_rejected() {
        let mut settings = valid_settings();
        settings.bot.token.clear();
        assert_matches!(validate_settings(&settings), Err(CbxError::Config(_)));
    }

    #[test]
    fn test_trip_window_must_be_ordered() {
        let mut settings = valid_settings();
        settings.trip.end_date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        assert_matches!(validate_settings(&settings), Err(CbxError::Config(msg)) if msg.contains("Trip end date"));
    }

    #[test]
    fn test_telemetry_requires_endpoint() {
        let mut settings = valid_settings();
        settings.telemetry.enabled = true;
        assert!(validate_settings(&settings).is_err());

        settings.telemetry.endpoint = Some("https://telemetry.example.com/ingest".to_string());
        assert!(validate_settings(&settings).is_ok());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut settings = valid_settings();
        settings.logging.level = "verbose".to_string();
        assert!(validate_settings(&settings).is_err());
    }

    #[test]
    fn test_connection_bounds() {
        let mut settings = valid_settings();
        settings.database.min_connections = 20;
        assert!(validate_settings(&settings).is_err());
    }
}
