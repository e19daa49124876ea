//! Error telemetry
//!
//! Sends handler failures to an ingestion endpoint as JSON. Delivery
//! problems are logged and never reach the caller.

use std::time::Duration;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};
use crate::config::TelemetryConfig;
use crate::utils::errors::{CbxError, ErrorSeverity, Result};

#[derive(Debug, Clone, Serialize)]
pub struct TelemetryEvent {
    pub level: String,
    pub message: String,
    pub context: serde_json::Value,
    pub environment: String,
    pub release: &'static str,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TelemetryService {
    client: Client,
    config: TelemetryConfig,
}

impl TelemetryService {
    pub fn new(config: TelemetryConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled && self.config.endpoint.is_some()
    }

    /// Report an error with some context about where it happened
    pub async fn capture_error(&self, error: &CbxError, context: serde_json::Value) {
        let level = match error.severity() {
            ErrorSeverity::Critical => "fatal",
            ErrorSeverity::Error => "error",
            ErrorSeverity::Warning => "warning",
            ErrorSeverity::Info => "info",
        };
        self.capture_message(level, &error.to_string(), context).await;
    }

    pub async fn capture_message(&self, level: &str, message: &str, context: serde_json::Value) {
        if !self.is_enabled() {
            return;
        }

        let event = TelemetryEvent {
            level: level.to_string(),
            message: message.to_string(),
            context,
            environment: self.config.environment.clone(),
            release: env!("CARGO_PKG_VERSION"),
            timestamp: Utc::now(),
        };

        if let Err(e) = self.send(&event).await {
            warn!(error = %e, "Failed to deliver telemetry event");
        }
    }

    async fn send(&self, event: &TelemetryEvent) -> Result<()> {
        let endpoint = self.config.endpoint.as_deref()
            .ok_or_else(|| CbxError::Config("Telemetry endpoint not configured".to_string()))?;

        let mut request = self.client.post(endpoint).json(event);
        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(CbxError::ServiceUnavailable(format!("telemetry returned {}", response.status())));
        }

        debug!(level = %event.level, "Telemetry event delivered");
        Ok(())
    }
}
