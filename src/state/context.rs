//! Per-user conversation state
//!
//! A context records where a Telegram user is in a multi-step flow and the
//! answers gathered on the way. Data is stored as JSON values so each flow
//! can keep its own typed draft under a key.

use std::collections::HashMap;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use chrono::{DateTime, Duration, Utc};
use crate::utils::errors::{CbxError, Result};

/// Hours an unfinished flow stays resumable
pub const DEFAULT_CONTEXT_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationContext {
    pub telegram_id: i64,
    pub scenario: Option<String>,
    pub step: Option<String>,
    pub data: HashMap<String, serde_json::Value>,
    /// Contexts past this instant are discarded on load
    pub expires_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationContext {
    pub fn new(telegram_id: i64) -> Self {
        Self {
            telegram_id,
            scenario: None,
            step: None,
            data: HashMap::new(),
            expires_at: None,
            updated_at: Utc::now(),
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Enter `scenario` at `initial_step`. Answers from an earlier flow are dropped.
    pub fn start_scenario(&mut self, scenario: &str, initial_step: &str) -> Result<()> {
        self.data.clear();
        self.scenario = Some(scenario.to_string());
        self.step = Some(initial_step.to_string());
        self.expires_at = Some(Utc::now() + Duration::hours(DEFAULT_CONTEXT_TTL_HOURS));
        self.touch();
        Ok(())
    }

    pub fn next_step(&mut self, step: &str) -> Result<()> {
        if self.scenario.is_none() {
            return Err(CbxError::InvalidStateTransition {
                from: "no_scenario".to_string(),
                to: step.to_string(),
            });
        }
        self.step = Some(step.to_string());
        self.touch();
        Ok(())
    }

    /// Leave the flow and forget its answers
    pub fn complete_scenario(&mut self) {
        *self = Self {
            updated_at: Utc::now(),
            ..Self::new(self.telegram_id)
        };
    }

    pub fn cancel_scenario(&mut self) {
        self.complete_scenario();
    }

    pub fn set_data<T: Serialize>(&mut self, key: &str, value: T) -> Result<()> {
        self.data.insert(key.to_string(), serde_json::to_value(value)?);
        self.touch();
        Ok(())
    }

    /// Typed read of a stored value. A value of the wrong shape is an error.
    pub fn get_data<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.data
            .get(key)
            .map(|value| serde_json::from_value(value.clone()))
            .transpose()
            .map_err(CbxError::from)
    }

    pub fn remove_data(&mut self, key: &str) -> Option<serde_json::Value> {
        let removed = self.data.remove(key);
        if removed.is_some() {
            self.touch();
        }
        removed
    }

    pub fn is_expired(&self) -> bool {
        matches!(self.expires_at, Some(at) if at < Utc::now())
    }

    pub fn set_expiry(&mut self, expires_at: DateTime<Utc>) {
        self.expires_at = Some(expires_at);
        self.touch();
    }

    pub fn is_in_scenario(&self, scenario: &str) -> bool {
        self.scenario.as_deref() == Some(scenario)
    }

    pub fn is_at_step(&self, step: &str) -> bool {
        self.step.as_deref() == Some(step)
    }

    pub fn is_at(&self, scenario: &str, step: &str) -> bool {
        self.is_in_scenario(scenario) && self.is_at_step(step)
    }

    pub fn current_state(&self) -> (Option<&str>, Option<&str>) {
        (self.scenario.as_deref(), self.step.as_deref())
    }
}
