//! Activity log model

use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use crate::utils::errors::CbxError;

/// Audited actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    Login,
    Logout,
    LoginFailed,
    CheckinStarted,
    CheckinCompleted,
    PaymentConfirmed,
    PhotoUploaded,
    AdminUpdate,
}

impl ActivityAction {
    pub const ALL: [ActivityAction; 8] = [
        ActivityAction::Login,
        ActivityAction::Logout,
        ActivityAction::LoginFailed,
        ActivityAction::CheckinStarted,
        ActivityAction::CheckinCompleted,
        ActivityAction::PaymentConfirmed,
        ActivityAction::PhotoUploaded,
        ActivityAction::AdminUpdate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityAction::Login => "login",
            ActivityAction::Logout => "logout",
            ActivityAction::LoginFailed => "login_failed",
            ActivityAction::CheckinStarted => "checkin_started",
            ActivityAction::CheckinCompleted => "checkin_completed",
            ActivityAction::PaymentConfirmed => "payment_confirmed",
            ActivityAction::PhotoUploaded => "photo_uploaded",
            ActivityAction::AdminUpdate => "admin_update",
        }
    }
}

impl fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityAction {
    type Err = CbxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActivityAction::ALL
            .iter()
            .copied()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| CbxError::InvalidInput(format!("Unknown activity action: {}", s)))
    }
}

/// A row of the audit trail. `action` stays text so rows written by older
/// releases still load.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ActivityLog {
    pub id: i64,
    pub attendee_id: Option<i64>,
    pub telegram_id: Option<i64>,
    pub action: String,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl ActivityLog {
    pub fn parsed_action(&self) -> Option<ActivityAction> {
        self.action.parse().ok()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateActivityRequest {
    pub attendee_id: Option<i64>,
    pub telegram_id: Option<i64>,
    pub action: ActivityAction,
    pub details: serde_json::Value,
}

impl CreateActivityRequest {
    pub fn new(action: ActivityAction) -> Self {
        Self {
            attendee_id: None,
            telegram_id: None,
            action,
            details: serde_json::json!({}),
        }
    }

    pub fn attendee(mut self, attendee_id: i64) -> Self {
        self.attendee_id = Some(attendee_id);
        self
    }

    pub fn telegram(mut self, telegram_id: i64) -> Self {
        self.telegram_id = Some(telegram_id);
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ActionCount {
    pub action: String,
    pub count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_labels_parse_back() {
        for action in ActivityAction::ALL {
            assert_eq!(action.as_str().parse::<ActivityAction>().unwrap(), action);
        }
        assert!("dance".parse::<ActivityAction>().is_err());
    }

    #[test]
    fn test_builder_sets_fields() {
        let req = CreateActivityRequest::new(ActivityAction::Login)
            .attendee(7)
            .telegram(99)
            .details(serde_json::json!({"via": "bot"}));
        assert_eq!(req.attendee_id, Some(7));
        assert_eq!(req.telegram_id, Some(99));
        assert_eq!(req.details["via"], "bot");
    }
}
