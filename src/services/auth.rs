//! Authentication service implementation
//!
//! Attendees log in with their registered name and phone number. Admins are
//! the Telegram accounts listed in `bot.admin_ids`. Sessions live in Redis.

use std::sync::Arc;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use crate::config::Settings;
use crate::database::DatabaseService;
use crate::models::{ActivityAction, Attendee, CreateActivityRequest};
use crate::state::StateStorage;
use crate::utils::errors::{CbxError, Result};
use crate::utils::helpers::{is_valid_phone, normalize_phone};
use crate::utils::logging::log_attendee_action;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Attendee,
}

/// A logged-in Telegram user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub telegram_id: i64,
    pub role: Role,
    pub authenticated: bool,
    /// Cached attendee record, refreshed after writes
    pub attendee: Option<Attendee>,
    pub logged_in_at: DateTime<Utc>,
}

impl Session {
    pub fn admin(telegram_id: i64) -> Self {
        Self {
            telegram_id,
            role: Role::Admin,
            authenticated: true,
            attendee: None,
            logged_in_at: Utc::now(),
        }
    }

    pub fn attendee(telegram_id: i64, attendee: Attendee) -> Self {
        Self {
            telegram_id,
            role: Role::Attendee,
            authenticated: true,
            attendee: Some(attendee),
            logged_in_at: Utc::now(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.authenticated && self.role == Role::Admin
    }

    /// The attendee behind an authenticated attendee session
    pub fn attendee_record(&self) -> Option<&Attendee> {
        if !self.authenticated {
            return None;
        }
        self.attendee.as_ref()
    }
}

/// Check a login attempt against the attendee found by phone
pub fn verify_credentials(candidate: Option<Attendee>, name: &str) -> Result<Attendee> {
    match candidate {
        Some(attendee) if attendee.name_matches(name) => Ok(attendee),
        Some(_) => Err(CbxError::Authentication("Name does not match phone".to_string())),
        None => Err(CbxError::Authentication("No attendee with that phone".to_string())),
    }
}

#[derive(Debug, Clone)]
pub struct AuthService {
    database: Arc<DatabaseService>,
    state_storage: Arc<StateStorage>,
    settings: Settings,
}

impl AuthService {
    pub fn new(database: Arc<DatabaseService>, state_storage: Arc<StateStorage>, settings: Settings) -> Self {
        Self { database, state_storage, settings }
    }

    pub fn is_admin(&self, telegram_id: i64) -> bool {
        self.settings.is_admin(telegram_id)
    }

    /// Log an attendee in by name and phone and link their Telegram account
    pub async fn login_attendee(&self, telegram_id: i64, name: &str, phone: &str) -> Result<Session> {
        let normalized = normalize_phone(phone);
        if !is_valid_phone(&normalized) {
            return Err(CbxError::InvalidInput("auth.invalid_phone".to_string()));
        }

        let candidate = self.database.attendees.find_by_phone(&normalized).await?;
        let attendee = match verify_credentials(candidate, name) {
            Ok(attendee) => attendee,
            Err(e) => {
                warn!(telegram_id, error = %e, "Attendee login failed");
                self.database.record_activity(
                    CreateActivityRequest::new(ActivityAction::LoginFailed)
                        .telegram(telegram_id)
                        .details(serde_json::json!({ "phone": normalized })),
                ).await;
                return Err(e);
            }
        };

        let attendee = if attendee.telegram_id == Some(telegram_id) {
            attendee
        } else {
            self.database.attendees.link_telegram(attendee.id, telegram_id).await?
        };

        let session = Session::attendee(telegram_id, attendee.clone());
        self.state_storage.save_session(&session).await?;

        self.database.record_activity(
            CreateActivityRequest::new(ActivityAction::Login)
                .attendee(attendee.id)
                .telegram(telegram_id)
                .details(serde_json::json!({ "role": "attendee" })),
        ).await;
        log_attendee_action(attendee.id, "login", None);

        Ok(session)
    }

    /// Open an admin session for a configured admin account
    pub async fn login_admin(&self, telegram_id: i64) -> Result<Session> {
        if !self.is_admin(telegram_id) {
            self.database.record_activity(
                CreateActivityRequest::new(ActivityAction::LoginFailed)
                    .telegram(telegram_id)
                    .details(serde_json::json!({ "role": "admin" })),
            ).await;
            return Err(CbxError::PermissionDenied(format!("{} is not an admin", telegram_id)));
        }

        let session = Session::admin(telegram_id);
        self.state_storage.save_session(&session).await?;

        self.database.record_activity(
            CreateActivityRequest::new(ActivityAction::Login)
                .telegram(telegram_id)
                .details(serde_json::json!({ "role": "admin" })),
        ).await;
        info!(telegram_id, "Admin session opened");

        Ok(session)
    }

    pub async fn current_session(&self, telegram_id: i64) -> Result<Option<Session>> {
        let session = self.state_storage.load_session(telegram_id).await?;

        // An admin removed from config loses the session
        if let Some(session) = &session {
            if session.role == Role::Admin && !self.is_admin(telegram_id) {
                self.state_storage.delete_session(telegram_id).await?;
                return Ok(None);
            }
        }

        Ok(session)
    }

    /// The logged-in attendee or an authentication error
    pub async fn require_attendee(&self, telegram_id: i64) -> Result<Attendee> {
        self.current_session(telegram_id).await?
            .and_then(|session| session.attendee_record().cloned())
            .ok_or_else(|| CbxError::Authentication("Not logged in".to_string()))
    }

    /// Configured admins get a session on first use
    pub async fn require_admin(&self, telegram_id: i64) -> Result<Session> {
        if !self.is_admin(telegram_id) {
            return Err(CbxError::PermissionDenied(format!("{} is not an admin", telegram_id)));
        }

        match self.current_session(telegram_id).await? {
            Some(session) if session.is_admin() => Ok(session),
            _ => self.login_admin(telegram_id).await,
        }
    }

    /// Drop the session and any unfinished wizard
    pub async fn logout(&self, telegram_id: i64) -> Result<bool> {
        let Some(session) = self.state_storage.load_session(telegram_id).await? else {
            return Ok(false);
        };

        self.state_storage.delete_session(telegram_id).await?;
        self.state_storage.delete_context(telegram_id).await?;

        let mut activity = CreateActivityRequest::new(ActivityAction::Logout).telegram(telegram_id);
        if let Some(attendee) = &session.attendee {
            activity = activity.attendee(attendee.id);
        }
        self.database.record_activity(activity).await;
        debug!(telegram_id, "Logged out");

        Ok(true)
    }

    /// Re-read the attendee cached in the session
    pub async fn refresh_attendee(&self, telegram_id: i64) -> Result<Attendee> {
        let mut session = self.current_session(telegram_id).await?
            .ok_or_else(|| CbxError::Authentication("Not logged in".to_string()))?;
        let cached = session.attendee.as_ref()
            .ok_or_else(|| CbxError::Authentication("Session has no attendee".to_string()))?;

        let attendee = self.database.attendees.find_by_id(cached.id).await?
            .ok_or(CbxError::AttendeeNotFound { attendee_id: cached.id })?;

        session.attendee = Some(attendee.clone());
        self.state_storage.save_session(&session).await?;
        Ok(attendee)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn attendee() -> Attendee {
        Attendee {
            id: 5,
            name: "Jordan Rivera".to_string(),
            phone: "+15551230000".to_string(),
            email: None,
            telegram_id: None,
            has_vehicle: false,
            vehicle_seats: None,
            needs_pickup: false,
            wants_carpool: false,
            checked_in: false,
            checked_in_at: None,
            flight_number: None,
            flight_arrival: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_verify_credentials() {
        assert_eq!(verify_credentials(Some(attendee()), "jordan rivera").unwrap().id, 5);
        assert_matches!(verify_credentials(Some(attendee()), "Jordan"), Err(CbxError::Authentication(_)));
        assert_matches!(verify_credentials(None, "Jordan Rivera"), Err(CbxError::Authentication(_)));
    }

    #[test]
    fn test_session_roles() {
        let admin = Session::admin(1);
        assert!(admin.is_admin());
        assert!(admin.attendee_record().is_none());

        let mut session = Session::attendee(2, attendee());
        assert!(!session.is_admin());
        assert_eq!(session.attendee_record().map(|a| a.id), Some(5));

        session.authenticated = false;
        assert!(session.attendee_record().is_none());
    }

    #[test]
    fn test_session_serializes_role_as_snake_case() {
        let json = serde_json::to_value(Session::admin(1)).unwrap();
        assert_eq!(json["role"], "admin");
        let back: Session = serde_json::from_value(json).unwrap();
        assert_eq!(back.role, Role::Admin);
    }
}
