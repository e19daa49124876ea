//! Event model

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub location_name: Option<String>,
    pub location_address: Option<String>,
    pub is_optional: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EventAttendee {
    pub id: i64,
    pub event_id: i64,
    pub attendee_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEventRequest {
    pub title: String,
    pub description: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub location_name: Option<String>,
    pub location_address: Option<String>,
    pub is_optional: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateEventRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub location_name: Option<String>,
    pub location_address: Option<String>,
    pub is_optional: Option<bool>,
}

/// Number of attendees interested in an event
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EventInterestCount {
    pub event_id: i64,
    pub interested: i64,
}

/// Event as seen by one attendee
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventListing {
    pub event: Event,
    pub interested: bool,
    pub interest_count: i64,
}
