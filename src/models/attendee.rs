//! Attendee model

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Attendee {
    pub id: i64,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub telegram_id: Option<i64>,
    pub has_vehicle: bool,
    pub vehicle_seats: Option<i32>,
    pub needs_pickup: bool,
    pub wants_carpool: bool,
    pub checked_in: bool,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub flight_number: Option<String>,
    pub flight_arrival: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Attendee {
    /// Case-insensitive match of the name an attendee typed at login
    pub fn name_matches(&self, candidate: &str) -> bool {
        let normalize = |s: &str| s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
        normalize(&self.name) == normalize(candidate)
    }

    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAttendeeRequest {
    pub name: String,
    /// Stored in normalized form
    pub phone: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAttendeeRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// Transport answers collected during check-in
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransportDetails {
    pub has_vehicle: bool,
    pub vehicle_seats: Option<i32>,
    pub needs_pickup: bool,
    pub wants_carpool: bool,
    pub flight_number: Option<String>,
    pub flight_arrival: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attendee(name: &str) -> Attendee {
        Attendee {
            id: 1,
            name: name.to_string(),
            phone: "+15551234567".to_string(),
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
    fn test_name_matches_ignores_case_and_spacing() {
        let a = attendee("Maria  Lopez");
        assert!(a.name_matches("maria lopez"));
        assert!(a.name_matches("  MARIA LOPEZ "));
        assert!(!a.name_matches("Maria"));
    }

    #[test]
    fn test_first_name() {
        assert_eq!(attendee("Maria Lopez").first_name(), "Maria");
    }
}
