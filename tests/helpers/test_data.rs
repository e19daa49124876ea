//! In-memory records and config used across tests

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use cbx_rentals::config::{StorageConfig, TelemetryConfig, TripConfig};
use cbx_rentals::models::{Attendee, Booking, Property};

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("valid test date")
}

pub fn test_trip() -> TripConfig {
    TripConfig {
        name: "CBX Test Trip".to_string(),
        start_date: date("2026-03-12"),
        end_date: date("2026-03-17"),
        currency: "USD".to_string(),
    }
}

pub fn storage_config(base_url: &str) -> StorageConfig {
    StorageConfig {
        base_url: base_url.to_string(),
        bucket: "photos".to_string(),
        api_key: "test-storage-key".to_string(),
        public_base_url: None,
        max_upload_bytes: 64 * 1024,
        timeout_seconds: 5,
    }
}

pub fn telemetry_config(endpoint: Option<String>, enabled: bool) -> TelemetryConfig {
    TelemetryConfig {
        enabled,
        endpoint,
        api_key: Some("test-telemetry-key".to_string()),
        environment: "test".to_string(),
        timeout_seconds: 2,
    }
}

pub fn sample_attendee(id: i64, name: &str) -> Attendee {
    Attendee {
        id,
        name: name.to_string(),
        phone: format!("+1555010{:04}", id),
        email: None,
        telegram_id: Some(100_000 + id),
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

pub fn sample_property(id: i64, nightly_price: i64, max_occupancy: i32) -> Property {
    Property {
        id,
        name: format!("House {}", id),
        address: format!("{} Shore Drive", id),
        latitude: None,
        longitude: None,
        max_occupancy,
        nightly_price: Decimal::from(nightly_price),
        listing_url: None,
        bedrooms: 3,
        bathrooms: Decimal::from(2),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn sample_booking(id: i64, attendee_id: i64, property_id: i64, total: i64) -> Booking {
    Booking {
        id,
        attendee_id,
        property_id,
        arrival_date: date("2026-03-12"),
        exit_date: date("2026-03-16"),
        total_amount: Decimal::from(total),
        paid: false,
        amount_paid: None,
        amount_due: Some(Decimal::from(total)),
        payment_method: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}
