//! Test database helper
//!
//! Database tests run only when `TEST_DATABASE_URL` points at a disposable
//! PostgreSQL database. Each test starts from empty tables.

use std::str::FromStr;
use std::sync::{Arc, Once};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use cbx_rentals::database::DatabaseService;
use cbx_rentals::models::{
    Attendee, CreateAttendeeRequest, CreateEventRequest, CreatePropertyRequest, Event, Property,
};
use cbx_rentals::utils::helpers::normalize_phone;

static INIT: Once = Once::new();

pub struct TestDatabase {
    pub pool: PgPool,
    pub service: Arc<DatabaseService>,
}

impl TestDatabase {
    /// Connect and migrate, or `None` when no test database is configured
    pub async fn connect() -> Option<Self> {
        INIT.call_once(|| {
            let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        });

        let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
            eprintln!("TEST_DATABASE_URL not set, skipping database test");
            return None;
        };

        let pool = PgPool::connect(&url).await.expect("Failed to connect to test database");
        sqlx::migrate!("./migrations").run(&pool).await.expect("Failed to run migrations");

        let db = Self {
            service: Arc::new(DatabaseService::new(pool.clone())),
            pool,
        };
        db.cleanup().await;
        Some(db)
    }

    pub async fn cleanup(&self) {
        sqlx::query(
            "TRUNCATE activity_logs, photos, event_attendees, events, bookings, attendees, properties RESTART IDENTITY CASCADE",
        )
        .execute(&self.pool)
        .await
        .expect("Failed to clean test database");
    }

    pub async fn attendee(&self, name: &str, phone: &str) -> Attendee {
        self.service
            .attendees
            .create(CreateAttendeeRequest {
                name: name.to_string(),
                phone: normalize_phone(phone),
                email: None,
            })
            .await
            .expect("Failed to create attendee")
    }

    pub async fn property(&self, name: &str, nightly_price: &str, max_occupancy: i32) -> Property {
        self.service
            .properties
            .create(CreatePropertyRequest {
                name: name.to_string(),
                address: "1 Beach Road".to_string(),
                latitude: None,
                longitude: None,
                max_occupancy,
                nightly_price: Decimal::from_str(nightly_price).expect("valid price"),
                listing_url: None,
                bedrooms: 3,
                bathrooms: Decimal::from(2),
            })
            .await
            .expect("Failed to create property")
    }

    pub async fn event(&self, title: &str, days_ahead: i64) -> Event {
        self.service
            .events
            .create(CreateEventRequest {
                title: title.to_string(),
                description: None,
                starts_at: Utc::now() + Duration::days(days_ahead),
                location_name: Some("Main house".to_string()),
                location_address: None,
                is_optional: true,
            })
            .await
            .expect("Failed to create event")
    }
}
