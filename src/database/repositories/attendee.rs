//! Attendee repository implementation

use sqlx::PgPool;
use chrono::Utc;
use crate::models::attendee::{Attendee, CreateAttendeeRequest, UpdateAttendeeRequest, TransportDetails};
use crate::utils::errors::Result;

pub(crate) const ATTENDEE_COLUMNS: &str = "id, name, phone, email, telegram_id, has_vehicle, vehicle_seats, needs_pickup, wants_carpool, checked_in, checked_in_at, flight_number, flight_arrival, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct AttendeeRepository {
    pool: PgPool,
}

impl AttendeeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new attendee. The phone must already be normalized.
    pub async fn create(&self, request: CreateAttendeeRequest) -> Result<Attendee> {
        let sql = format!(
            "INSERT INTO attendees (name, phone, email, created_at, updated_at) VALUES ($1, $2, $3, $4, $4) RETURNING {}",
            ATTENDEE_COLUMNS
        );
        let attendee = sqlx::query_as::<_, Attendee>(&sql)
            .bind(request.name)
            .bind(request.phone)
            .bind(request.email)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await?;

        Ok(attendee)
    }

    /// Find attendee by ID
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Attendee>> {
        let sql = format!("SELECT {} FROM attendees WHERE id = $1", ATTENDEE_COLUMNS);
        let attendee = sqlx::query_as::<_, Attendee>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(attendee)
    }

    /// Find attendee by normalized phone
    pub async fn find_by_phone(&self, phone: &str) -> Result<Option<Attendee>> {
        let sql = format!("SELECT {} FROM attendees WHERE phone = $1", ATTENDEE_COLUMNS);
        let attendee = sqlx::query_as::<_, Attendee>(&sql)
            .bind(phone)
            .fetch_optional(&self.pool)
            .await?;

        Ok(attendee)
    }

    /// Find attendee by normalized phone and case-insensitive name
    pub async fn find_by_name_and_phone(&self, name: &str, phone: &str) -> Result<Option<Attendee>> {
        let sql = format!(
            "SELECT {} FROM attendees WHERE phone = $1 AND LOWER(name) = LOWER($2)",
            ATTENDEE_COLUMNS
        );
        let attendee = sqlx::query_as::<_, Attendee>(&sql)
            .bind(phone)
            .bind(name.trim())
            .fetch_optional(&self.pool)
            .await?;

        Ok(attendee)
    }

    /// Find attendee linked to a Telegram account
    pub async fn find_by_telegram_id(&self, telegram_id: i64) -> Result<Option<Attendee>> {
        let sql = format!("SELECT {} FROM attendees WHERE telegram_id = $1", ATTENDEE_COLUMNS);
        let attendee = sqlx::query_as::<_, Attendee>(&sql)
            .bind(telegram_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(attendee)
    }

    /// Link a Telegram account, releasing it from any other attendee first
    pub async fn link_telegram(&self, id: i64, telegram_id: i64) -> Result<Attendee> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE attendees SET telegram_id = NULL, updated_at = $3 WHERE telegram_id = $1 AND id <> $2")
            .bind(telegram_id)
            .bind(id)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

        let sql = format!(
            "UPDATE attendees SET telegram_id = $2, updated_at = $3 WHERE id = $1 RETURNING {}",
            ATTENDEE_COLUMNS
        );
        let attendee = sqlx::query_as::<_, Attendee>(&sql)
            .bind(id)
            .bind(telegram_id)
            .bind(Utc::now())
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(attendee)
    }

    /// List attendees by name with pagination
    pub async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Attendee>> {
        let sql = format!(
            "SELECT {} FROM attendees ORDER BY name ASC LIMIT $1 OFFSET $2",
            ATTENDEE_COLUMNS
        );
        let attendees = sqlx::query_as::<_, Attendee>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(attendees)
    }

    /// List every attendee
    pub async fn list_all(&self) -> Result<Vec<Attendee>> {
        let sql = format!("SELECT {} FROM attendees ORDER BY name ASC", ATTENDEE_COLUMNS);
        let attendees = sqlx::query_as::<_, Attendee>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(attendees)
    }

    /// Update contact fields
    pub async fn update(&self, id: i64, request: UpdateAttendeeRequest) -> Result<Attendee> {
        let sql = format!(
            r#"
            UPDATE attendees
            SET name = COALESCE($2, name),
                phone = COALESCE($3, phone),
                email = COALESCE($4, email),
                updated_at = $5
            WHERE id = $1
            RETURNING {}
            "#,
            ATTENDEE_COLUMNS
        );
        let attendee = sqlx::query_as::<_, Attendee>(&sql)
            .bind(id)
            .bind(request.name)
            .bind(request.phone)
            .bind(request.email)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await?;

        Ok(attendee)
    }

    /// Replace transport flags and flight details
    pub async fn update_transport(&self, id: i64, transport: &TransportDetails) -> Result<Attendee> {
        let sql = format!(
            r#"
            UPDATE attendees
            SET has_vehicle = $2, vehicle_seats = $3, needs_pickup = $4, wants_carpool = $5,
                flight_number = $6, flight_arrival = $7, updated_at = $8
            WHERE id = $1
            RETURNING {}
            "#,
            ATTENDEE_COLUMNS
        );
        let attendee = sqlx::query_as::<_, Attendee>(&sql)
            .bind(id)
            .bind(transport.has_vehicle)
            .bind(transport.vehicle_seats)
            .bind(transport.needs_pickup)
            .bind(transport.wants_carpool)
            .bind(transport.flight_number.clone())
            .bind(transport.flight_arrival)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await?;

        Ok(attendee)
    }

    /// Mark attendee as checked in now
    pub async fn set_checked_in(&self, id: i64) -> Result<Attendee> {
        let now = Utc::now();
        let sql = format!(
            "UPDATE attendees SET checked_in = TRUE, checked_in_at = $2, updated_at = $2 WHERE id = $1 RETURNING {}",
            ATTENDEE_COLUMNS
        );
        let attendee = sqlx::query_as::<_, Attendee>(&sql)
            .bind(id)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;

        Ok(attendee)
    }

    /// Clear check-in so the attendee can run the wizard again
    pub async fn reset_checkin(&self, id: i64) -> Result<Attendee> {
        let sql = format!(
            "UPDATE attendees SET checked_in = FALSE, checked_in_at = NULL, updated_at = $2 WHERE id = $1 RETURNING {}",
            ATTENDEE_COLUMNS
        );
        let attendee = sqlx::query_as::<_, Attendee>(&sql)
            .bind(id)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await?;

        Ok(attendee)
    }

    /// Delete attendee with their bookings and event interest
    pub async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM attendees WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Get attendee count
    pub async fn count(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM attendees")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }

    pub async fn count_checked_in(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM attendees WHERE checked_in = TRUE")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }

    /// Attendees bringing a vehicle
    pub async fn list_with_vehicle(&self) -> Result<Vec<Attendee>> {
        let sql = format!(
            "SELECT {} FROM attendees WHERE has_vehicle = TRUE ORDER BY name ASC",
            ATTENDEE_COLUMNS
        );
        let attendees = sqlx::query_as::<_, Attendee>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(attendees)
    }

    /// Attendees who asked for an airport pickup
    pub async fn list_needing_pickup(&self) -> Result<Vec<Attendee>> {
        let sql = format!(
            "SELECT {} FROM attendees WHERE needs_pickup = TRUE ORDER BY flight_arrival ASC NULLS LAST, name ASC",
            ATTENDEE_COLUMNS
        );
        let attendees = sqlx::query_as::<_, Attendee>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(attendees)
    }

    /// Attendees who want to join a carpool
    pub async fn list_carpool(&self) -> Result<Vec<Attendee>> {
        let sql = format!(
            "SELECT {} FROM attendees WHERE wants_carpool = TRUE ORDER BY name ASC",
            ATTENDEE_COLUMNS
        );
        let attendees = sqlx::query_as::<_, Attendee>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(attendees)
    }
}
