//! Event repository implementation

use sqlx::PgPool;
use chrono::{DateTime, Utc};
use crate::models::attendee::Attendee;
use crate::models::event::{Event, EventAttendee, EventInterestCount, CreateEventRequest, UpdateEventRequest};
use crate::utils::errors::Result;

#[derive(Debug, Clone)]
pub struct EventRepository {
    pool: PgPool,
}

impl EventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new event
    pub async fn create(&self, request: CreateEventRequest) -> Result<Event> {
        let event = sqlx::query_as::<_, Event>(
            r#"
            INSERT INTO events (title, description, starts_at, location_name, location_address, is_optional, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING id, title, description, starts_at, location_name, location_address, is_optional, created_at, updated_at
            "#
        )
        .bind(request.title)
        .bind(request.description)
        .bind(request.starts_at)
        .bind(request.location_name)
        .bind(request.location_address)
        .bind(request.is_optional)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(event)
    }

    /// Find event by ID
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Event>> {
        let event = sqlx::query_as::<_, Event>(
            "SELECT id, title, description, starts_at, location_name, location_address, is_optional, created_at, updated_at FROM events WHERE id = $1"
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(event)
    }

    /// List the whole schedule
    pub async fn list(&self) -> Result<Vec<Event>> {
        let events = sqlx::query_as::<_, Event>(
            "SELECT id, title, description, starts_at, location_name, location_address, is_optional, created_at, updated_at FROM events ORDER BY starts_at ASC"
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    /// Get events starting after `now`
    pub async fn list_upcoming(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Event>> {
        let events = sqlx::query_as::<_, Event>(
            "SELECT id, title, description, starts_at, location_name, location_address, is_optional, created_at, updated_at FROM events WHERE starts_at >= $1 ORDER BY starts_at ASC LIMIT $2"
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    /// Update event
    pub async fn update(&self, id: i64, request: UpdateEventRequest) -> Result<Event> {
        let event = sqlx::query_as::<_, Event>(
            r#"
            UPDATE events
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                starts_at = COALESCE($4, starts_at),
                location_name = COALESCE($5, location_name),
                location_address = COALESCE($6, location_address),
                is_optional = COALESCE($7, is_optional),
                updated_at = $8
            WHERE id = $1
            RETURNING id, title, description, starts_at, location_name, location_address, is_optional, created_at, updated_at
            "#
        )
        .bind(id)
        .bind(request.title)
        .bind(request.description)
        .bind(request.starts_at)
        .bind(request.location_name)
        .bind(request.location_address)
        .bind(request.is_optional)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(event)
    }

    /// Delete event
    pub async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Check if attendee marked interest in event
    pub async fn is_interested(&self, event_id: i64, attendee_id: i64) -> Result<bool> {
        let exists: (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM event_attendees WHERE event_id = $1 AND attendee_id = $2)"
        )
        .bind(event_id)
        .bind(attendee_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists.0)
    }

    /// Mark interest. Marking twice keeps the original row.
    pub async fn add_interest(&self, event_id: i64, attendee_id: i64) -> Result<Option<EventAttendee>> {
        let row = sqlx::query_as::<_, EventAttendee>(
            r#"
            INSERT INTO event_attendees (event_id, attendee_id, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (event_id, attendee_id) DO NOTHING
            RETURNING id, event_id, attendee_id, created_at
            "#
        )
        .bind(event_id)
        .bind(attendee_id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Remove interest, returning whether a row was deleted
    pub async fn remove_interest(&self, event_id: i64, attendee_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM event_attendees WHERE event_id = $1 AND attendee_id = $2")
            .bind(event_id)
            .bind(attendee_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Flip interest and return the new state
    pub async fn toggle_interest(&self, event_id: i64, attendee_id: i64) -> Result<bool> {
        if self.remove_interest(event_id, attendee_id).await? {
            return Ok(false);
        }

        self.add_interest(event_id, attendee_id).await?;
        Ok(true)
    }

    /// Attendees interested in an event
    pub async fn interested_attendees(&self, event_id: i64) -> Result<Vec<Attendee>> {
        let attendees = sqlx::query_as::<_, Attendee>(
            r#"
            SELECT a.id, a.name, a.phone, a.email, a.telegram_id, a.has_vehicle, a.vehicle_seats, a.needs_pickup, a.wants_carpool,
                   a.checked_in, a.checked_in_at, a.flight_number, a.flight_arrival, a.created_at, a.updated_at
            FROM attendees a
            JOIN event_attendees ea ON ea.attendee_id = a.id
            WHERE ea.event_id = $1
            ORDER BY a.name ASC
            "#
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(attendees)
    }

    /// Event IDs an attendee is interested in
    pub async fn interests_for_attendee(&self, attendee_id: i64) -> Result<Vec<i64>> {
        let rows: Vec<(i64,)> = sqlx::query_as("SELECT event_id FROM event_attendees WHERE attendee_id = $1")
            .bind(attendee_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Interest count per event, including events nobody picked
    pub async fn interest_counts(&self) -> Result<Vec<EventInterestCount>> {
        let counts = sqlx::query_as::<_, EventInterestCount>(
            r#"
            SELECT e.id AS event_id, COUNT(ea.id) AS interested
            FROM events e
            LEFT JOIN event_attendees ea ON ea.event_id = e.id
            GROUP BY e.id
            ORDER BY e.id
            "#
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(counts)
    }
}
