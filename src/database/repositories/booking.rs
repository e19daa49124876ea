//! Booking repository implementation

use sqlx::{PgConnection, PgPool};
use chrono::Utc;
use crate::models::booking::{Booking, PaymentMethod, PaymentUpdate, CreateBookingRequest, UpdateBookingRequest};
use crate::utils::errors::Result;

#[derive(Debug, Clone)]
pub struct BookingRepository {
    pool: PgPool,
}

impl BookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new booking
    pub async fn create(&self, request: CreateBookingRequest) -> Result<Booking> {
        let booking = sqlx::query_as::<_, Booking>(
            r#"
            INSERT INTO bookings (attendee_id, property_id, arrival_date, exit_date, total_amount, amount_due, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5, $6, $6)
            RETURNING id, attendee_id, property_id, arrival_date, exit_date, total_amount, paid, amount_paid, amount_due, payment_method, created_at, updated_at
            "#
        )
        .bind(request.attendee_id)
        .bind(request.property_id)
        .bind(request.arrival_date)
        .bind(request.exit_date)
        .bind(request.total_amount)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(booking)
    }

    /// Find booking by ID
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Booking>> {
        let booking = sqlx::query_as::<_, Booking>(
            "SELECT id, attendee_id, property_id, arrival_date, exit_date, total_amount, paid, amount_paid, amount_due, payment_method, created_at, updated_at FROM bookings WHERE id = $1"
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(booking)
    }

    /// Find the booking held by an attendee
    pub async fn find_for_attendee(&self, attendee_id: i64) -> Result<Option<Booking>> {
        let booking = sqlx::query_as::<_, Booking>(
            "SELECT id, attendee_id, property_id, arrival_date, exit_date, total_amount, paid, amount_paid, amount_due, payment_method, created_at, updated_at FROM bookings WHERE attendee_id = $1"
        )
        .bind(attendee_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(booking)
    }

    /// List all bookings ordered by arrival
    pub async fn list(&self) -> Result<Vec<Booking>> {
        let bookings = sqlx::query_as::<_, Booking>(
            "SELECT id, attendee_id, property_id, arrival_date, exit_date, total_amount, paid, amount_paid, amount_due, payment_method, created_at, updated_at FROM bookings ORDER BY arrival_date ASC, id ASC"
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(bookings)
    }

    /// List bookings for one property
    pub async fn list_for_property(&self, property_id: i64) -> Result<Vec<Booking>> {
        let bookings = sqlx::query_as::<_, Booking>(
            "SELECT id, attendee_id, property_id, arrival_date, exit_date, total_amount, paid, amount_paid, amount_due, payment_method, created_at, updated_at FROM bookings WHERE property_id = $1 ORDER BY arrival_date ASC"
        )
        .bind(property_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(bookings)
    }

    /// Update booking placement and amount
    pub async fn update(&self, id: i64, request: UpdateBookingRequest) -> Result<Booking> {
        let booking = sqlx::query_as::<_, Booking>(
            r#"
            UPDATE bookings
            SET property_id = COALESCE($2, property_id),
                arrival_date = COALESCE($3, arrival_date),
                exit_date = COALESCE($4, exit_date),
                total_amount = COALESCE($5, total_amount),
                updated_at = $6
            WHERE id = $1
            RETURNING id, attendee_id, property_id, arrival_date, exit_date, total_amount, paid, amount_paid, amount_due, payment_method, created_at, updated_at
            "#
        )
        .bind(id)
        .bind(request.property_id)
        .bind(request.arrival_date)
        .bind(request.exit_date)
        .bind(request.total_amount)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(booking)
    }

    /// Mark booking fully paid with the given method
    pub async fn mark_paid(&self, id: i64, method: PaymentMethod) -> Result<Option<Booking>> {
        let mut conn = self.pool.acquire().await?;
        Self::mark_paid_on(&mut conn, id, method).await
    }

    /// `mark_paid` on a caller's connection or open transaction
    pub async fn mark_paid_on(conn: &mut PgConnection, id: i64, method: PaymentMethod) -> Result<Option<Booking>> {
        let booking = sqlx::query_as::<_, Booking>(
            r#"
            UPDATE bookings
            SET paid = TRUE,
                amount_paid = GREATEST(COALESCE(amount_paid, 0), total_amount),
                amount_due = 0,
                payment_method = $2,
                updated_at = $3
            WHERE id = $1
            RETURNING id, attendee_id, property_id, arrival_date, exit_date, total_amount, paid, amount_paid, amount_due, payment_method, created_at, updated_at
            "#
        )
        .bind(id)
        .bind(method)
        .bind(Utc::now())
        .fetch_optional(&mut *conn)
        .await?;

        Ok(booking)
    }

    /// Write all payment columns at once
    pub async fn record_payment(&self, id: i64, payment: &PaymentUpdate) -> Result<Booking> {
        let booking = sqlx::query_as::<_, Booking>(
            r#"
            UPDATE bookings
            SET paid = $2, amount_paid = $3, amount_due = $4, payment_method = $5, updated_at = $6
            WHERE id = $1
            RETURNING id, attendee_id, property_id, arrival_date, exit_date, total_amount, paid, amount_paid, amount_due, payment_method, created_at, updated_at
            "#
        )
        .bind(id)
        .bind(payment.paid)
        .bind(payment.amount_paid)
        .bind(payment.amount_due)
        .bind(payment.payment_method)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(booking)
    }

    /// Delete booking
    pub async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM bookings WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
