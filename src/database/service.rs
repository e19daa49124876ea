//! Database service layer
//!
//! This module provides a high-level interface to database operations and
//! owns the writes that touch several tables at once.

use std::time::{Duration, Instant};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info};
use crate::database::{
    DatabasePool, PropertyRepository, AttendeeRepository, BookingRepository,
    EventRepository, PhotoRepository, ActivityRepository,
};
use crate::database::repositories::attendee::ATTENDEE_COLUMNS;
use crate::models::*;
use crate::utils::errors::{CbxError, Result};
use crate::utils::logging::log_database_operation;
use crate::utils::retry::{retry_on_network, BOOKING_SAVE_ATTEMPTS};

const BOOKING_RETRY_DELAY: Duration = Duration::from_millis(250);

const BOOKING_UPSERT: &str = r#"
    INSERT INTO bookings (attendee_id, property_id, arrival_date, exit_date, total_amount, paid, amount_paid, amount_due, payment_method, created_at, updated_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
    ON CONFLICT (attendee_id) DO UPDATE
    SET property_id = EXCLUDED.property_id,
        arrival_date = EXCLUDED.arrival_date,
        exit_date = EXCLUDED.exit_date,
        total_amount = EXCLUDED.total_amount,
        paid = EXCLUDED.paid,
        amount_paid = EXCLUDED.amount_paid,
        amount_due = EXCLUDED.amount_due,
        payment_method = EXCLUDED.payment_method,
        updated_at = EXCLUDED.updated_at
    RETURNING id, attendee_id, property_id, arrival_date, exit_date, total_amount, paid, amount_paid, amount_due, payment_method, created_at, updated_at
"#;

#[derive(Debug, Clone)]
pub struct DatabaseService {
    pool: DatabasePool,
    pub properties: PropertyRepository,
    pub attendees: AttendeeRepository,
    pub bookings: BookingRepository,
    pub events: EventRepository,
    pub photos: PhotoRepository,
    pub activity: ActivityRepository,
}

impl DatabaseService {
    pub fn new(pool: DatabasePool) -> Self {
        Self {
            properties: PropertyRepository::new(pool.clone()),
            attendees: AttendeeRepository::new(pool.clone()),
            bookings: BookingRepository::new(pool.clone()),
            events: EventRepository::new(pool.clone()),
            photos: PhotoRepository::new(pool.clone()),
            activity: ActivityRepository::new(pool.clone()),
            pool,
        }
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    /// Persist a finished check-in.
    ///
    /// Booking, attendee flags and the audit row are written in one
    /// transaction. Network failures are retried once.
    pub async fn complete_checkin(&self, outcome: &CheckInOutcome) -> Result<(Attendee, Booking)> {
        if !outcome.checked_in {
            return Err(CbxError::InvalidInput("Check-in outcome is not checked in".to_string()));
        }
        if outcome.exit_date <= outcome.arrival_date {
            return Err(CbxError::InvalidInput("Exit date must be after arrival date".to_string()));
        }

        let started = Instant::now();
        let result = retry_on_network(BOOKING_SAVE_ATTEMPTS, BOOKING_RETRY_DELAY, || {
            self.complete_checkin_once(outcome)
        })
        .await;
        log_database_operation("complete_checkin", "bookings", elapsed_ms(started), result.is_ok());
        let result = result?;

        info!(
            attendee_id = outcome.attendee_id,
            booking_id = result.1.id,
            paid = result.1.paid,
            "Check-in completed"
        );
        Ok(result)
    }

    async fn complete_checkin_once(&self, outcome: &CheckInOutcome) -> Result<(Attendee, Booking)> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let booking = sqlx::query_as::<_, Booking>(BOOKING_UPSERT)
            .bind(outcome.attendee_id)
            .bind(outcome.property_id)
            .bind(outcome.arrival_date)
            .bind(outcome.exit_date)
            .bind(outcome.total_amount)
            .bind(outcome.payment.paid)
            .bind(outcome.payment.amount_paid)
            .bind(outcome.payment.amount_due)
            .bind(outcome.payment.payment_method)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;

        let sql = format!(
            r#"
            UPDATE attendees
            SET checked_in = TRUE, checked_in_at = $2,
                has_vehicle = $3, vehicle_seats = $4, needs_pickup = $5, wants_carpool = $6,
                flight_number = $7, flight_arrival = $8, updated_at = $2
            WHERE id = $1
            RETURNING {}
            "#,
            ATTENDEE_COLUMNS
        );
        let attendee = sqlx::query_as::<_, Attendee>(&sql)
            .bind(outcome.attendee_id)
            .bind(now)
            .bind(outcome.transport.has_vehicle)
            .bind(outcome.transport.vehicle_seats)
            .bind(outcome.transport.needs_pickup)
            .bind(outcome.transport.wants_carpool)
            .bind(outcome.transport.flight_number.clone())
            .bind(outcome.transport.flight_arrival)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(CbxError::AttendeeNotFound { attendee_id: outcome.attendee_id })?;

        insert_activity(
            &mut tx,
            CreateActivityRequest::new(ActivityAction::CheckinCompleted)
                .attendee(outcome.attendee_id)
                .details(serde_json::json!({
                    "booking_id": booking.id,
                    "previous_booking_id": outcome.booking_id,
                    "property_id": booking.property_id,
                    "paid": booking.paid,
                    "payment_method": booking.payment_method,
                })),
        )
        .await?;

        tx.commit().await?;
        Ok((attendee, booking))
    }

    /// Place an attendee in a property, creating or moving their booking.
    ///
    /// The amount is the per-person share of the stay. Payments already
    /// recorded are kept and the remainder becomes the amount due.
    pub async fn assign_attendee(
        &self,
        attendee_id: i64,
        property_id: i64,
        arrival_date: NaiveDate,
        exit_date: NaiveDate,
        actor_telegram_id: Option<i64>,
    ) -> Result<Booking> {
        if exit_date <= arrival_date {
            return Err(CbxError::InvalidInput("Exit date must be after arrival date".to_string()));
        }

        let started = Instant::now();
        let booking = retry_on_network(BOOKING_SAVE_ATTEMPTS, BOOKING_RETRY_DELAY, || {
            self.assign_attendee_once(attendee_id, property_id, arrival_date, exit_date, actor_telegram_id)
        })
        .await;
        log_database_operation("assign_attendee", "bookings", elapsed_ms(started), booking.is_ok());
        let booking = booking?;

        info!(attendee_id, property_id, booking_id = booking.id, "Attendee assigned to property");
        Ok(booking)
    }

    async fn assign_attendee_once(
        &self,
        attendee_id: i64,
        property_id: i64,
        arrival_date: NaiveDate,
        exit_date: NaiveDate,
        actor_telegram_id: Option<i64>,
    ) -> Result<Booking> {
        let mut tx = self.pool.begin().await?;

        let property = sqlx::query_as::<_, Property>(
            "SELECT id, name, address, latitude, longitude, max_occupancy, nightly_price, listing_url, bedrooms, bathrooms, created_at, updated_at FROM properties WHERE id = $1 FOR UPDATE"
        )
        .bind(property_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(CbxError::PropertyNotFound { property_id })?;

        let attendee_exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM attendees WHERE id = $1)")
            .bind(attendee_id)
            .fetch_one(&mut *tx)
            .await?;
        if !attendee_exists.0 {
            return Err(CbxError::AttendeeNotFound { attendee_id });
        }

        let others: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM bookings WHERE property_id = $1 AND attendee_id <> $2"
        )
        .bind(property_id)
        .bind(attendee_id)
        .fetch_one(&mut *tx)
        .await?;
        if others.0 >= i64::from(property.max_occupancy) {
            return Err(CbxError::InvalidInput(format!("{} is full", property.name)));
        }

        let existing = sqlx::query_as::<_, Booking>(
            "SELECT id, attendee_id, property_id, arrival_date, exit_date, total_amount, paid, amount_paid, amount_due, payment_method, created_at, updated_at FROM bookings WHERE attendee_id = $1 FOR UPDATE"
        )
        .bind(attendee_id)
        .fetch_optional(&mut *tx)
        .await?;

        let total = property.share_for_nights((exit_date - arrival_date).num_days());
        let payment = reprice_payment(existing.as_ref(), total);

        let booking = sqlx::query_as::<_, Booking>(BOOKING_UPSERT)
            .bind(attendee_id)
            .bind(property_id)
            .bind(arrival_date)
            .bind(exit_date)
            .bind(total)
            .bind(payment.paid)
            .bind(payment.amount_paid)
            .bind(payment.amount_due)
            .bind(payment.payment_method)
            .bind(Utc::now())
            .fetch_one(&mut *tx)
            .await?;

        let mut activity = CreateActivityRequest::new(ActivityAction::AdminUpdate)
            .attendee(attendee_id)
            .details(serde_json::json!({
                "operation": "assign",
                "booking_id": booking.id,
                "property_id": property_id,
                "previous_property_id": existing.as_ref().map(|b| b.property_id),
                "total_amount": total,
            }));
        if let Some(telegram_id) = actor_telegram_id {
            activity = activity.telegram(telegram_id);
        }
        insert_activity(&mut tx, activity).await?;

        tx.commit().await?;
        Ok(booking)
    }

    /// Mark a booking fully paid and audit it
    pub async fn confirm_payment(
        &self,
        booking_id: i64,
        method: PaymentMethod,
        actor_telegram_id: Option<i64>,
    ) -> Result<Booking> {
        let mut tx = self.pool.begin().await?;

        let booking = BookingRepository::mark_paid_on(&mut *tx, booking_id, method)
            .await?
            .ok_or(CbxError::BookingNotFound { booking_id })?;

        let mut activity = CreateActivityRequest::new(ActivityAction::PaymentConfirmed)
            .attendee(booking.attendee_id)
            .details(serde_json::json!({
                "booking_id": booking.id,
                "amount": booking.total_amount,
                "payment_method": method,
            }));
        if let Some(telegram_id) = actor_telegram_id {
            activity = activity.telegram(telegram_id);
        }
        insert_activity(&mut tx, activity).await?;

        tx.commit().await?;
        info!(booking_id, method = %method, "Payment confirmed");
        Ok(booking)
    }

    /// Clear an attendee's check-in and audit it
    pub async fn reset_checkin(&self, attendee_id: i64, actor_telegram_id: Option<i64>) -> Result<Attendee> {
        let attendee = self.attendees.find_by_id(attendee_id).await?
            .ok_or(CbxError::AttendeeNotFound { attendee_id })?;
        let attendee = self.attendees.reset_checkin(attendee.id).await?;

        let mut activity = CreateActivityRequest::new(ActivityAction::AdminUpdate)
            .attendee(attendee_id)
            .details(serde_json::json!({ "operation": "reset_checkin" }));
        if let Some(telegram_id) = actor_telegram_id {
            activity = activity.telegram(telegram_id);
        }
        self.activity.record(activity).await?;

        Ok(attendee)
    }

    /// Write an audit row, logging instead of failing the caller
    pub async fn record_activity(&self, request: CreateActivityRequest) {
        let action = request.action;
        if let Err(e) = self.activity.record(request).await {
            tracing::warn!(action = %action, error = %e, "Failed to write activity log");
        } else {
            debug!(action = %action, "Activity recorded");
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Payment columns for a booking whose total changed
fn reprice_payment(existing: Option<&Booking>, total: Decimal) -> PaymentUpdate {
    let Some(booking) = existing else {
        return PaymentUpdate {
            paid: false,
            amount_paid: None,
            amount_due: Some(total),
            payment_method: None,
        };
    };

    let received = booking.received();
    let due = (total - received).max(Decimal::ZERO);
    PaymentUpdate {
        paid: due.is_zero() && received > Decimal::ZERO,
        amount_paid: (received > Decimal::ZERO).then_some(received),
        amount_due: Some(due),
        payment_method: booking.payment_method,
    }
}

async fn insert_activity(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    request: CreateActivityRequest,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO activity_logs (attendee_id, telegram_id, action, details, created_at) VALUES ($1, $2, $3, $4, $5)"
    )
    .bind(request.attendee_id)
    .bind(request.telegram_id)
    .bind(request.action.as_str())
    .bind(request.details)
    .bind(Utc::now())
    .execute(&mut **tx)
    .await?;

    Ok(())
}
