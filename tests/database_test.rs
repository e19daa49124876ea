//! Repository and transaction tests against PostgreSQL
//!
//! Set `TEST_DATABASE_URL` to run these; they are skipped otherwise.

mod helpers;

use assert_matches::assert_matches;
use helpers::*;
use rust_decimal::Decimal;
use serial_test::serial;
use std::str::FromStr;
use cbx_rentals::models::{
    ActivityAction, CheckInOutcome, CreateActivityRequest, CreatePhotoRequest, PaymentMethod, PaymentUpdate,
    TransportDetails,
};
use cbx_rentals::services::{CheckInDraft, CheckInWizard, PaymentChoice, ReportService, TransportChoice};
use cbx_rentals::state::{ConversationContext, ScenarioManager};
use cbx_rentals::utils::helpers::normalize_phone;
use cbx_rentals::CbxError;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

#[tokio::test]
#[serial]
async fn test_phone_lookup_ignores_formatting() {
    let Some(db) = TestDatabase::connect().await else { return };
    let created = db.attendee("Jordan Park", "(555) 010-2000").await;

    let found = db.service.attendees.find_by_phone(&normalize_phone("+1 555 010 2000")).await.unwrap();
    assert_eq!(found.map(|a| a.id), Some(created.id));

    let missing = db.service.attendees.find_by_phone(&normalize_phone("555 010 2001")).await.unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
#[serial]
async fn test_assign_then_mark_paid_is_visible() {
    let Some(db) = TestDatabase::connect().await else { return };
    let attendee = db.attendee("Jordan Park", "5550102000").await;
    let property = db.property("Casa Azul", "600.00", 6).await;

    let booking = db.service
        .assign_attendee(attendee.id, property.id, date("2026-03-12"), date("2026-03-16"), Some(1))
        .await
        .unwrap();
    assert_eq!(booking.total_amount, dec("400.00"));
    assert!(!booking.paid);

    db.service.confirm_payment(booking.id, PaymentMethod::Zelle, Some(1)).await.unwrap();

    let reloaded = db.service.bookings.find_for_attendee(attendee.id).await.unwrap().unwrap();
    assert!(reloaded.paid);
    assert_eq!(reloaded.outstanding(), Decimal::ZERO);
    assert_eq!(reloaded.payment_method, Some(PaymentMethod::Zelle));

    let log = db.service.activity.for_attendee(attendee.id, 10).await.unwrap();
    assert!(log.iter().any(|entry| entry.parsed_action() == Some(ActivityAction::PaymentConfirmed)));
}

#[tokio::test]
#[serial]
async fn test_assign_rejects_full_property() {
    let Some(db) = TestDatabase::connect().await else { return };
    let first = db.attendee("Avery One", "5550103001").await;
    let second = db.attendee("Blake Two", "5550103002").await;
    let property = db.property("Tiny Cabin", "200", 1).await;

    db.service
        .assign_attendee(first.id, property.id, date("2026-03-12"), date("2026-03-14"), None)
        .await
        .unwrap();
    let result = db.service
        .assign_attendee(second.id, property.id, date("2026-03-12"), date("2026-03-14"), None)
        .await;
    assert_matches!(result, Err(CbxError::InvalidInput(_)));
}

#[tokio::test]
#[serial]
async fn test_toggle_interest_twice_restores_state() {
    let Some(db) = TestDatabase::connect().await else { return };
    let attendee = db.attendee("Casey Three", "5550104000").await;
    let event = db.event("Sunset boat", 3).await;

    assert!(db.service.events.toggle_interest(event.id, attendee.id).await.unwrap());
    assert!(db.service.events.is_interested(event.id, attendee.id).await.unwrap());

    assert!(!db.service.events.toggle_interest(event.id, attendee.id).await.unwrap());
    assert!(!db.service.events.is_interested(event.id, attendee.id).await.unwrap());
    assert!(db.service.events.interests_for_attendee(attendee.id).await.unwrap().is_empty());
}

#[tokio::test]
#[serial]
async fn test_complete_checkin_writes_booking_and_flags() {
    let Some(db) = TestDatabase::connect().await else { return };
    let attendee = db.attendee("Drew Four", "5550105000").await;
    let property = db.property("Villa Sol", "900", 6).await;

    let outcome = CheckInOutcome {
        attendee_id: attendee.id,
        booking_id: None,
        property_id: property.id,
        arrival_date: date("2026-03-13"),
        exit_date: date("2026-03-15"),
        total_amount: dec("300.00"),
        payment: PaymentUpdate {
            paid: false,
            amount_paid: Some(dec("100.00")),
            amount_due: Some(dec("200.00")),
            payment_method: Some(PaymentMethod::Venmo),
        },
        transport: TransportDetails {
            has_vehicle: true,
            vehicle_seats: Some(2),
            ..TransportDetails::default()
        },
        checked_in: true,
    };

    let (updated, booking) = db.service.complete_checkin(&outcome).await.unwrap();
    assert!(updated.checked_in);
    assert!(updated.checked_in_at.is_some());
    assert_eq!(updated.vehicle_seats, Some(2));
    assert_eq!(booking.outstanding(), dec("200.00"));

    // Running it again updates the same booking
    let (_, again) = db.service.complete_checkin(&outcome).await.unwrap();
    assert_eq!(again.id, booking.id);

    let reset = db.service.reset_checkin(attendee.id, Some(1)).await.unwrap();
    assert!(!reset.checked_in);
}

#[tokio::test]
#[serial]
async fn test_reports_reflect_bookings() {
    let Some(db) = TestDatabase::connect().await else { return };
    let paid = db.attendee("Emery Five", "5550106001").await;
    let unpaid = db.attendee("Finley Six", "5550106002").await;
    let property = db.property("Casa Verde", "400", 4).await;

    let booking = db.service
        .assign_attendee(paid.id, property.id, date("2026-03-12"), date("2026-03-16"), None)
        .await
        .unwrap();
    db.service.confirm_payment(booking.id, PaymentMethod::Cash, None).await.unwrap();
    db.service
        .assign_attendee(unpaid.id, property.id, date("2026-03-12"), date("2026-03-14"), None)
        .await
        .unwrap();

    let reports = ReportService::new(db.service.clone(), "USD".to_string());
    let occupancy = reports.occupancy().await.unwrap();
    assert_eq!(occupancy.booked, 2);
    assert_eq!(occupancy.rows[0].free, 2);

    let payments = reports.payments().await.unwrap();
    assert_eq!((payments.paid_count, payments.unpaid_count), (1, 1));
    assert_eq!(payments.received, dec("400.00"));
    assert_eq!(payments.outstanding, dec("200.00"));
}

#[tokio::test]
#[serial]
async fn test_name_phone_lookup_and_telegram_link() {
    let Some(db) = TestDatabase::connect().await else { return };
    let attendee = db.attendee("Gray Nine", "5550107000").await;
    let phone = normalize_phone("555-010-7000");

    let found = db.service.attendees.find_by_name_and_phone("  gray NINE ", &phone).await.unwrap();
    assert_eq!(found.map(|a| a.id), Some(attendee.id));
    assert!(db.service.attendees.find_by_name_and_phone("Someone Else", &phone).await.unwrap().is_none());

    db.service.attendees.link_telegram(attendee.id, 424242).await.unwrap();
    let linked = db.service.attendees.find_by_telegram_id(424242).await.unwrap();
    assert_eq!(linked.map(|a| a.id), Some(attendee.id));

    // Linking the same Telegram account elsewhere moves it
    let other = db.attendee("Hollis Ten", "5550107001").await;
    db.service.attendees.link_telegram(other.id, 424242).await.unwrap();
    let moved = db.service.attendees.find_by_telegram_id(424242).await.unwrap();
    assert_eq!(moved.map(|a| a.id), Some(other.id));
}

#[tokio::test]
#[serial]
async fn test_transport_lists_and_checked_in_count() {
    let Some(db) = TestDatabase::connect().await else { return };
    let rider = db.attendee("Jamie Pickup", "5550108001").await;
    let pooler = db.attendee("Kai Carpool", "5550108002").await;

    db.service.attendees.update_transport(rider.id, &TransportDetails {
        needs_pickup: true,
        flight_number: Some("DL404".to_string()),
        ..TransportDetails::default()
    }).await.unwrap();
    db.service.attendees.update_transport(pooler.id, &TransportDetails {
        wants_carpool: true,
        ..TransportDetails::default()
    }).await.unwrap();
    db.service.attendees.set_checked_in(pooler.id).await.unwrap();

    let pickups = db.service.attendees.list_needing_pickup().await.unwrap();
    assert_eq!(pickups.iter().map(|a| a.id).collect::<Vec<_>>(), vec![rider.id]);
    let carpool = db.service.attendees.list_carpool().await.unwrap();
    assert_eq!(carpool.iter().map(|a| a.id).collect::<Vec<_>>(), vec![pooler.id]);
    assert_eq!(db.service.attendees.count_checked_in().await.unwrap(), 1);
}

#[tokio::test]
#[serial]
async fn test_record_partial_payment() {
    let Some(db) = TestDatabase::connect().await else { return };
    let attendee = db.attendee("Logan Partial", "5550109000").await;
    let property = db.property("Casa Roja", "300", 3).await;
    let booking = db.service
        .assign_attendee(attendee.id, property.id, date("2026-03-12"), date("2026-03-15"), None)
        .await
        .unwrap();
    assert_eq!(booking.total_amount, dec("300.00"));

    let updated = db.service.bookings.record_payment(booking.id, &PaymentUpdate {
        paid: false,
        amount_paid: Some(dec("120.00")),
        amount_due: Some(dec("180.00")),
        payment_method: Some(PaymentMethod::CashApp),
    }).await.unwrap();
    assert_eq!(updated.received(), dec("120.00"));
    assert_eq!(updated.outstanding(), dec("180.00"));

    // Moving to another house reprices and keeps what was paid
    let bigger = db.property("Casa Grande", "600", 3).await;
    let moved = db.service
        .assign_attendee(attendee.id, bigger.id, date("2026-03-12"), date("2026-03-15"), None)
        .await
        .unwrap();
    assert_eq!(moved.id, booking.id);
    assert_eq!(moved.total_amount, dec("600.00"));
    assert_eq!(moved.received(), dec("120.00"));
    assert_eq!(moved.outstanding(), dec("480.00"));
}

#[tokio::test]
#[serial]
async fn test_mark_paid_keeps_larger_received_amount() {
    let Some(db) = TestDatabase::connect().await else { return };
    let attendee = db.attendee("Riley Mark", "5550109100").await;
    let property = db.property("Casa Verde", "300", 3).await;
    let booking = db.service
        .assign_attendee(attendee.id, property.id, date("2026-03-12"), date("2026-03-15"), None)
        .await
        .unwrap();

    db.service.bookings.record_payment(booking.id, &PaymentUpdate {
        paid: false,
        amount_paid: Some(dec("350.00")),
        amount_due: Some(Decimal::ZERO),
        payment_method: Some(PaymentMethod::Cash),
    }).await.unwrap();

    let paid = db.service.bookings.mark_paid(booking.id, PaymentMethod::Venmo).await.unwrap().unwrap();
    assert!(paid.paid);
    assert_eq!(paid.amount_paid, Some(dec("350.00")));
    assert_eq!(paid.outstanding(), Decimal::ZERO);
    assert_eq!(paid.payment_method, Some(PaymentMethod::Venmo));

    assert!(db.service.bookings.mark_paid(booking.id + 1000, PaymentMethod::Venmo).await.unwrap().is_none());
    assert_matches!(
        db.service.confirm_payment(booking.id + 1000, PaymentMethod::Venmo, None).await,
        Err(CbxError::BookingNotFound { .. })
    );
}

#[tokio::test]
#[serial]
async fn test_checkin_after_confirmed_payment_stays_paid() {
    let Some(db) = TestDatabase::connect().await else { return };
    let attendee = db.attendee("Casey Settled", "5550109200").await;
    let property = db.property("Casa Blanca", "600", 6).await;
    let booking = db.service
        .assign_attendee(attendee.id, property.id, date("2026-03-12"), date("2026-03-16"), None)
        .await
        .unwrap();
    let booking = db.service.confirm_payment(booking.id, PaymentMethod::Zelle, Some(1)).await.unwrap();

    let wizard = CheckInWizard::new(ScenarioManager::new(), test_trip());
    let mut ctx = ConversationContext::new(attendee.telegram_id.unwrap_or(1));
    wizard.begin(&mut ctx, &CheckInDraft::new(&attendee, Some(&booking))).unwrap();
    wizard.submit_dates(&mut ctx, booking.arrival_date, booking.exit_date).unwrap();
    wizard.submit_arrival(&mut ctx, TransportChoice::Carpool).unwrap();
    wizard.submit_property(&mut ctx, &property, 0).unwrap();
    wizard.submit_payment(&mut ctx, PaymentChoice::Later).unwrap();

    let (_, saved) = db.service.complete_checkin(&wizard.outcome(&ctx).unwrap()).await.unwrap();
    assert_eq!(saved.id, booking.id);
    assert!(saved.paid);
    assert_eq!(saved.received(), dec("400.00"));
    assert_eq!(saved.outstanding(), Decimal::ZERO);
    assert_eq!(saved.payment_method, Some(PaymentMethod::Zelle));
}

#[tokio::test]
#[serial]
async fn test_event_interest_listing() {
    let Some(db) = TestDatabase::connect().await else { return };
    let first = db.attendee("Morgan Eleven", "5550110001").await;
    let second = db.attendee("Noel Twelve", "5550110002").await;
    let event = db.event("Snorkel trip", 2).await;

    db.service.events.add_interest(event.id, first.id).await.unwrap();
    db.service.events.add_interest(event.id, second.id).await.unwrap();
    // Adding twice is a no-op
    assert!(db.service.events.add_interest(event.id, first.id).await.unwrap().is_none());

    let interested = db.service.events.interested_attendees(event.id).await.unwrap();
    assert_eq!(interested.len(), 2);
    let counts = db.service.events.interest_counts().await.unwrap();
    assert_eq!(counts.iter().find(|c| c.event_id == event.id).map(|c| c.interested), Some(2));
}

#[tokio::test]
#[serial]
async fn test_photos_and_activity_counts() {
    let Some(db) = TestDatabase::connect().await else { return };
    let attendee = db.attendee("Oakley Photo", "5550111000").await;

    let photo = db.service.photos.create(CreatePhotoRequest {
        attendee_id: Some(attendee.id),
        object_key: format!("attendees/{}/abc-beach.jpg", attendee.id),
        url: "https://files.example.com/beach.jpg".to_string(),
        content_type: "image/jpeg".to_string(),
        size_bytes: 2048,
        width: Some(800),
        height: Some(600),
        caption: Some("Day one".to_string()),
    }).await.unwrap();
    let photos = db.service.photos.list_for_attendee(attendee.id).await.unwrap();
    assert_eq!(photos.iter().map(|p| p.id).collect::<Vec<_>>(), vec![photo.id]);

    for _ in 0..2 {
        db.service.record_activity(CreateActivityRequest::new(ActivityAction::Login).attendee(attendee.id)).await;
    }
    db.service.record_activity(CreateActivityRequest::new(ActivityAction::PhotoUploaded).attendee(attendee.id)).await;

    let counts = db.service.activity.count_by_action().await.unwrap();
    let login = counts.iter().find(|c| c.action == "login").map(|c| c.count);
    assert_eq!(login, Some(2));

    let report = ReportService::new(db.service.clone(), "USD".to_string()).activity().await.unwrap();
    assert_eq!(report.counts.get("photo_uploaded"), Some(&1));
    assert_eq!(report.recent_logins.len(), 2);
}
