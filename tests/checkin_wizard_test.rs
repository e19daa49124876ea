//! Check-in wizard properties
//!
//! Drives the wizard without I/O over generated stays, transport answers
//! and payment choices.

mod helpers;

use chrono::{Duration, TimeZone, Utc};
use helpers::*;
use proptest::prelude::*;
use rust_decimal::Decimal;
use cbx_rentals::models::PaymentMethod;
use cbx_rentals::services::{CheckInDraft, CheckInWizard, FlightDetails, PaymentChoice, TransportChoice};
use cbx_rentals::state::{CheckInStep, ConversationContext, ScenarioManager};

fn start(telegram_id: i64) -> (CheckInWizard, ConversationContext) {
    let wizard = CheckInWizard::new(ScenarioManager::new(), test_trip());
    let mut context = ConversationContext::new(telegram_id);
    let attendee = sample_attendee(1, "Robin Quinn");
    wizard.begin(&mut context, &CheckInDraft::new(&attendee, None)).unwrap();
    (wizard, context)
}

fn method_strategy() -> impl Strategy<Value = PaymentMethod> {
    prop::sample::select(PaymentMethod::ALL.to_vec())
}

fn transport_strategy() -> impl Strategy<Value = TransportChoice> {
    let flight = (0u32..24, 0u32..60).prop_map(|(hour, minute)| FlightDetails {
        number: "UA88".to_string(),
        arrival: Utc.with_ymd_and_hms(2026, 3, 12, hour, minute, 0).unwrap(),
    });
    prop_oneof![
        prop::option::of(0i32..8).prop_map(|seats| TransportChoice::OwnVehicle { seats }),
        flight.clone().prop_map(|flight| TransportChoice::Flying { flight }),
        Just(TransportChoice::Carpool),
        prop::option::of(flight).prop_map(|flight| TransportChoice::NeedsPickup { flight }),
    ]
}

/// Stay offsets inside the five-night trip window
fn stay_strategy() -> impl Strategy<Value = (i64, i64)> {
    (0i64..5).prop_flat_map(|arrival| (Just(arrival), (arrival + 1)..=5))
}

proptest! {
    #[test]
    fn completed_wizard_is_checked_in_and_paid_only_when_full(
        (arrival_offset, exit_offset) in stay_strategy(),
        transport in transport_strategy(),
        price in 100i64..2000,
        occupancy in 1i32..12,
        method in method_strategy(),
        payment_kind in 0u8..3,
        partial_cents in 1i64..10_000,
    ) {
        let trip = test_trip();
        let arrival = trip.start_date + Duration::days(arrival_offset);
        let exit = trip.start_date + Duration::days(exit_offset);
        let (wizard, mut ctx) = start(500);

        wizard.submit_dates(&mut ctx, arrival, exit).unwrap();
        wizard.submit_arrival(&mut ctx, transport.clone()).unwrap();
        let draft = wizard.submit_property(&mut ctx, &sample_property(3, price, occupancy), 0).unwrap();
        let total = draft.total_amount.unwrap();
        prop_assert!(total > Decimal::ZERO);

        let choice = match payment_kind {
            0 => PaymentChoice::Full { method },
            1 => {
                let amount = Decimal::new(partial_cents, 2);
                prop_assume!(amount < total);
                PaymentChoice::Partial { method, amount }
            }
            _ => PaymentChoice::Later,
        };
        let full = matches!(choice, PaymentChoice::Full { .. });
        wizard.submit_payment(&mut ctx, choice).unwrap();

        prop_assert_eq!(wizard.current_step(&ctx), Some(CheckInStep::Complete));
        let outcome = wizard.outcome(&ctx).unwrap();
        prop_assert!(outcome.checked_in);
        prop_assert_eq!(outcome.payment.paid, full);
        prop_assert_eq!(outcome.transport, transport.details());

        let paid = outcome.payment.amount_paid.unwrap_or(Decimal::ZERO);
        prop_assert_eq!(paid + outcome.payment.amount_due.unwrap(), total);
    }

    #[test]
    fn dates_outside_trip_never_advance(before in 1i64..30, nights in 1i64..10) {
        let trip = test_trip();
        let arrival = trip.start_date - Duration::days(before);
        let (wizard, mut ctx) = start(501);

        prop_assert!(wizard.submit_dates(&mut ctx, arrival, arrival + Duration::days(nights)).is_err());
        prop_assert_eq!(wizard.current_step(&ctx), Some(CheckInStep::Dates));
    }
}

#[test]
fn test_back_from_payment_returns_to_property() {
    let (wizard, mut ctx) = start(502);
    wizard.submit_dates(&mut ctx, date("2026-03-12"), date("2026-03-14")).unwrap();
    wizard.submit_arrival(&mut ctx, TransportChoice::Carpool).unwrap();
    wizard.submit_property(&mut ctx, &sample_property(1, 600, 6), 0).unwrap();

    assert_eq!(wizard.back(&mut ctx).unwrap(), CheckInStep::Property);
    let draft = wizard.draft(&ctx).unwrap();
    assert_eq!(draft.property_id, Some(1));
    assert_eq!(draft.transport, Some(TransportChoice::Carpool));
}

#[test]
fn test_out_of_order_submission_rejected() {
    let (wizard, mut ctx) = start(503);
    let result = wizard.submit_payment(&mut ctx, PaymentChoice::Later);
    assert!(result.is_err());
    assert_eq!(wizard.current_step(&ctx), Some(CheckInStep::Dates));
}

#[test]
fn test_outcome_before_completion_rejected() {
    let (wizard, mut ctx) = start(504);
    wizard.submit_dates(&mut ctx, date("2026-03-13"), date("2026-03-15")).unwrap();
    assert!(wizard.outcome(&ctx).is_err());
}
