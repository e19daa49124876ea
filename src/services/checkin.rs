//! Check-in wizard
//!
//! An attendee walks through four steps: stay dates, arrival and transport,
//! property, payment. Answers accumulate in a [`CheckInDraft`] kept in the
//! conversation context. Nothing reaches the database until the last step,
//! when the draft becomes a [`CheckInOutcome`] written in one transaction.

use std::sync::Arc;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use crate::config::TripConfig;
use crate::database::DatabaseService;
use crate::models::{
    ActivityAction, Attendee, Booking, CheckInOutcome, CreateActivityRequest, PaymentMethod,
    PaymentUpdate, Property, PropertyOccupancy, TransportDetails,
};
use crate::state::{CheckInStep, ConversationContext, ScenarioManager, StateStorage, CHECKIN_SCENARIO};
use crate::utils::errors::{CbxError, Result};
use crate::utils::helpers::nights_between;
use crate::utils::logging::log_checkin_step;

const DRAFT_KEY: &str = "draft";

/// A flight as typed by the attendee
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightDetails {
    pub number: String,
    pub arrival: DateTime<Utc>,
}

impl FlightDetails {
    /// Parse `AA1234 2026-03-12 14:05`. Times are taken as UTC.
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = || CbxError::InvalidInput("checkin.arrival.flight_invalid".to_string());
        let mut parts = input.split_whitespace();
        let (Some(number), Some(date), Some(time), None) = (parts.next(), parts.next(), parts.next(), parts.next()) else {
            return Err(invalid());
        };

        let naive = NaiveDateTime::parse_from_str(&format!("{} {}", date, time), "%Y-%m-%d %H:%M")
            .map_err(|_| invalid())?;

        Ok(Self {
            number: number.to_uppercase(),
            arrival: Utc.from_utc_datetime(&naive),
        })
    }
}

/// How the attendee gets to the venue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransportChoice {
    OwnVehicle { seats: Option<i32> },
    Flying { flight: FlightDetails },
    Carpool,
    NeedsPickup { flight: Option<FlightDetails> },
}

impl TransportChoice {
    pub fn details(&self) -> TransportDetails {
        let mut details = TransportDetails::default();
        match self {
            TransportChoice::OwnVehicle { seats } => {
                details.has_vehicle = true;
                details.vehicle_seats = *seats;
            }
            TransportChoice::Flying { flight } => {
                details.flight_number = Some(flight.number.clone());
                details.flight_arrival = Some(flight.arrival);
            }
            TransportChoice::Carpool => {
                details.wants_carpool = true;
            }
            TransportChoice::NeedsPickup { flight } => {
                details.needs_pickup = true;
                if let Some(flight) = flight {
                    details.flight_number = Some(flight.number.clone());
                    details.flight_arrival = Some(flight.arrival);
                }
            }
        }
        details
    }
}

/// How the attendee settles their share
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PaymentChoice {
    Full { method: PaymentMethod },
    Partial { method: PaymentMethod, amount: Decimal },
    Later,
}

/// Answers collected so far
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckInDraft {
    pub attendee_id: i64,
    pub booking_id: Option<i64>,
    pub arrival_date: Option<NaiveDate>,
    pub exit_date: Option<NaiveDate>,
    pub transport: Option<TransportChoice>,
    pub property_id: Option<i64>,
    pub total_amount: Option<Decimal>,
    pub payment: Option<PaymentChoice>,
    /// Booking as it was when the wizard started
    pub existing: Option<ExistingBooking>,
}

/// The parts of a prior booking the wizard needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExistingBooking {
    pub property_id: i64,
    pub arrival_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub total_amount: Decimal,
    pub paid: bool,
    pub amount_paid: Option<Decimal>,
    pub payment_method: Option<PaymentMethod>,
}

impl From<&Booking> for ExistingBooking {
    fn from(booking: &Booking) -> Self {
        Self {
            property_id: booking.property_id,
            arrival_date: booking.arrival_date,
            exit_date: booking.exit_date,
            total_amount: booking.total_amount,
            paid: booking.paid,
            amount_paid: booking.amount_paid,
            payment_method: booking.payment_method,
        }
    }
}

impl CheckInDraft {
    /// Start a draft, pre-filled from the attendee's current booking
    pub fn new(attendee: &Attendee, booking: Option<&Booking>) -> Self {
        Self {
            attendee_id: attendee.id,
            booking_id: booking.map(|b| b.id),
            arrival_date: booking.map(|b| b.arrival_date),
            exit_date: booking.map(|b| b.exit_date),
            transport: None,
            property_id: booking.map(|b| b.property_id),
            total_amount: booking.map(|b| b.total_amount),
            payment: None,
            existing: booking.map(ExistingBooking::from),
        }
    }

    pub fn nights(&self) -> Option<i64> {
        match (self.arrival_date, self.exit_date) {
            (Some(arrival), Some(exit)) => Some(nights_between(arrival, exit)),
            _ => None,
        }
    }

    /// Stay must fall inside the trip window
    pub fn apply_dates(&mut self, trip: &TripConfig, arrival: NaiveDate, exit: NaiveDate) -> Result<()> {
        if exit <= arrival {
            return Err(CbxError::InvalidInput("checkin.dates.order".to_string()));
        }
        if arrival < trip.start_date || exit > trip.end_date {
            return Err(CbxError::InvalidInput("checkin.dates.outside_trip".to_string()));
        }

        self.arrival_date = Some(arrival);
        self.exit_date = Some(exit);
        Ok(())
    }

    pub fn apply_transport(&mut self, choice: TransportChoice) -> Result<()> {
        match &choice {
            TransportChoice::Flying { flight } if flight.number.trim().is_empty() => {
                return Err(CbxError::InvalidInput("checkin.arrival.flight_invalid".to_string()));
            }
            TransportChoice::OwnVehicle { seats: Some(seats) } if *seats < 0 => {
                return Err(CbxError::InvalidInput("checkin.arrival.seats_invalid".to_string()));
            }
            _ => {}
        }

        self.transport = Some(choice);
        Ok(())
    }

    /// Pick a property and price the stay.
    ///
    /// `booked_by_others` counts bookings in the property held by other
    /// attendees. An amount already on the booking is kept when neither the
    /// property nor the dates changed.
    pub fn apply_property(&mut self, property: &Property, booked_by_others: i64) -> Result<()> {
        let (Some(arrival), Some(exit)) = (self.arrival_date, self.exit_date) else {
            return Err(CbxError::InvalidStateTransition {
                from: CheckInStep::Dates.id().to_string(),
                to: CheckInStep::Property.id().to_string(),
            });
        };

        let already_holds = self.existing.as_ref().map_or(false, |b| b.property_id == property.id);
        if !already_holds && booked_by_others >= i64::from(property.max_occupancy) {
            return Err(CbxError::InvalidInput("checkin.property.full".to_string()));
        }

        let kept_amount = self.existing.as_ref()
            .filter(|b| b.property_id == property.id && b.arrival_date == arrival && b.exit_date == exit)
            .filter(|b| b.total_amount > Decimal::ZERO)
            .map(|b| b.total_amount);

        self.property_id = Some(property.id);
        self.total_amount = Some(kept_amount.unwrap_or_else(|| property.share_for_nights(nights_between(arrival, exit))));
        // A new price invalidates an earlier payment answer
        self.payment = None;
        Ok(())
    }

    pub fn apply_payment(&mut self, choice: PaymentChoice) -> Result<()> {
        let total = self.total_amount.ok_or_else(|| CbxError::InvalidStateTransition {
            from: CheckInStep::Property.id().to_string(),
            to: CheckInStep::Payment.id().to_string(),
        })?;

        // A booking already paid in full stays paid
        let choice = match (self.settled_method(), choice) {
            (Some(method), PaymentChoice::Partial { .. } | PaymentChoice::Later) => PaymentChoice::Full { method },
            (_, choice) => choice,
        };

        if let PaymentChoice::Partial { amount, .. } = &choice {
            if *amount <= Decimal::ZERO || *amount >= total {
                return Err(CbxError::InvalidInput("checkin.payment.partial_range".to_string()));
            }
        }

        self.payment = Some(choice);
        Ok(())
    }

    /// Money already received on the booking and its method.
    ///
    /// A booking flagged paid without an amount counts as paid in full.
    pub fn prior_payment(&self) -> Option<(Decimal, Option<PaymentMethod>)> {
        self.existing.as_ref().and_then(|b| {
            let received = b.amount_paid.or_else(|| b.paid.then_some(b.total_amount))?;
            (received > Decimal::ZERO).then_some((received, b.payment_method))
        })
    }

    /// Method of an earlier payment that covers the current total
    pub fn settled_method(&self) -> Option<PaymentMethod> {
        let total = self.total_amount?;
        let (received, method) = self.prior_payment()?;
        if received >= total { method } else { None }
    }

    /// Turn a finished draft into what gets written.
    ///
    /// The result is always checked in, and is paid exactly when the full
    /// payment path was chosen.
    pub fn outcome(&self) -> Result<CheckInOutcome> {
        let missing = |field: &str| CbxError::InvalidInput(format!("Check-in is missing {}", field));

        let arrival_date = self.arrival_date.ok_or_else(|| missing("arrival date"))?;
        let exit_date = self.exit_date.ok_or_else(|| missing("exit date"))?;
        let transport = self.transport.as_ref().ok_or_else(|| missing("transport"))?;
        let property_id = self.property_id.ok_or_else(|| missing("property"))?;
        let total_amount = self.total_amount.ok_or_else(|| missing("amount"))?;
        let payment = self.payment.as_ref().ok_or_else(|| missing("payment"))?;

        let received = self.prior_payment().map(|(amount, _)| amount);
        let payment = match payment {
            PaymentChoice::Full { method } => PaymentUpdate {
                paid: true,
                amount_paid: Some(received.map_or(total_amount, |r| r.max(total_amount))),
                amount_due: Some(Decimal::ZERO),
                payment_method: Some(*method),
            },
            PaymentChoice::Partial { method, amount } => PaymentUpdate {
                paid: false,
                amount_paid: Some(*amount),
                amount_due: Some(total_amount - *amount),
                payment_method: Some(*method),
            },
            PaymentChoice::Later => match self.prior_payment() {
                Some((received, method)) => PaymentUpdate {
                    paid: false,
                    amount_paid: Some(received),
                    amount_due: Some((total_amount - received).max(Decimal::ZERO)),
                    payment_method: method,
                },
                None => PaymentUpdate {
                    paid: false,
                    amount_paid: None,
                    amount_due: Some(total_amount),
                    payment_method: None,
                },
            },
        };

        Ok(CheckInOutcome {
            attendee_id: self.attendee_id,
            booking_id: self.booking_id,
            property_id,
            arrival_date,
            exit_date,
            total_amount,
            payment,
            transport: transport.details(),
            checked_in: true,
        })
    }
}

/// Step bookkeeping for the wizard, free of any I/O
#[derive(Debug, Clone)]
pub struct CheckInWizard {
    scenarios: ScenarioManager,
    trip: TripConfig,
}

impl CheckInWizard {
    pub fn new(scenarios: ScenarioManager, trip: TripConfig) -> Self {
        Self { scenarios, trip }
    }

    pub fn scenarios(&self) -> &ScenarioManager {
        &self.scenarios
    }

    pub fn trip(&self) -> &TripConfig {
        &self.trip
    }

    /// Put the context at the first step with a fresh draft
    pub fn begin(&self, context: &mut ConversationContext, draft: &CheckInDraft) -> Result<()> {
        self.scenarios.start_scenario(context, CHECKIN_SCENARIO)?;
        context.set_data(DRAFT_KEY, draft)
    }

    pub fn current_step(&self, context: &ConversationContext) -> Option<CheckInStep> {
        if !context.is_in_scenario(CHECKIN_SCENARIO) {
            return None;
        }
        context.step.as_deref().and_then(|s| s.parse().ok())
    }

    pub fn draft(&self, context: &ConversationContext) -> Result<CheckInDraft> {
        if !context.is_in_scenario(CHECKIN_SCENARIO) {
            return Err(CbxError::InvalidStateTransition {
                from: "no_scenario".to_string(),
                to: CHECKIN_SCENARIO.to_string(),
            });
        }
        context.get_data::<CheckInDraft>(DRAFT_KEY)?
            .ok_or_else(|| CbxError::InvalidInput("Check-in draft missing".to_string()))
    }

    fn ensure_step(&self, context: &ConversationContext, expected: CheckInStep) -> Result<CheckInDraft> {
        match self.current_step(context) {
            Some(step) if step == expected => self.draft(context),
            other => Err(CbxError::InvalidStateTransition {
                from: other.map_or("none", |s| s.id()).to_string(),
                to: expected.id().to_string(),
            }),
        }
    }

    fn advance(&self, context: &mut ConversationContext, draft: &CheckInDraft, step: CheckInStep) -> Result<CheckInStep> {
        let next = step.next().ok_or_else(|| CbxError::InvalidStateTransition {
            from: step.id().to_string(),
            to: "next".to_string(),
        })?;
        context.set_data(DRAFT_KEY, draft)?;
        self.scenarios.next_step(context, next.id())?;
        log_checkin_step(context.telegram_id, step.id(), true);
        Ok(next)
    }

    /// Run `apply` against the draft at `step` and move forward on success
    fn submit<F>(&self, context: &mut ConversationContext, step: CheckInStep, apply: F) -> Result<CheckInDraft>
    where
        F: FnOnce(&mut CheckInDraft) -> Result<()>,
    {
        let mut draft = self.ensure_step(context, step)?;
        if let Err(e) = apply(&mut draft) {
            log_checkin_step(context.telegram_id, step.id(), false);
            return Err(e);
        }
        self.advance(context, &draft, step)?;
        Ok(draft)
    }

    pub fn submit_dates(&self, context: &mut ConversationContext, arrival: NaiveDate, exit: NaiveDate) -> Result<CheckInDraft> {
        self.submit(context, CheckInStep::Dates, |draft| draft.apply_dates(&self.trip, arrival, exit))
    }

    pub fn submit_arrival(&self, context: &mut ConversationContext, choice: TransportChoice) -> Result<CheckInDraft> {
        self.submit(context, CheckInStep::Arrival, |draft| draft.apply_transport(choice))
    }

    pub fn submit_property(&self, context: &mut ConversationContext, property: &Property, booked_by_others: i64) -> Result<CheckInDraft> {
        self.submit(context, CheckInStep::Property, |draft| draft.apply_property(property, booked_by_others))
    }

    pub fn submit_payment(&self, context: &mut ConversationContext, choice: PaymentChoice) -> Result<CheckInDraft> {
        self.submit(context, CheckInStep::Payment, |draft| draft.apply_payment(choice))
    }

    /// Return to the previous step, keeping the answers
    pub fn back(&self, context: &mut ConversationContext) -> Result<CheckInStep> {
        let step = self.current_step(context).ok_or_else(|| CbxError::InvalidStateTransition {
            from: "none".to_string(),
            to: "back".to_string(),
        })?;
        let previous = step.previous().ok_or_else(|| CbxError::InvalidStateTransition {
            from: step.id().to_string(),
            to: "back".to_string(),
        })?;

        self.scenarios.next_step(context, previous.id())?;
        Ok(previous)
    }

    /// The outcome of a wizard that reached the last step
    pub fn outcome(&self, context: &ConversationContext) -> Result<CheckInOutcome> {
        self.ensure_step(context, CheckInStep::Complete)?.outcome()
    }
}

/// A property offered at the property step
#[derive(Debug, Clone)]
pub struct PropertyOption {
    pub property: Property,
    pub beds_left: i64,
    pub quote: Decimal,
    pub current: bool,
}

/// Properties with a free bed, plus the one the attendee already holds.
///
/// The attendee's own booking is counted in `occupancy` and is free for them.
pub fn offered_properties(
    properties: Vec<Property>,
    occupancy: &[PropertyOccupancy],
    draft: &CheckInDraft,
) -> Vec<PropertyOption> {
    let nights = draft.nights().unwrap_or(0);
    let current = draft.existing.as_ref().map(|b| b.property_id);

    properties
        .into_iter()
        .map(|property| {
            let booked = occupancy.iter()
                .find(|o| o.property_id == property.id)
                .map_or(0, |o| o.booked);
            let is_current = current == Some(property.id);
            let taken = if is_current { (booked - 1).max(0) } else { booked };
            PropertyOption {
                beds_left: (i64::from(property.max_occupancy) - taken).max(0),
                quote: property.share_for_nights(nights),
                current: is_current,
                property,
            }
        })
        .filter(|option| option.current || option.beds_left > 0)
        .collect()
}

/// Check-in driver backed by the database and Redis
#[derive(Debug, Clone)]
pub struct CheckInService {
    wizard: CheckInWizard,
    database: Arc<DatabaseService>,
    state_storage: Arc<StateStorage>,
}

impl CheckInService {
    pub fn new(wizard: CheckInWizard, database: Arc<DatabaseService>, state_storage: Arc<StateStorage>) -> Self {
        Self { wizard, database, state_storage }
    }

    pub fn wizard(&self) -> &CheckInWizard {
        &self.wizard
    }

    /// Begin the wizard for a logged-in attendee
    pub async fn start(&self, attendee: &Attendee) -> Result<(ConversationContext, CheckInDraft)> {
        let telegram_id = attendee.telegram_id.ok_or_else(|| {
            CbxError::Authentication("Attendee has no linked Telegram account".to_string())
        })?;
        let booking = self.database.bookings.find_for_attendee(attendee.id).await?;

        let draft = CheckInDraft::new(attendee, booking.as_ref());
        let mut context = self.state_storage.load_or_new(telegram_id).await?;
        self.wizard.begin(&mut context, &draft)?;
        self.state_storage.save_context(&context).await?;

        self.database.record_activity(
            CreateActivityRequest::new(ActivityAction::CheckinStarted)
                .attendee(attendee.id)
                .telegram(telegram_id)
                .details(serde_json::json!({ "booking_id": draft.booking_id })),
        ).await;

        Ok((context, draft))
    }

    pub async fn submit_dates(&self, context: &mut ConversationContext, arrival: NaiveDate, exit: NaiveDate) -> Result<CheckInDraft> {
        let draft = self.wizard.submit_dates(context, arrival, exit)?;
        self.state_storage.save_context(context).await?;
        Ok(draft)
    }

    pub async fn submit_arrival(&self, context: &mut ConversationContext, choice: TransportChoice) -> Result<CheckInDraft> {
        let draft = self.wizard.submit_arrival(context, choice)?;
        self.state_storage.save_context(context).await?;
        Ok(draft)
    }

    pub async fn submit_property(&self, context: &mut ConversationContext, property_id: i64) -> Result<CheckInDraft> {
        let draft = self.wizard.draft(context)?;
        let property = self.database.properties.find_by_id(property_id).await?
            .ok_or(CbxError::PropertyNotFound { property_id })?;
        let booked_by_others = self.booked_by_others(property_id, draft.attendee_id).await?;

        let draft = self.wizard.submit_property(context, &property, booked_by_others)?;
        self.state_storage.save_context(context).await?;
        Ok(draft)
    }

    pub async fn submit_payment(&self, context: &mut ConversationContext, choice: PaymentChoice) -> Result<CheckInDraft> {
        let draft = self.wizard.submit_payment(context, choice)?;
        self.state_storage.save_context(context).await?;
        Ok(draft)
    }

    pub async fn back(&self, context: &mut ConversationContext) -> Result<CheckInStep> {
        let step = self.wizard.back(context)?;
        self.state_storage.save_context(context).await?;
        Ok(step)
    }

    /// Write the finished check-in and close the wizard
    pub async fn finish(&self, context: &mut ConversationContext) -> Result<(Attendee, Booking)> {
        let outcome = self.wizard.outcome(context)?;
        let (attendee, booking) = self.database.complete_checkin(&outcome).await?;

        context.complete_scenario();
        self.state_storage.delete_context(context.telegram_id).await?;

        info!(attendee_id = attendee.id, booking_id = booking.id, paid = booking.paid, "Check-in finished");
        Ok((attendee, booking))
    }

    /// Abandon the wizard without writing anything
    pub async fn cancel(&self, context: &mut ConversationContext) -> Result<()> {
        context.cancel_scenario();
        self.state_storage.delete_context(context.telegram_id).await
    }

    /// Properties the attendee can pick, with free beds and a price quote
    pub async fn property_options(&self, draft: &CheckInDraft) -> Result<Vec<PropertyOption>> {
        let (properties, occupancy) = futures::try_join!(
            self.database.properties.list(),
            self.database.properties.occupancy(),
        )?;
        Ok(offered_properties(properties, &occupancy, draft))
    }

    async fn booked_by_others(&self, property_id: i64, attendee_id: i64) -> Result<i64> {
        let bookings = self.database.bookings.list_for_property(property_id).await?;
        Ok(bookings.iter().filter(|b| b.attendee_id != attendee_id).count() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::str::FromStr;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn trip() -> TripConfig {
        TripConfig {
            name: "CBX".to_string(),
            start_date: date("2026-03-12"),
            end_date: date("2026-03-17"),
            currency: "USD".to_string(),
        }
    }

    fn attendee() -> Attendee {
        Attendee {
            id: 11,
            name: "Sam Lee".to_string(),
            phone: "+15550001111".to_string(),
            email: None,
            telegram_id: Some(900),
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

    fn property(id: i64, price: &str, occupancy: i32) -> Property {
        Property {
            id,
            name: format!("House {}", id),
            address: "Main St".to_string(),
            latitude: None,
            longitude: None,
            max_occupancy: occupancy,
            nightly_price: dec(price),
            listing_url: None,
            bedrooms: 2,
            bathrooms: dec("1.5"),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn booking(property_id: i64, total: &str) -> Booking {
        Booking {
            id: 70,
            attendee_id: 11,
            property_id,
            arrival_date: date("2026-03-12"),
            exit_date: date("2026-03-16"),
            total_amount: dec(total),
            paid: false,
            amount_paid: None,
            amount_due: Some(dec(total)),
            payment_method: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn wizard_at_dates(existing: Option<&Booking>) -> (CheckInWizard, ConversationContext) {
        let wizard = CheckInWizard::new(ScenarioManager::new(), trip());
        let mut context = ConversationContext::new(900);
        wizard.begin(&mut context, &CheckInDraft::new(&attendee(), existing)).unwrap();
        (wizard, context)
    }

    #[test]
    fn test_full_flow_marks_paid() {
        let (wizard, mut ctx) = wizard_at_dates(None);
        wizard.submit_dates(&mut ctx, date("2026-03-12"), date("2026-03-16")).unwrap();
        wizard.submit_arrival(&mut ctx, TransportChoice::OwnVehicle { seats: Some(3) }).unwrap();
        let draft = wizard.submit_property(&mut ctx, &property(1, "600", 6), 2).unwrap();
        assert_eq!(draft.total_amount, Some(dec("400.00")));
        wizard.submit_payment(&mut ctx, PaymentChoice::Full { method: PaymentMethod::Zelle }).unwrap();

        assert_eq!(wizard.current_step(&ctx), Some(CheckInStep::Complete));
        let outcome = wizard.outcome(&ctx).unwrap();
        assert!(outcome.checked_in);
        assert!(outcome.payment.paid);
        assert_eq!(outcome.payment.amount_due, Some(Decimal::ZERO));
        assert_eq!(outcome.payment.payment_method, Some(PaymentMethod::Zelle));
        assert!(outcome.transport.has_vehicle);
        assert_eq!(outcome.transport.vehicle_seats, Some(3));
    }

    #[test]
    fn test_partial_payment_leaves_balance() {
        let (wizard, mut ctx) = wizard_at_dates(None);
        wizard.submit_dates(&mut ctx, date("2026-03-13"), date("2026-03-15")).unwrap();
        wizard.submit_arrival(&mut ctx, TransportChoice::Carpool).unwrap();
        wizard.submit_property(&mut ctx, &property(1, "300", 4), 0).unwrap();

        let total = wizard.draft(&ctx).unwrap().total_amount.unwrap();
        assert_eq!(total, dec("150.00"));
        assert_matches!(
            wizard.submit_payment(&mut ctx, PaymentChoice::Partial { method: PaymentMethod::Venmo, amount: total }),
            Err(CbxError::InvalidInput(key)) if key == "checkin.payment.partial_range"
        );
        assert_eq!(wizard.current_step(&ctx), Some(CheckInStep::Payment));

        wizard.submit_payment(&mut ctx, PaymentChoice::Partial { method: PaymentMethod::Venmo, amount: dec("50") }).unwrap();
        let outcome = wizard.outcome(&ctx).unwrap();
        assert!(!outcome.payment.paid);
        assert_eq!(outcome.payment.amount_paid, Some(dec("50")));
        assert_eq!(outcome.payment.amount_due, Some(dec("100.00")));
        assert!(outcome.transport.wants_carpool);
    }

    #[test]
    fn test_dates_outside_trip_rejected() {
        let (wizard, mut ctx) = wizard_at_dates(None);
        assert_matches!(
            wizard.submit_dates(&mut ctx, date("2026-03-10"), date("2026-03-14")),
            Err(CbxError::InvalidInput(key)) if key == "checkin.dates.outside_trip"
        );
        assert_matches!(
            wizard.submit_dates(&mut ctx, date("2026-03-14"), date("2026-03-14")),
            Err(CbxError::InvalidInput(key)) if key == "checkin.dates.order"
        );
        assert_eq!(wizard.current_step(&ctx), Some(CheckInStep::Dates));
    }

    #[test]
    fn test_full_property_rejected_unless_already_held() {
        let (wizard, mut ctx) = wizard_at_dates(None);
        wizard.submit_dates(&mut ctx, date("2026-03-12"), date("2026-03-16")).unwrap();
        wizard.submit_arrival(&mut ctx, TransportChoice::Carpool).unwrap();
        assert_matches!(
            wizard.submit_property(&mut ctx, &property(1, "600", 6), 6),
            Err(CbxError::InvalidInput(key)) if key == "checkin.property.full"
        );

        let existing = booking(1, "275.00");
        let (wizard, mut ctx) = wizard_at_dates(Some(&existing));
        wizard.submit_dates(&mut ctx, date("2026-03-12"), date("2026-03-16")).unwrap();
        wizard.submit_arrival(&mut ctx, TransportChoice::Carpool).unwrap();
        let draft = wizard.submit_property(&mut ctx, &property(1, "600", 6), 6).unwrap();
        // Unchanged stay keeps the amount set on the booking
        assert_eq!(draft.total_amount, Some(dec("275.00")));
    }

    #[test]
    fn test_changed_dates_reprice() {
        let existing = booking(1, "275.00");
        let (wizard, mut ctx) = wizard_at_dates(Some(&existing));
        wizard.submit_dates(&mut ctx, date("2026-03-12"), date("2026-03-14")).unwrap();
        wizard.submit_arrival(&mut ctx, TransportChoice::Carpool).unwrap();
        let draft = wizard.submit_property(&mut ctx, &property(1, "600", 6), 3).unwrap();
        assert_eq!(draft.total_amount, Some(dec("200.00")));
    }

    #[test]
    fn test_back_keeps_answers() {
        let (wizard, mut ctx) = wizard_at_dates(None);
        assert!(wizard.back(&mut ctx).is_err());

        wizard.submit_dates(&mut ctx, date("2026-03-12"), date("2026-03-16")).unwrap();
        assert_eq!(wizard.back(&mut ctx).unwrap(), CheckInStep::Dates);
        let draft = wizard.draft(&ctx).unwrap();
        assert_eq!(draft.arrival_date, Some(date("2026-03-12")));

        assert!(wizard.submit_arrival(&mut ctx, TransportChoice::Carpool).is_err());
    }

    #[test]
    fn test_outcome_requires_last_step() {
        let (wizard, mut ctx) = wizard_at_dates(None);
        wizard.submit_dates(&mut ctx, date("2026-03-12"), date("2026-03-16")).unwrap();
        assert_matches!(wizard.outcome(&ctx), Err(CbxError::InvalidStateTransition { .. }));
    }

    #[test]
    fn test_pay_later_keeps_prior_partial() {
        let mut existing = booking(1, "400.00");
        existing.amount_paid = Some(dec("100"));
        existing.payment_method = Some(PaymentMethod::Cash);
        let (wizard, mut ctx) = wizard_at_dates(Some(&existing));
        wizard.submit_dates(&mut ctx, date("2026-03-12"), date("2026-03-16")).unwrap();
        wizard.submit_arrival(&mut ctx, TransportChoice::NeedsPickup { flight: None }).unwrap();
        wizard.submit_property(&mut ctx, &property(1, "600", 6), 1).unwrap();
        wizard.submit_payment(&mut ctx, PaymentChoice::Later).unwrap();

        let outcome = wizard.outcome(&ctx).unwrap();
        assert!(!outcome.payment.paid);
        assert_eq!(outcome.payment.amount_paid, Some(dec("100")));
        assert_eq!(outcome.payment.amount_due, Some(dec("300.00")));
        assert_eq!(outcome.payment.payment_method, Some(PaymentMethod::Cash));
        assert!(outcome.transport.needs_pickup);
    }

    fn confirmed_booking() -> Booking {
        let mut existing = booking(1, "400.00");
        existing.paid = true;
        existing.amount_paid = Some(dec("400.00"));
        existing.amount_due = Some(Decimal::ZERO);
        existing.payment_method = Some(PaymentMethod::Zelle);
        existing
    }

    fn wizard_at_payment(existing: &Booking, exit: &str) -> (CheckInWizard, ConversationContext) {
        let (wizard, mut ctx) = wizard_at_dates(Some(existing));
        wizard.submit_dates(&mut ctx, date("2026-03-12"), date(exit)).unwrap();
        wizard.submit_arrival(&mut ctx, TransportChoice::Carpool).unwrap();
        wizard.submit_property(&mut ctx, &property(1, "600", 6), 2).unwrap();
        (wizard, ctx)
    }

    #[test]
    fn test_pay_later_after_confirmed_payment_stays_paid() {
        let (wizard, mut ctx) = wizard_at_payment(&confirmed_booking(), "2026-03-16");
        assert_eq!(wizard.draft(&ctx).unwrap().settled_method(), Some(PaymentMethod::Zelle));

        let draft = wizard.submit_payment(&mut ctx, PaymentChoice::Later).unwrap();
        assert_eq!(draft.payment, Some(PaymentChoice::Full { method: PaymentMethod::Zelle }));

        let outcome = wizard.outcome(&ctx).unwrap();
        assert!(outcome.payment.paid);
        assert_eq!(outcome.payment.amount_paid, Some(dec("400.00")));
        assert_eq!(outcome.payment.amount_due, Some(Decimal::ZERO));
        assert_eq!(outcome.payment.payment_method, Some(PaymentMethod::Zelle));
    }

    #[test]
    fn test_partial_after_confirmed_payment_stays_paid() {
        let (wizard, mut ctx) = wizard_at_payment(&confirmed_booking(), "2026-03-16");
        wizard.submit_payment(&mut ctx, PaymentChoice::Partial { method: PaymentMethod::Cash, amount: dec("50") }).unwrap();

        let outcome = wizard.outcome(&ctx).unwrap();
        assert!(outcome.payment.paid);
        assert_eq!(outcome.payment.amount_paid, Some(dec("400.00")));
        assert_eq!(outcome.payment.payment_method, Some(PaymentMethod::Zelle));
    }

    #[test]
    fn test_paid_flag_without_amount_counts_as_received() {
        let mut existing = booking(1, "400.00");
        existing.paid = true;
        let draft = CheckInDraft::new(&attendee(), Some(&existing));
        assert_eq!(draft.prior_payment(), Some((dec("400.00"), None)));

        // No method to carry over
        let (wizard, mut ctx) = wizard_at_payment(&existing, "2026-03-16");
        assert_eq!(wizard.draft(&ctx).unwrap().settled_method(), None);
        wizard.submit_payment(&mut ctx, PaymentChoice::Later).unwrap();
        let outcome = wizard.outcome(&ctx).unwrap();
        assert_eq!(outcome.payment.amount_paid, Some(dec("400.00")));
        assert_eq!(outcome.payment.amount_due, Some(Decimal::ZERO));
    }

    #[test]
    fn test_longer_stay_after_payment_owes_the_difference() {
        let mut existing = confirmed_booking();
        existing.exit_date = date("2026-03-14");
        existing.total_amount = dec("200.00");
        existing.amount_paid = Some(dec("200.00"));
        let (wizard, mut ctx) = wizard_at_payment(&existing, "2026-03-16");

        let draft = wizard.draft(&ctx).unwrap();
        assert_eq!(draft.total_amount, Some(dec("400.00")));
        assert_eq!(draft.settled_method(), None);

        wizard.submit_payment(&mut ctx, PaymentChoice::Later).unwrap();
        let outcome = wizard.outcome(&ctx).unwrap();
        assert!(!outcome.payment.paid);
        assert_eq!(outcome.payment.amount_paid, Some(dec("200.00")));
        assert_eq!(outcome.payment.amount_due, Some(dec("200.00")));
        assert_eq!(outcome.payment.payment_method, Some(PaymentMethod::Zelle));
    }

    #[test]
    fn test_shorter_stay_after_payment_keeps_amount_received() {
        let (wizard, mut ctx) = wizard_at_payment(&confirmed_booking(), "2026-03-14");
        assert_eq!(wizard.draft(&ctx).unwrap().total_amount, Some(dec("200.00")));

        wizard.submit_payment(&mut ctx, PaymentChoice::Later).unwrap();
        let outcome = wizard.outcome(&ctx).unwrap();
        assert!(outcome.payment.paid);
        assert_eq!(outcome.payment.amount_paid, Some(dec("400.00")));
        assert_eq!(outcome.payment.amount_due, Some(Decimal::ZERO));
    }

    fn occupied(property_id: i64, booked: i64) -> PropertyOccupancy {
        PropertyOccupancy { property_id, booked }
    }

    #[test]
    fn test_offered_properties_hide_full_houses() {
        let mut draft = CheckInDraft::new(&attendee(), None);
        draft.arrival_date = Some(date("2026-03-12"));
        draft.exit_date = Some(date("2026-03-14"));
        let properties = vec![property(1, "600", 2), property(2, "300", 3), property(3, "900", 4)];
        let occupancy = vec![occupied(1, 2), occupied(2, 1)];

        let options = offered_properties(properties, &occupancy, &draft);
        let offered: Vec<(i64, i64)> = options.iter().map(|o| (o.property.id, o.beds_left)).collect();
        assert_eq!(offered, vec![(2, 2), (3, 4)]);
        assert_eq!(options[0].quote, dec("200.00"));
        assert!(options.iter().all(|o| !o.current));
    }

    #[test]
    fn test_offered_properties_count_own_bed_as_free() {
        let existing = booking(1, "275.00");
        let draft = CheckInDraft::new(&attendee(), Some(&existing));
        let options = offered_properties(vec![property(1, "600", 2)], &[occupied(1, 2)], &draft);
        assert_eq!(options.len(), 1);
        assert!(options[0].current);
        assert_eq!(options[0].beds_left, 1);

        // Booking moved away since the wizard started
        let options = offered_properties(vec![property(1, "600", 2)], &[], &draft);
        assert_eq!(options[0].beds_left, 2);
    }

    #[test]
    fn test_offered_properties_empty() {
        let draft = CheckInDraft::new(&attendee(), None);
        assert!(offered_properties(Vec::new(), &[], &draft).is_empty());

        let options = offered_properties(vec![property(1, "600", 0)], &[], &draft);
        assert!(options.is_empty());
    }

    #[test]
    fn test_back_from_summary_changes_payment() {
        let (wizard, mut ctx) = wizard_at_dates(None);
        wizard.submit_dates(&mut ctx, date("2026-03-12"), date("2026-03-16")).unwrap();
        wizard.submit_arrival(&mut ctx, TransportChoice::Carpool).unwrap();
        wizard.submit_property(&mut ctx, &property(1, "600", 6), 0).unwrap();
        wizard.submit_payment(&mut ctx, PaymentChoice::Later).unwrap();
        assert_eq!(wizard.current_step(&ctx), Some(CheckInStep::Complete));

        assert_eq!(wizard.back(&mut ctx).unwrap(), CheckInStep::Payment);
        wizard.submit_payment(&mut ctx, PaymentChoice::Full { method: PaymentMethod::Cash }).unwrap();
        let outcome = wizard.outcome(&ctx).unwrap();
        assert!(outcome.payment.paid);
        assert_eq!(outcome.payment.payment_method, Some(PaymentMethod::Cash));
    }

    #[test]
    fn test_flight_parse() {
        let flight = FlightDetails::parse("ua 455 2026-03-12 09:30");
        assert!(flight.is_err());

        let flight = FlightDetails::parse("ua455 2026-03-12 09:30").unwrap();
        assert_eq!(flight.number, "UA455");
        assert_eq!(flight.arrival.format("%Y-%m-%d %H:%M").to_string(), "2026-03-12 09:30");

        let details = TransportChoice::Flying { flight }.details();
        assert_eq!(details.flight_number.as_deref(), Some("UA455"));
        assert!(!details.needs_pickup);
    }
}
