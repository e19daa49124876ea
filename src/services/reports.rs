//! Operational reports
//!
//! Builders here are pure functions over rows already loaded from the
//! database. [`ReportService`] loads the rows and renders translated plain
//! text.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::str::FromStr;
use std::sync::Arc;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use crate::database::DatabaseService;
use crate::i18n::I18n;
use crate::models::{ActivityAction, ActivityLog, Attendee, Booking, PaymentStatus, Property};
use crate::utils::errors::{CbxError, Result};
use crate::utils::helpers::{format_money, format_timestamp};

/// Log rows read for the activity report
const ACTIVITY_WINDOW: i64 = 500;
const RECENT_ENTRIES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Occupancy,
    Vehicles,
    Rideshare,
    Payments,
    Activity,
}

impl ReportKind {
    pub const ALL: [ReportKind; 5] = [
        ReportKind::Occupancy,
        ReportKind::Vehicles,
        ReportKind::Rideshare,
        ReportKind::Payments,
        ReportKind::Activity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Occupancy => "occupancy",
            ReportKind::Vehicles => "vehicles",
            ReportKind::Rideshare => "rideshare",
            ReportKind::Payments => "payments",
            ReportKind::Activity => "activity",
        }
    }
}

impl FromStr for ReportKind {
    type Err = CbxError;

    fn from_str(s: &str) -> Result<Self> {
        ReportKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| CbxError::InvalidInput("report.unknown".to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OccupancyRow {
    pub property_id: i64,
    pub name: String,
    pub capacity: i32,
    pub booked: usize,
    pub free: i64,
    pub total: Decimal,
    pub received: Decimal,
    pub outstanding: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OccupancyReport {
    pub rows: Vec<OccupancyRow>,
    pub beds: i64,
    pub booked: usize,
    pub total: Decimal,
    pub received: Decimal,
    pub outstanding: Decimal,
}

pub fn occupancy_report(properties: &[Property], bookings: &[Booking]) -> OccupancyReport {
    let rows: Vec<OccupancyRow> = properties
        .iter()
        .map(|property| {
            let held: Vec<&Booking> = bookings.iter().filter(|b| b.property_id == property.id).collect();
            OccupancyRow {
                property_id: property.id,
                name: property.name.clone(),
                capacity: property.max_occupancy,
                booked: held.len(),
                free: (i64::from(property.max_occupancy) - held.len() as i64).max(0),
                total: held.iter().map(|b| b.total_amount).sum(),
                received: held.iter().map(|b| b.received()).sum(),
                outstanding: held.iter().map(|b| b.outstanding()).sum(),
            }
        })
        .collect();

    OccupancyReport {
        beds: properties.iter().map(|p| i64::from(p.max_occupancy)).sum(),
        booked: rows.iter().map(|r| r.booked).sum(),
        total: rows.iter().map(|r| r.total).sum(),
        received: rows.iter().map(|r| r.received).sum(),
        outstanding: rows.iter().map(|r| r.outstanding).sum(),
        rows,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriverRow {
    pub name: String,
    pub phone: String,
    pub seats: Option<i32>,
    pub arrival_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleReport {
    pub drivers: Vec<DriverRow>,
    pub total_seats: i64,
}

pub fn vehicle_report(attendees: &[Attendee], bookings: &[Booking]) -> VehicleReport {
    let arrivals = arrival_by_attendee(bookings);
    let mut drivers: Vec<DriverRow> = attendees
        .iter()
        .filter(|a| a.has_vehicle)
        .map(|a| DriverRow {
            name: a.name.clone(),
            phone: a.phone.clone(),
            seats: a.vehicle_seats,
            arrival_date: arrivals.get(&a.id).copied(),
        })
        .collect();
    drivers.sort_by(|a, b| a.arrival_date.cmp(&b.arrival_date).then_with(|| a.name.cmp(&b.name)));

    VehicleReport {
        total_seats: drivers.iter().filter_map(|d| d.seats).map(i64::from).sum(),
        drivers,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PickupRow {
    pub name: String,
    pub phone: String,
    pub flight_number: Option<String>,
    pub flight_arrival: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RideshareReport {
    /// Pickup requests keyed by arrival date; `None` when no date is known
    pub pickups: BTreeMap<Option<NaiveDate>, Vec<PickupRow>>,
    pub carpool_riders: Vec<String>,
    pub drivers_available: usize,
    pub seats_available: i64,
}

pub fn rideshare_report(attendees: &[Attendee], bookings: &[Booking]) -> RideshareReport {
    let arrivals = arrival_by_attendee(bookings);
    let mut pickups: BTreeMap<Option<NaiveDate>, Vec<PickupRow>> = BTreeMap::new();

    for attendee in attendees.iter().filter(|a| a.needs_pickup) {
        let date = attendee.flight_arrival
            .map(|t| t.date_naive())
            .or_else(|| arrivals.get(&attendee.id).copied());
        pickups.entry(date).or_default().push(PickupRow {
            name: attendee.name.clone(),
            phone: attendee.phone.clone(),
            flight_number: attendee.flight_number.clone(),
            flight_arrival: attendee.flight_arrival,
        });
    }
    for rows in pickups.values_mut() {
        rows.sort_by(|a, b| a.flight_arrival.cmp(&b.flight_arrival).then_with(|| a.name.cmp(&b.name)));
    }

    let mut carpool_riders: Vec<String> = attendees
        .iter()
        .filter(|a| a.wants_carpool)
        .map(|a| a.name.clone())
        .collect();
    carpool_riders.sort();

    let drivers: Vec<&Attendee> = attendees.iter().filter(|a| a.has_vehicle).collect();

    RideshareReport {
        pickups,
        carpool_riders,
        drivers_available: drivers.len(),
        seats_available: drivers.iter().filter_map(|d| d.vehicle_seats).map(i64::from).sum(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentRow {
    pub name: String,
    pub total: Decimal,
    pub received: Decimal,
    pub due: Decimal,
    pub paid: bool,
    pub method: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentReport {
    pub rows: Vec<PaymentRow>,
    pub by_method: BTreeMap<String, Decimal>,
    pub paid_count: usize,
    pub partial_count: usize,
    pub unpaid_count: usize,
    pub total: Decimal,
    pub received: Decimal,
    pub outstanding: Decimal,
}

pub fn payment_report(attendees: &[Attendee], bookings: &[Booking]) -> PaymentReport {
    let names: HashMap<i64, &str> = attendees.iter().map(|a| (a.id, a.name.as_str())).collect();

    let mut rows = Vec::with_capacity(bookings.len());
    let mut by_method: BTreeMap<String, Decimal> = BTreeMap::new();
    let (mut paid_count, mut partial_count, mut unpaid_count) = (0, 0, 0);

    for booking in bookings {
        match booking.status() {
            PaymentStatus::Paid => paid_count += 1,
            PaymentStatus::Partial => partial_count += 1,
            PaymentStatus::Unpaid => unpaid_count += 1,
        }

        let received = booking.received();
        if received > Decimal::ZERO {
            let method = booking.payment_method.map_or("unknown", |m| m.as_str());
            *by_method.entry(method.to_string()).or_insert(Decimal::ZERO) += received;
        }

        rows.push(PaymentRow {
            name: names.get(&booking.attendee_id).map_or_else(
                || format!("attendee #{}", booking.attendee_id),
                |n| n.to_string(),
            ),
            total: booking.total_amount,
            received,
            due: booking.outstanding(),
            paid: booking.paid,
            method: booking.payment_method.map(|m| m.label().to_string()),
        });
    }
    // Largest balances first
    rows.sort_by(|a, b| b.due.cmp(&a.due).then_with(|| a.name.cmp(&b.name)));

    PaymentReport {
        total: rows.iter().map(|r| r.total).sum(),
        received: rows.iter().map(|r| r.received).sum(),
        outstanding: rows.iter().map(|r| r.due).sum(),
        rows,
        by_method,
        paid_count,
        partial_count,
        unpaid_count,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityEntry {
    pub who: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityReport {
    pub counts: BTreeMap<String, i64>,
    pub recent_logins: Vec<ActivityEntry>,
    pub recent_checkins: Vec<ActivityEntry>,
    pub checked_in: usize,
    pub attendees: usize,
}

impl ActivityReport {
    pub fn checked_in_ratio(&self) -> f64 {
        if self.attendees == 0 {
            return 0.0;
        }
        self.checked_in as f64 / self.attendees as f64
    }
}

pub fn activity_report(logs: &[ActivityLog], attendees: &[Attendee]) -> ActivityReport {
    let names: HashMap<i64, &str> = attendees.iter().map(|a| (a.id, a.name.as_str())).collect();
    let who = |log: &ActivityLog| match (log.attendee_id, log.telegram_id) {
        (Some(id), _) => names.get(&id).map_or_else(|| format!("attendee #{}", id), |n| n.to_string()),
        (None, Some(telegram_id)) => format!("tg:{}", telegram_id),
        (None, None) => "unknown".to_string(),
    };

    let mut counts: BTreeMap<String, i64> = BTreeMap::new();
    for log in logs {
        *counts.entry(log.action.clone()).or_insert(0) += 1;
    }

    let mut sorted: Vec<&ActivityLog> = logs.iter().collect();
    sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let recent = |action: ActivityAction| -> Vec<ActivityEntry> {
        sorted
            .iter()
            .filter(|log| log.parsed_action() == Some(action))
            .take(RECENT_ENTRIES)
            .map(|log| ActivityEntry { who: who(log), at: log.created_at })
            .collect()
    };

    ActivityReport {
        recent_logins: recent(ActivityAction::Login),
        recent_checkins: recent(ActivityAction::CheckinCompleted),
        counts,
        checked_in: attendees.iter().filter(|a| a.checked_in).count(),
        attendees: attendees.len(),
    }
}

fn arrival_by_attendee(bookings: &[Booking]) -> HashMap<i64, NaiveDate> {
    bookings.iter().map(|b| (b.attendee_id, b.arrival_date)).collect()
}

/// Translated labels and money formatting for one rendering
pub struct ReportText<'a> {
    i18n: &'a I18n,
    lang: &'a str,
    currency: &'a str,
}

impl<'a> ReportText<'a> {
    pub fn new(i18n: &'a I18n, lang: &'a str, currency: &'a str) -> Self {
        Self { i18n, lang, currency }
    }

    fn t(&self, key: &str, pairs: &[(&str, String)]) -> String {
        self.i18n.t_with(&format!("report.{}", key), self.lang, pairs)
    }

    fn money(&self, amount: Decimal) -> String {
        format_money(amount, self.currency)
    }
}

impl OccupancyReport {
    pub fn render(&self, text: &ReportText) -> String {
        let mut out = text.t("occupancy.title", &[]);
        out.push_str("\n\n");
        for row in &self.rows {
            out.push_str(&text.t("occupancy.row", &[
                ("name", row.name.clone()),
                ("booked", row.booked.to_string()),
                ("capacity", row.capacity.to_string()),
                ("free", row.free.to_string()),
                ("total", text.money(row.total)),
                ("received", text.money(row.received)),
                ("due", text.money(row.outstanding)),
            ]));
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&text.t("occupancy.total", &[
            ("booked", self.booked.to_string()),
            ("beds", self.beds.to_string()),
            ("total", text.money(self.total)),
            ("received", text.money(self.received)),
            ("due", text.money(self.outstanding)),
        ]));
        out
    }
}

impl VehicleReport {
    pub fn render(&self, text: &ReportText) -> String {
        let mut out = text.t("vehicles.title", &[]);
        out.push_str("\n\n");
        if self.drivers.is_empty() {
            out.push_str(&text.t("vehicles.none", &[]));
            return out;
        }
        for driver in &self.drivers {
            out.push_str(&text.t("vehicles.row", &[
                ("name", driver.name.clone()),
                ("phone", driver.phone.clone()),
                ("seats", driver.seats.map_or_else(|| "?".to_string(), |s| s.to_string())),
                ("arrival", driver.arrival_date.map_or_else(|| text.t("vehicles.no_dates", &[]), |d| d.to_string())),
            ]));
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&text.t("vehicles.summary", &[
            ("drivers", self.drivers.len().to_string()),
            ("seats", self.total_seats.to_string()),
        ]));
        out
    }
}

impl RideshareReport {
    pub fn render(&self, text: &ReportText) -> String {
        let mut out = text.t("rideshare.title", &[]);
        out.push_str("\n\n");
        if self.pickups.is_empty() {
            out.push_str(&text.t("rideshare.none", &[]));
            out.push('\n');
        }
        for (date, rows) in &self.pickups {
            let heading = date.map_or_else(|| text.t("rideshare.unknown_date", &[]), |d| d.to_string());
            let _ = writeln!(out, "{}:", heading);
            for row in rows {
                let flight = match (&row.flight_number, row.flight_arrival) {
                    (Some(number), Some(at)) => text.t("rideshare.flight_at", &[
                        ("flight", number.clone()),
                        ("time", at.format("%H:%M").to_string()),
                    ]),
                    (Some(number), None) => number.clone(),
                    _ => text.t("rideshare.no_flight", &[]),
                };
                out.push_str(&text.t("rideshare.row", &[
                    ("name", row.name.clone()),
                    ("phone", row.phone.clone()),
                    ("flight", flight),
                ]));
                out.push('\n');
            }
        }
        let riders = if self.carpool_riders.is_empty() {
            text.t("rideshare.nobody", &[])
        } else {
            self.carpool_riders.join(", ")
        };
        out.push('\n');
        out.push_str(&text.t("rideshare.carpool", &[("riders", riders)]));
        out.push('\n');
        out.push_str(&text.t("rideshare.drivers", &[
            ("drivers", self.drivers_available.to_string()),
            ("seats", self.seats_available.to_string()),
        ]));
        out
    }
}

impl PaymentReport {
    pub fn render(&self, text: &ReportText) -> String {
        let mut out = text.t("payments.title", &[]);
        out.push_str("\n\n");
        for row in &self.rows {
            let state = if row.paid { "paid" } else if row.received > Decimal::ZERO { "partial" } else { "unpaid" };
            let via = row.method.as_ref()
                .map(|m| text.t("payments.via", &[("method", m.clone())]))
                .unwrap_or_default();
            out.push_str(&text.t("payments.row", &[
                ("name", row.name.clone()),
                ("received", text.money(row.received)),
                ("total", text.money(row.total)),
                ("state", text.t(&format!("payments.states.{}", state), &[])),
                ("due", text.money(row.due)),
                ("via", via),
            ]));
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&text.t("payments.counts", &[
            ("paid", self.paid_count.to_string()),
            ("partial", self.partial_count.to_string()),
            ("unpaid", self.unpaid_count.to_string()),
        ]));
        out.push('\n');
        for (method, amount) in &self.by_method {
            let _ = writeln!(out, "{}: {}", method, text.money(*amount));
        }
        out.push_str(&text.t("payments.totals", &[
            ("total", text.money(self.total)),
            ("received", text.money(self.received)),
            ("due", text.money(self.outstanding)),
        ]));
        out
    }
}

impl ActivityReport {
    pub fn render(&self, text: &ReportText) -> String {
        let mut out = text.t("activity.title", &[]);
        out.push_str("\n\n");
        out.push_str(&text.t("activity.checked_in", &[
            ("checked_in", self.checked_in.to_string()),
            ("attendees", self.attendees.to_string()),
            ("percent", format!("{:.0}", self.checked_in_ratio() * 100.0)),
        ]));
        out.push('\n');
        for (action, count) in &self.counts {
            let _ = writeln!(out, "{}: {}", action, count);
        }
        for (heading, entries) in [
            ("activity.recent_logins", &self.recent_logins),
            ("activity.recent_checkins", &self.recent_checkins),
        ] {
            out.push('\n');
            out.push_str(&text.t(heading, &[]));
            out.push('\n');
            for entry in entries {
                out.push_str(&text.t("activity.entry", &[
                    ("who", entry.who.clone()),
                    ("at", format_timestamp(entry.at)),
                ]));
                out.push('\n');
            }
        }
        out.trim_end().to_string()
    }
}

/// Loads report data and renders it for the bot
#[derive(Debug, Clone)]
pub struct ReportService {
    database: Arc<DatabaseService>,
    currency: String,
}

impl ReportService {
    pub fn new(database: Arc<DatabaseService>, currency: String) -> Self {
        Self { database, currency }
    }

    pub async fn occupancy(&self) -> Result<OccupancyReport> {
        let (properties, bookings) = futures::try_join!(
            self.database.properties.list(),
            self.database.bookings.list(),
        )?;
        Ok(occupancy_report(&properties, &bookings))
    }

    pub async fn vehicles(&self) -> Result<VehicleReport> {
        let (attendees, bookings) = futures::try_join!(
            self.database.attendees.list_with_vehicle(),
            self.database.bookings.list(),
        )?;
        Ok(vehicle_report(&attendees, &bookings))
    }

    pub async fn rideshare(&self) -> Result<RideshareReport> {
        let (attendees, bookings) = futures::try_join!(
            self.database.attendees.list_all(),
            self.database.bookings.list(),
        )?;
        Ok(rideshare_report(&attendees, &bookings))
    }

    pub async fn payments(&self) -> Result<PaymentReport> {
        let (attendees, bookings) = futures::try_join!(
            self.database.attendees.list_all(),
            self.database.bookings.list(),
        )?;
        Ok(payment_report(&attendees, &bookings))
    }

    /// Recent entries come from the latest log rows; counts cover the whole log
    pub async fn activity(&self) -> Result<ActivityReport> {
        let (logs, attendees, totals) = futures::try_join!(
            self.database.activity.recent(ACTIVITY_WINDOW),
            self.database.attendees.list_all(),
            self.database.activity.count_by_action(),
        )?;
        let mut report = activity_report(&logs, &attendees);
        report.counts = totals.into_iter().map(|c| (c.action, c.count)).collect();
        Ok(report)
    }

    pub async fn render(&self, kind: ReportKind, i18n: &I18n, lang: &str) -> Result<String> {
        let text = ReportText::new(i18n, lang, &self.currency);
        let rendered = match kind {
            ReportKind::Occupancy => self.occupancy().await?.render(&text),
            ReportKind::Vehicles => self.vehicles().await?.render(&text),
            ReportKind::Rideshare => self.rideshare().await?.render(&text),
            ReportKind::Payments => self.payments().await?.render(&text),
            ReportKind::Activity => self.activity().await?.render(&text),
        };
        Ok(rendered)
    }
}
