//! Check-in results

use serde::{Deserialize, Serialize};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use super::attendee::TransportDetails;
use super::booking::PaymentUpdate;

/// Everything a completed check-in writes, applied in one transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckInOutcome {
    pub attendee_id: i64,
    /// Booking held before the wizard started, if any
    pub booking_id: Option<i64>,
    pub property_id: i64,
    pub arrival_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub total_amount: Decimal,
    pub payment: PaymentUpdate,
    pub transport: TransportDetails,
    pub checked_in: bool,
}
