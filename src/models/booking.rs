//! Booking model

use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use crate::utils::errors::CbxError;

/// Payment channels accepted by the organizers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_method", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Venmo,
    Zelle,
    CashApp,
    Paypal,
    Cash,
    Other,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 6] = [
        PaymentMethod::Venmo,
        PaymentMethod::Zelle,
        PaymentMethod::CashApp,
        PaymentMethod::Paypal,
        PaymentMethod::Cash,
        PaymentMethod::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Venmo => "venmo",
            PaymentMethod::Zelle => "zelle",
            PaymentMethod::CashApp => "cash_app",
            PaymentMethod::Paypal => "paypal",
            PaymentMethod::Cash => "cash",
            PaymentMethod::Other => "other",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::Venmo => "Venmo",
            PaymentMethod::Zelle => "Zelle",
            PaymentMethod::CashApp => "Cash App",
            PaymentMethod::Paypal => "PayPal",
            PaymentMethod::Cash => "Cash",
            PaymentMethod::Other => "Other",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = CbxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase().replace([' ', '-'], "_");
        match key.as_str() {
            "venmo" => Ok(PaymentMethod::Venmo),
            "zelle" => Ok(PaymentMethod::Zelle),
            "cash_app" | "cashapp" => Ok(PaymentMethod::CashApp),
            "paypal" => Ok(PaymentMethod::Paypal),
            "cash" => Ok(PaymentMethod::Cash),
            "other" => Ok(PaymentMethod::Other),
            _ => Err(CbxError::InvalidInput(format!("Unknown payment method: {}", s))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Booking {
    pub id: i64,
    pub attendee_id: i64,
    pub property_id: i64,
    pub arrival_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub total_amount: Decimal,
    pub paid: bool,
    pub amount_paid: Option<Decimal>,
    pub amount_due: Option<Decimal>,
    pub payment_method: Option<PaymentMethod>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Coarse payment state used by reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Paid,
    Partial,
    Unpaid,
}

impl Booking {
    pub fn nights(&self) -> i64 {
        (self.exit_date - self.arrival_date).num_days()
    }

    /// Amount received so far
    pub fn received(&self) -> Decimal {
        if self.paid {
            return self.total_amount;
        }
        self.amount_paid.unwrap_or(Decimal::ZERO)
    }

    /// Amount still owed
    pub fn outstanding(&self) -> Decimal {
        if self.paid {
            return Decimal::ZERO;
        }
        match self.amount_due {
            Some(due) => due,
            None => (self.total_amount - self.received()).max(Decimal::ZERO),
        }
    }

    pub fn status(&self) -> PaymentStatus {
        if self.paid {
            PaymentStatus::Paid
        } else if self.received() > Decimal::ZERO {
            PaymentStatus::Partial
        } else {
            PaymentStatus::Unpaid
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBookingRequest {
    pub attendee_id: i64,
    pub property_id: i64,
    pub arrival_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub total_amount: Decimal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateBookingRequest {
    pub property_id: Option<i64>,
    pub arrival_date: Option<NaiveDate>,
    pub exit_date: Option<NaiveDate>,
    pub total_amount: Option<Decimal>,
}

/// Payment columns written as one unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentUpdate {
    pub paid: bool,
    pub amount_paid: Option<Decimal>,
    pub amount_due: Option<Decimal>,
    pub payment_method: Option<PaymentMethod>,
}
