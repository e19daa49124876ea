//! Property model

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;

/// A rental property attendees are booked into
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Property {
    pub id: i64,
    pub name: String,
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub max_occupancy: i32,
    pub nightly_price: Decimal,
    pub listing_url: Option<String>,
    pub bedrooms: i32,
    pub bathrooms: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Property {
    /// Nightly cost of one bed when the property is split evenly
    /// One attendee's share for a stay, rounded to cents
    pub fn share_for_nights(&self, nights: i64) -> Decimal {
        let nights = Decimal::from(nights.max(0));
        let occupancy = Decimal::from(self.max_occupancy.max(1));
        crate::utils::helpers::round_cents(nights * self.nightly_price / occupancy)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePropertyRequest {
    pub name: String,
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub max_occupancy: i32,
    pub nightly_price: Decimal,
    pub listing_url: Option<String>,
    pub bedrooms: i32,
    pub bathrooms: Decimal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePropertyRequest {
    pub name: Option<String>,
    pub address: Option<String>,
    pub max_occupancy: Option<i32>,
    pub nightly_price: Option<Decimal>,
    pub listing_url: Option<String>,
}

/// Beds taken in a property, as counted from bookings
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PropertyOccupancy {
    pub property_id: i64,
    pub booked: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn property(price: &str, occupancy: i32) -> Property {
        Property {
            id: 1,
            name: "Casa Azul".to_string(),
            address: "1 Beach Rd".to_string(),
            latitude: None,
            longitude: None,
            max_occupancy: occupancy,
            nightly_price: Decimal::from_str(price).unwrap(),
            listing_url: None,
            bedrooms: 3,
            bathrooms: Decimal::from(2),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_share_for_nights_rounds_to_cents() {
        let p = property("500.00", 6);
        // 4 * 500 / 6 = 333.333...
        assert_eq!(p.share_for_nights(4), Decimal::from_str("333.33").unwrap());
        assert_eq!(p.share_for_nights(0), Decimal::ZERO);
    }

    #[test]
    fn test_share_even_split() {
        let p = property("300", 3);
        assert_eq!(p.share_for_nights(5), Decimal::from(500));
    }
}
