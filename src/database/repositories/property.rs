//! Property repository implementation

use sqlx::PgPool;
use chrono::Utc;
use crate::models::property::{Property, PropertyOccupancy, CreatePropertyRequest, UpdatePropertyRequest};
use crate::utils::errors::Result;

#[derive(Debug, Clone)]
pub struct PropertyRepository {
    pool: PgPool,
}

impl PropertyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new property
    pub async fn create(&self, request: CreatePropertyRequest) -> Result<Property> {
        let property = sqlx::query_as::<_, Property>(
            r#"
            INSERT INTO properties (name, address, latitude, longitude, max_occupancy, nightly_price, listing_url, bedrooms, bathrooms, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            RETURNING id, name, address, latitude, longitude, max_occupancy, nightly_price, listing_url, bedrooms, bathrooms, created_at, updated_at
            "#
        )
        .bind(request.name)
        .bind(request.address)
        .bind(request.latitude)
        .bind(request.longitude)
        .bind(request.max_occupancy)
        .bind(request.nightly_price)
        .bind(request.listing_url)
        .bind(request.bedrooms)
        .bind(request.bathrooms)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(property)
    }

    /// Find property by ID
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Property>> {
        let property = sqlx::query_as::<_, Property>(
            "SELECT id, name, address, latitude, longitude, max_occupancy, nightly_price, listing_url, bedrooms, bathrooms, created_at, updated_at FROM properties WHERE id = $1"
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(property)
    }

    /// List all properties by name
    pub async fn list(&self) -> Result<Vec<Property>> {
        let properties = sqlx::query_as::<_, Property>(
            "SELECT id, name, address, latitude, longitude, max_occupancy, nightly_price, listing_url, bedrooms, bathrooms, created_at, updated_at FROM properties ORDER BY name ASC"
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(properties)
    }

    /// Update property
    pub async fn update(&self, id: i64, request: UpdatePropertyRequest) -> Result<Property> {
        let property = sqlx::query_as::<_, Property>(
            r#"
            UPDATE properties
            SET name = COALESCE($2, name),
                address = COALESCE($3, address),
                max_occupancy = COALESCE($4, max_occupancy),
                nightly_price = COALESCE($5, nightly_price),
                listing_url = COALESCE($6, listing_url),
                updated_at = $7
            WHERE id = $1
            RETURNING id, name, address, latitude, longitude, max_occupancy, nightly_price, listing_url, bedrooms, bathrooms, created_at, updated_at
            "#
        )
        .bind(id)
        .bind(request.name)
        .bind(request.address)
        .bind(request.max_occupancy)
        .bind(request.nightly_price)
        .bind(request.listing_url)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(property)
    }

    /// Delete property. Fails while bookings still reference it.
    pub async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM properties WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Number of bookings per property, including empty ones
    pub async fn occupancy(&self) -> Result<Vec<PropertyOccupancy>> {
        let rows = sqlx::query_as::<_, PropertyOccupancy>(
            r#"
            SELECT p.id AS property_id, COUNT(b.id) AS booked
            FROM properties p
            LEFT JOIN bookings b ON b.property_id = p.id
            GROUP BY p.id
            ORDER BY p.id
            "#
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
