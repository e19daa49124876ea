//! Photo repository implementation

use sqlx::PgPool;
use chrono::Utc;
use crate::models::photo::{Photo, CreatePhotoRequest};
use crate::utils::errors::Result;

#[derive(Debug, Clone)]
pub struct PhotoRepository {
    pool: PgPool,
}

impl PhotoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, request: CreatePhotoRequest) -> Result<Photo> {
        let photo = sqlx::query_as::<_, Photo>(
            r#"
            INSERT INTO photos (attendee_id, object_key, url, content_type, size_bytes, width, height, caption, uploaded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, attendee_id, object_key, url, content_type, size_bytes, width, height, caption, uploaded_at
            "#
        )
        .bind(request.attendee_id)
        .bind(request.object_key)
        .bind(request.url)
        .bind(request.content_type)
        .bind(request.size_bytes)
        .bind(request.width)
        .bind(request.height)
        .bind(request.caption)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(photo)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Photo>> {
        let photo = sqlx::query_as::<_, Photo>(
            "SELECT id, attendee_id, object_key, url, content_type, size_bytes, width, height, caption, uploaded_at FROM photos WHERE id = $1"
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(photo)
    }

    /// Newest photos first
    pub async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Photo>> {
        let photos = sqlx::query_as::<_, Photo>(
            "SELECT id, attendee_id, object_key, url, content_type, size_bytes, width, height, caption, uploaded_at FROM photos ORDER BY uploaded_at DESC LIMIT $1 OFFSET $2"
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(photos)
    }

    pub async fn list_for_attendee(&self, attendee_id: i64) -> Result<Vec<Photo>> {
        let photos = sqlx::query_as::<_, Photo>(
            "SELECT id, attendee_id, object_key, url, content_type, size_bytes, width, height, caption, uploaded_at FROM photos WHERE attendee_id = $1 ORDER BY uploaded_at DESC"
        )
        .bind(attendee_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(photos)
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM photos WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
