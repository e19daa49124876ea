//! Activity log repository implementation

use sqlx::PgPool;
use chrono::Utc;
use crate::models::activity::{ActivityLog, ActionCount, CreateActivityRequest};
use crate::utils::errors::Result;

#[derive(Debug, Clone)]
pub struct ActivityRepository {
    pool: PgPool,
}

impl ActivityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append a row to the audit trail
    pub async fn record(&self, request: CreateActivityRequest) -> Result<ActivityLog> {
        let log = sqlx::query_as::<_, ActivityLog>(
            r#"
            INSERT INTO activity_logs (attendee_id, telegram_id, action, details, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, attendee_id, telegram_id, action, details, created_at
            "#
        )
        .bind(request.attendee_id)
        .bind(request.telegram_id)
        .bind(request.action.as_str())
        .bind(request.details)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(log)
    }

    /// Newest entries first
    pub async fn recent(&self, limit: i64) -> Result<Vec<ActivityLog>> {
        let logs = sqlx::query_as::<_, ActivityLog>(
            "SELECT id, attendee_id, telegram_id, action, details, created_at FROM activity_logs ORDER BY created_at DESC LIMIT $1"
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(logs)
    }

    pub async fn for_attendee(&self, attendee_id: i64, limit: i64) -> Result<Vec<ActivityLog>> {
        let logs = sqlx::query_as::<_, ActivityLog>(
            "SELECT id, attendee_id, telegram_id, action, details, created_at FROM activity_logs WHERE attendee_id = $1 ORDER BY created_at DESC LIMIT $2"
        )
        .bind(attendee_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(logs)
    }

    pub async fn count_by_action(&self) -> Result<Vec<ActionCount>> {
        let counts = sqlx::query_as::<_, ActionCount>(
            "SELECT action, COUNT(*) AS count FROM activity_logs GROUP BY action ORDER BY action"
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(counts)
    }
}
