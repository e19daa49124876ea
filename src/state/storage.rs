//! State storage implementation
//!
//! Persists conversation contexts and login sessions in Redis with a TTL.

use std::time::Duration;
use redis::AsyncCommands;
use tracing::{debug, error, info, warn};
use crate::config::RedisConfig;
use crate::services::auth::Session;
use crate::utils::errors::Result;
use super::context::ConversationContext;

/// Redis-based state storage
#[derive(Clone)]
pub struct StateStorage {
    connection_manager: redis::aio::ConnectionManager,
    config: RedisConfig,
}

impl StateStorage {
    pub async fn new(config: RedisConfig) -> Result<Self> {
        let client = redis::Client::open(config.url.as_str())?;
        let connection_manager = redis::aio::ConnectionManager::new(client).await?;

        Ok(Self {
            connection_manager,
            config,
        })
    }

    /// Save conversation context to Redis
    pub async fn save_context(&self, context: &ConversationContext) -> Result<()> {
        let key = self.context_key(context.telegram_id);
        let serialized = serde_json::to_string(context)?;

        // Expiring contexts keep at least a minute so the user sees a reply
        let ttl_seconds = match context.expires_at {
            Some(expires_at) => (expires_at - chrono::Utc::now()).num_seconds().max(60) as u64,
            None => self.config.ttl_seconds,
        };

        let mut conn = self.connection_manager.clone();
        conn.set_ex::<_, _, ()>(&key, serialized, ttl_seconds).await.map_err(|e| {
            error!(telegram_id = context.telegram_id, error = %e, "Failed to save context to Redis");
            e
        })?;

        debug!(
            telegram_id = context.telegram_id,
            scenario = ?context.scenario,
            step = ?context.step,
            ttl_seconds,
            "Context saved"
        );
        Ok(())
    }

    /// Load conversation context, dropping it if expired
    pub async fn load_context(&self, telegram_id: i64) -> Result<Option<ConversationContext>> {
        let key = self.context_key(telegram_id);
        let mut conn = self.connection_manager.clone();

        let serialized: Option<String> = conn.get(&key).await?;
        let Some(data) = serialized else {
            debug!(telegram_id, "No context found in Redis");
            return Ok(None);
        };

        let context: ConversationContext = match serde_json::from_str(&data) {
            Ok(ctx) => ctx,
            Err(e) => {
                warn!(telegram_id, error = %e, "Discarding unreadable context");
                self.delete_context(telegram_id).await?;
                return Ok(None);
            }
        };

        if context.is_expired() {
            warn!(telegram_id, expires_at = ?context.expires_at, "Context has expired, removing");
            self.delete_context(telegram_id).await?;
            return Ok(None);
        }

        Ok(Some(context))
    }

    /// Load the context or start an empty one
    pub async fn load_or_new(&self, telegram_id: i64) -> Result<ConversationContext> {
        Ok(self.load_context(telegram_id).await?
            .unwrap_or_else(|| ConversationContext::new(telegram_id)))
    }

    pub async fn delete_context(&self, telegram_id: i64) -> Result<()> {
        let key = self.context_key(telegram_id);
        let mut conn = self.connection_manager.clone();

        let deleted: u32 = conn.del(&key).await?;
        debug!(telegram_id, deleted, "Context deleted");

        Ok(())
    }

    pub async fn context_exists(&self, telegram_id: i64) -> Result<bool> {
        let key = self.context_key(telegram_id);
        let mut conn = self.connection_manager.clone();

        let exists: bool = conn.exists(&key).await?;
        Ok(exists)
    }

    /// Store a login session for the configured TTL
    pub async fn save_session(&self, session: &Session) -> Result<()> {
        let key = self.session_key(session.telegram_id);
        let serialized = serde_json::to_string(session)?;

        let mut conn = self.connection_manager.clone();
        conn.set_ex::<_, _, ()>(&key, serialized, self.config.ttl_seconds).await?;

        debug!(telegram_id = session.telegram_id, role = ?session.role, "Session saved");
        Ok(())
    }

    pub async fn load_session(&self, telegram_id: i64) -> Result<Option<Session>> {
        let key = self.session_key(telegram_id);
        let mut conn = self.connection_manager.clone();

        let serialized: Option<String> = conn.get(&key).await?;
        match serialized {
            Some(data) => match serde_json::from_str::<Session>(&data) {
                Ok(session) => Ok(Some(session)),
                Err(e) => {
                    warn!(telegram_id, error = %e, "Discarding unreadable session");
                    self.delete_session(telegram_id).await?;
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    pub async fn delete_session(&self, telegram_id: i64) -> Result<()> {
        let key = self.session_key(telegram_id);
        let mut conn = self.connection_manager.clone();

        let _: u32 = conn.del(&key).await?;
        Ok(())
    }

    /// Users that currently hold a context
    pub async fn get_active_users(&self) -> Result<Vec<i64>> {
        let prefix = format!("{}context:", self.config.prefix);
        let mut conn = self.connection_manager.clone();

        let keys: Vec<String> = conn.keys(format!("{}*", prefix)).await?;

        Ok(keys
            .iter()
            .filter_map(|key| key.strip_prefix(&prefix))
            .filter_map(|id| id.parse::<i64>().ok())
            .collect())
    }

    /// Clean up expired contexts
    pub async fn cleanup_expired_contexts(&self) -> Result<u32> {
        let mut cleaned_count = 0;

        for telegram_id in self.get_active_users().await? {
            // load_context removes expired entries itself
            let existed = self.context_exists(telegram_id).await?;
            if existed && self.load_context(telegram_id).await?.is_none() {
                cleaned_count += 1;
            }
        }

        if cleaned_count > 0 {
            info!(cleaned_count, "Cleaned up expired contexts");
        }

        Ok(cleaned_count)
    }

    /// Run the cleanup on an interval until the task is aborted
    pub fn spawn_cleanup(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let storage = self.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(e) = storage.cleanup_expired_contexts().await {
                    error!(error = %e, "Context cleanup failed");
                }
            }
        })
    }

    /// Test Redis connection
    pub async fn test_connection(&self) -> Result<()> {
        let mut conn = self.connection_manager.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    fn context_key(&self, telegram_id: i64) -> String {
        format!("{}context:{}", self.config.prefix, telegram_id)
    }

    fn session_key(&self, telegram_id: i64) -> String {
        format!("{}session:{}", self.config.prefix, telegram_id)
    }
}

impl std::fmt::Debug for StateStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStorage")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
