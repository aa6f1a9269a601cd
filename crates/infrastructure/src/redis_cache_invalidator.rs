//! Redis-backed cache invalidation bus.

use async_trait::async_trait;
use atelier_application::CacheInvalidator;
use atelier_core::{AppError, AppResult};
use atelier_domain::CacheTag;
use redis::AsyncCommands;
use tracing::debug;

/// Publishes stale tags on a channel and drops the matching cached keys.
#[derive(Clone)]
pub struct RedisCacheInvalidator {
    client: redis::Client,
    channel: String,
    key_prefix: String,
}

impl RedisCacheInvalidator {
    /// Creates an invalidator with a configured Redis client, channel and key prefix.
    #[must_use]
    pub fn new(
        client: redis::Client,
        channel: impl Into<String>,
        key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            client,
            channel: channel.into(),
            key_prefix: key_prefix.into(),
        }
    }

    fn key_for(&self, tag: &CacheTag) -> String {
        format!("{}:{}", self.key_prefix, tag)
    }
}

#[async_trait]
impl CacheInvalidator for RedisCacheInvalidator {
    async fn invalidate(&self, tag: &CacheTag) -> AppResult<()> {
        let mut connection = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Internal(format!("failed to connect to redis: {error}")))?;

        let receivers: i64 = connection
            .publish(self.channel.as_str(), tag.as_string())
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to publish cache tag '{tag}': {error}"))
            })?;

        let removed: i64 = connection.del(self.key_for(tag)).await.map_err(|error| {
            AppError::Internal(format!("failed to drop cache entry for tag '{tag}': {error}"))
        })?;

        debug!(tag = %tag, receivers, removed, "cache tag invalidated");
        Ok(())
    }
}
