//! Cache invalidator for deployments without a cache bus. Logs tags to tracing output.

use async_trait::async_trait;
use atelier_application::CacheInvalidator;
use atelier_core::AppResult;
use atelier_domain::CacheTag;
use tracing::info;

/// Invalidator that only logs the stale tags.
#[derive(Clone)]
pub struct LoggingCacheInvalidator;

impl LoggingCacheInvalidator {
    /// Creates a new logging invalidator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for LoggingCacheInvalidator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheInvalidator for LoggingCacheInvalidator {
    async fn invalidate(&self, tag: &CacheTag) -> AppResult<()> {
        info!(tag = %tag, "cache tag invalidated (no cache bus configured)");
        Ok(())
    }
}
