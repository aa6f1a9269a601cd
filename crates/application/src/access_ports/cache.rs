use async_trait::async_trait;

use atelier_core::AppResult;
use atelier_domain::CacheTag;

/// Port signalling the external cache layer that tagged entries are stale.
#[async_trait]
pub trait CacheInvalidator: Send + Sync {
    /// Invalidates every cache entry carrying the tag.
    async fn invalidate(&self, tag: &CacheTag) -> AppResult<()>;
}
