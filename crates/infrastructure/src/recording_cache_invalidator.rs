use async_trait::async_trait;
use atelier_application::CacheInvalidator;
use atelier_core::AppResult;
use atelier_domain::CacheTag;
use tokio::sync::RwLock;

/// In-memory invalidator that remembers every signalled tag in order.
#[derive(Debug, Default)]
pub struct RecordingCacheInvalidator {
    tags: RwLock<Vec<CacheTag>>,
}

impl RecordingCacheInvalidator {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every tag signalled so far.
    pub async fn recorded(&self) -> Vec<CacheTag> {
        self.tags.read().await.clone()
    }

    /// Returns and forgets every tag signalled so far.
    pub async fn drain(&self) -> Vec<CacheTag> {
        std::mem::take(&mut *self.tags.write().await)
    }
}

#[async_trait]
impl CacheInvalidator for RecordingCacheInvalidator {
    async fn invalidate(&self, tag: &CacheTag) -> AppResult<()> {
        self.tags.write().await.push(*tag);
        Ok(())
    }
}
