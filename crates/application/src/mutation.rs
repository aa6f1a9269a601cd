use serde::Serialize;
use tracing::warn;

use atelier_domain::CacheTag;

use crate::CacheInvalidator;

/// Committed mutation together with the cache tags it made stale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationOutcome<T> {
    /// Mutation payload.
    pub value: T,
    /// Tags signalled to the cache layer, sorted and unique.
    pub invalidated_tags: Vec<CacheTag>,
}

impl<T> MutationOutcome<T> {
    /// Returns whether the outcome signalled the tag.
    #[must_use]
    pub fn invalidates(&self, tag: &CacheTag) -> bool {
        self.invalidated_tags.contains(tag)
    }
}

/// Signals every tag after commit and wraps the payload.
///
/// The mutation is already durable at this point, so an unreachable cache
/// layer is logged and never turns the outcome into an error.
pub(crate) async fn commit_outcome<T>(
    cache_invalidator: &dyn CacheInvalidator,
    value: T,
    tags: impl IntoIterator<Item = CacheTag>,
) -> MutationOutcome<T> {
    let invalidated_tags = CacheTag::normalize(tags);

    for tag in &invalidated_tags {
        if let Err(error) = cache_invalidator.invalidate(tag).await {
            warn!(tag = %tag, error = %error, "failed to signal cache invalidation");
        }
    }

    MutationOutcome {
        value,
        invalidated_tags,
    }
}
