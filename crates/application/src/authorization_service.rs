use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use atelier_core::{AppError, AppResult, UserId, UserIdentity};
use atelier_domain::{AdminPermission, EffectivePriority, PermissionGrant};

use crate::AuthorizationRepository;

/// Priority and permission resolver.
///
/// Reads never open transactions. A store failure is returned as an error,
/// never as "no permission"; callers must fail closed on it.
#[derive(Clone)]
pub struct AuthorizationService {
    repository: Arc<dyn AuthorizationRepository>,
}

impl AuthorizationService {
    /// Creates a new authorization service from a repository implementation.
    #[must_use]
    pub fn new(repository: Arc<dyn AuthorizationRepository>) -> Self {
        Self { repository }
    }

    /// Returns the user's effective priority right now.
    pub async fn effective_priority(&self, user_id: UserId) -> AppResult<EffectivePriority> {
        self.effective_priority_at(user_id, Utc::now()).await
    }

    /// Returns the user's effective priority at `as_of`.
    ///
    /// Unknown users and users whose assignments all expired are unranked.
    pub async fn effective_priority_at(
        &self,
        user_id: UserId,
        as_of: DateTime<Utc>,
    ) -> AppResult<EffectivePriority> {
        let priorities = self
            .repository
            .list_active_role_priorities(user_id, as_of)
            .await?;

        Ok(EffectivePriority::from_active(priorities))
    }

    /// Returns whether the caller may perform `action` on `resource`.
    pub async fn has_permission(
        &self,
        actor: Option<&UserIdentity>,
        action: &str,
        resource: &str,
    ) -> AppResult<bool> {
        let Some(actor) = actor else {
            return Ok(false);
        };

        if action.trim().is_empty() || resource.trim().is_empty() {
            return Ok(false);
        }

        self.repository
            .user_has_permission_grant(actor.user_id(), action.trim(), resource.trim(), Utc::now())
            .await
    }

    /// Checks a legacy combined `resource.action` permission name.
    pub async fn has_legacy_permission(
        &self,
        actor: Option<&UserIdentity>,
        permission_name: &str,
    ) -> AppResult<bool> {
        let grant = PermissionGrant::from_legacy_name(permission_name)?;
        self.has_permission(actor, grant.action(), grant.resource())
            .await
    }

    /// Returns every `(action, resource)` pair the caller currently holds.
    pub async fn resolve_permissions(
        &self,
        actor: Option<&UserIdentity>,
    ) -> AppResult<BTreeSet<PermissionGrant>> {
        let Some(actor) = actor else {
            return Ok(BTreeSet::new());
        };

        let grants = self
            .repository
            .list_permission_grants_for_user(actor.user_id(), Utc::now())
            .await?;

        Ok(grants.into_iter().collect())
    }

    /// Ensures the caller holds a built-in admin permission.
    pub async fn require_permission(
        &self,
        actor: &UserIdentity,
        permission: AdminPermission,
    ) -> AppResult<()> {
        if self
            .has_permission(Some(actor), permission.action(), permission.resource())
            .await?
        {
            return Ok(());
        }

        Err(AppError::Forbidden(format!(
            "user '{}' is missing permission '{}'",
            actor.user_id(),
            permission.as_legacy_name()
        )))
    }
}
