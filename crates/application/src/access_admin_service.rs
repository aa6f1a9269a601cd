use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::info;

use atelier_core::{AppError, AppResult, UserId, UserIdentity};
use atelier_domain::{
    AdminPermission, CacheTag, EffectivePriority, PermissionId, Priority, ResourceId, RoleId,
    ensure_can_grant,
};

use crate::mutation::commit_outcome;
use crate::{
    AccessAdminRepository, AuthorizationService, CacheInvalidator, MutationOutcome,
    RoleAssignmentService, RoleDefinition,
};

mod assignments;
mod bootstrap;
mod permissions;
mod resources;
mod role_grants;
mod roles;

/// Single writer for roles, permissions, resources, grants and assignments.
///
/// Every operation validates its input first, then checks the caller's
/// admin permission, then the hierarchy guard, and only then touches the
/// store. Committed mutations return the cache tags they made stale.
#[derive(Clone)]
pub struct AccessAdminService {
    authorization_service: AuthorizationService,
    assignment_service: RoleAssignmentService,
    repository: Arc<dyn AccessAdminRepository>,
    cache_invalidator: Arc<dyn CacheInvalidator>,
}

impl AccessAdminService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(
        authorization_service: AuthorizationService,
        repository: Arc<dyn AccessAdminRepository>,
        cache_invalidator: Arc<dyn CacheInvalidator>,
    ) -> Self {
        let assignment_service = RoleAssignmentService::new(
            authorization_service.clone(),
            repository.clone(),
            cache_invalidator.clone(),
        );

        Self {
            authorization_service,
            assignment_service,
            repository,
            cache_invalidator,
        }
    }

    async fn require(&self, actor: &UserIdentity, permission: AdminPermission) -> AppResult<()> {
        self.authorization_service
            .require_permission(actor, permission)
            .await
    }

    async fn actor_priority(&self, actor: &UserIdentity) -> AppResult<EffectivePriority> {
        self.authorization_service
            .effective_priority(actor.user_id())
            .await
    }

    async fn require_outranks(&self, actor: &UserIdentity, target: Priority) -> AppResult<()> {
        let actor_priority = self.actor_priority(actor).await?;
        ensure_can_grant(actor_priority, target)
    }

    async fn load_role(&self, role_id: RoleId) -> AppResult<RoleDefinition> {
        self.repository
            .find_role(role_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' was not found")))
    }

    async fn ensure_permission_exists(&self, permission_id: PermissionId) -> AppResult<()> {
        if self.repository.find_permission(permission_id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "permission '{permission_id}' was not found"
            )));
        }

        Ok(())
    }

    async fn ensure_resources_exist(&self, resource_ids: &BTreeSet<ResourceId>) -> AppResult<()> {
        for resource_id in resource_ids {
            if self.repository.find_resource(*resource_id).await?.is_none() {
                return Err(AppError::NotFound(format!(
                    "resource '{resource_id}' was not found"
                )));
            }
        }

        Ok(())
    }

    async fn finish<T>(
        &self,
        actor: UserId,
        operation: &'static str,
        entity: String,
        value: T,
        tags: impl IntoIterator<Item = CacheTag>,
    ) -> MutationOutcome<T> {
        let outcome = commit_outcome(self.cache_invalidator.as_ref(), value, tags).await;

        info!(
            actor = %actor,
            operation,
            entity = %entity,
            tags = ?outcome.invalidated_tags,
            "access-control mutation committed"
        );

        outcome
    }
}
