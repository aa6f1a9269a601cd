use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use atelier_core::{AppError, AppResult, UserId};
use atelier_domain::{CacheTag, RoleId, ensure_can_grant};

use crate::mutation::commit_outcome;
use crate::{
    AccessAdminRepository, AuthorizationService, CacheInvalidator, MutationOutcome,
    NewRoleAssignment, UserRoleAssignment,
};

/// Request to assign a role, optionally on behalf of another user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleAssignmentRequest {
    /// User receiving the role.
    pub user_id: UserId,
    /// Role being assigned.
    pub role_id: RoleId,
    /// Assigning user; `None` skips the hierarchy guard.
    pub assigned_by: Option<UserId>,
    /// Optional expiry; `None` never expires.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Creates and revokes time-bounded role assignments.
#[derive(Clone)]
pub struct RoleAssignmentService {
    authorization_service: AuthorizationService,
    repository: Arc<dyn AccessAdminRepository>,
    cache_invalidator: Arc<dyn CacheInvalidator>,
}

impl RoleAssignmentService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(
        authorization_service: AuthorizationService,
        repository: Arc<dyn AccessAdminRepository>,
        cache_invalidator: Arc<dyn CacheInvalidator>,
    ) -> Self {
        Self {
            authorization_service,
            repository,
            cache_invalidator,
        }
    }

    /// Assigns a role to a user.
    ///
    /// Checks, in order: the user exists, the role exists, no active
    /// assignment of the pair exists, and the assigner outranks the role.
    /// An expiry in the past is accepted and yields an inert assignment.
    pub async fn assign(
        &self,
        request: RoleAssignmentRequest,
    ) -> AppResult<MutationOutcome<UserRoleAssignment>> {
        let as_of = Utc::now();

        if self.repository.find_user(request.user_id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "user '{}' was not found",
                request.user_id
            )));
        }

        let role = self
            .repository
            .find_role(request.role_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role '{}' was not found", request.role_id)))?;

        if self
            .repository
            .find_active_role_assignment(request.user_id, request.role_id, as_of)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(format!(
                "role '{}' is already actively assigned to user '{}'",
                role.name, request.user_id
            )));
        }

        if let Some(assigned_by) = request.assigned_by {
            let assigner_priority = self
                .authorization_service
                .effective_priority_at(assigned_by, as_of)
                .await?;
            ensure_can_grant(assigner_priority, role.priority)?;
        }

        let assignment = self
            .repository
            .insert_role_assignment(NewRoleAssignment {
                user_id: request.user_id,
                role_id: request.role_id,
                assigned_by: request.assigned_by,
                expires_at: request.expires_at,
                expected_role_priority: role.priority,
                as_of,
            })
            .await?;

        let outcome = commit_outcome(
            self.cache_invalidator.as_ref(),
            assignment,
            assignment_tags(request.user_id),
        )
        .await;

        info!(
            user_id = %request.user_id,
            role_id = %request.role_id,
            assigned_by = ?request.assigned_by,
            expires_at = ?request.expires_at,
            "role assigned"
        );

        Ok(outcome)
    }

    /// Deletes the assignment of a role to a user.
    ///
    /// When `revoked_by` is set the revoker must outrank the role. Deletion is
    /// permanent; history must be captured by the caller beforehand.
    pub async fn revoke(
        &self,
        user_id: UserId,
        role_id: RoleId,
        revoked_by: Option<UserId>,
    ) -> AppResult<MutationOutcome<()>> {
        let role = self
            .repository
            .find_role(role_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' was not found")))?;

        if let Some(revoked_by) = revoked_by {
            let revoker_priority = self
                .authorization_service
                .effective_priority(revoked_by)
                .await?;
            ensure_can_grant(revoker_priority, role.priority)?;
        }

        self.repository
            .delete_role_assignment(user_id, role_id, role.priority)
            .await?;

        let outcome =
            commit_outcome(self.cache_invalidator.as_ref(), (), assignment_tags(user_id)).await;

        info!(user_id = %user_id, role_id = %role_id, revoked_by = ?revoked_by, "role revoked");

        Ok(outcome)
    }

    /// Lists every stored assignment of a user.
    pub async fn list_for_user(&self, user_id: UserId) -> AppResult<Vec<UserRoleAssignment>> {
        self.repository.list_user_role_assignments(user_id).await
    }
}

fn assignment_tags(user_id: UserId) -> [CacheTag; 3] {
    [CacheTag::Users, CacheTag::User(user_id), CacheTag::Roles]
}
