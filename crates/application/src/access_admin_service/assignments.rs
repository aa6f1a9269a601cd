use super::*;

use crate::{AssignRoleInput, RoleAssignmentRequest, UserRoleAssignment};

impl AccessAdminService {
    /// Lists every stored role assignment of a user.
    pub async fn list_user_roles(
        &self,
        actor: &UserIdentity,
        user_id: UserId,
    ) -> AppResult<Vec<UserRoleAssignment>> {
        self.require(actor, AdminPermission::UserRoleRead).await?;
        self.assignment_service.list_for_user(user_id).await
    }

    /// Assigns a role to a user on behalf of the actor.
    pub async fn assign_role_to_user(
        &self,
        actor: &UserIdentity,
        input: AssignRoleInput,
    ) -> AppResult<MutationOutcome<UserRoleAssignment>> {
        self.require(actor, AdminPermission::UserRoleAssign).await?;

        self.assignment_service
            .assign(RoleAssignmentRequest {
                user_id: input.user_id,
                role_id: input.role_id,
                assigned_by: Some(actor.user_id()),
                expires_at: input.expires_at,
            })
            .await
    }

    /// Removes a role from a user.
    ///
    /// The actor must outrank the role being removed.
    pub async fn remove_role_from_user(
        &self,
        actor: &UserIdentity,
        user_id: UserId,
        role_id: RoleId,
    ) -> AppResult<MutationOutcome<()>> {
        self.require(actor, AdminPermission::UserRoleRemove).await?;

        self.assignment_service
            .revoke(user_id, role_id, Some(actor.user_id()))
            .await
    }
}
