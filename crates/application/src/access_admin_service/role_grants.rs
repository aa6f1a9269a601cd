use super::*;

use crate::{RoleGrant, RoleGrantInput};

impl AccessAdminService {
    /// Lists the resource-scoped grants of a role.
    pub async fn list_role_permissions(
        &self,
        actor: &UserIdentity,
        role_id: RoleId,
    ) -> AppResult<Vec<RoleGrant>> {
        self.require(actor, AdminPermission::RoleRead).await?;
        self.load_role(role_id).await?;
        self.repository.list_role_grants(role_id).await
    }

    /// Replaces every grant of a role the actor outranks.
    ///
    /// Each grant must name an existing resource-permission pair.
    pub async fn assign_permissions_to_role(
        &self,
        actor: &UserIdentity,
        role_id: RoleId,
        grants: Vec<RoleGrantInput>,
    ) -> AppResult<MutationOutcome<Vec<RoleGrant>>> {
        let grants: BTreeSet<RoleGrantInput> = grants.into_iter().collect();

        self.require(actor, AdminPermission::RoleUpdate).await?;
        let role = self.load_role(role_id).await?;
        self.require_outranks(actor, role.priority).await?;

        let stored = self
            .repository
            .replace_role_grants(role_id, role.priority, grants.into_iter().collect())
            .await?;

        let tags = [CacheTag::Roles, CacheTag::Role(role_id), CacheTag::Users];
        Ok(self
            .finish(
                actor.user_id(),
                "assign_permissions_to_role",
                role.name,
                stored,
                tags,
            )
            .await)
    }

    /// Removes every grant of a role the actor outranks.
    pub async fn clear_role_permissions(
        &self,
        actor: &UserIdentity,
        role_id: RoleId,
    ) -> AppResult<MutationOutcome<u64>> {
        self.require(actor, AdminPermission::RoleUpdate).await?;
        let role = self.load_role(role_id).await?;
        self.require_outranks(actor, role.priority).await?;

        let removed = self
            .repository
            .clear_role_grants(role_id, role.priority)
            .await?;

        let tags = [CacheTag::Roles, CacheTag::Role(role_id), CacheTag::Users];
        Ok(self
            .finish(
                actor.user_id(),
                "clear_role_permissions",
                role.name,
                removed,
                tags,
            )
            .await)
    }
}
