use super::*;

use chrono::Utc;

use atelier_domain::{RoleName, SUPER_ADMIN_ROLE_NAME, is_protected_role};

use crate::{CreateRoleInput, NewRole, RoleChanges, RoleOverview, UpdateRoleInput};

impl AccessAdminService {
    /// Lists roles with their active assignment and grant counts.
    pub async fn list_roles(&self, actor: &UserIdentity) -> AppResult<Vec<RoleOverview>> {
        self.require(actor, AdminPermission::RoleRead).await?;
        self.repository.list_roles(Utc::now()).await
    }

    /// Creates a role the actor strictly outranks.
    pub async fn create_role(
        &self,
        actor: &UserIdentity,
        input: CreateRoleInput,
    ) -> AppResult<MutationOutcome<RoleDefinition>> {
        let name = RoleName::new(input.name)?;
        let priority = Priority::new(input.priority)?;

        self.require(actor, AdminPermission::RoleCreate).await?;

        if name.is_protected() {
            return Err(AppError::Forbidden(format!(
                "role name '{SUPER_ADMIN_ROLE_NAME}' is reserved"
            )));
        }

        self.require_outranks(actor, priority).await?;

        if self
            .repository
            .find_role_by_name(name.as_str())
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(format!(
                "role '{}' already exists",
                name.as_str()
            )));
        }

        let role = self
            .repository
            .create_role(NewRole {
                name,
                priority,
                created_by: Some(actor.user_id()),
            })
            .await?;

        let tags = [CacheTag::Roles, CacheTag::Role(role.role_id)];
        Ok(self
            .finish(actor.user_id(), "create_role", role.name.clone(), role, tags)
            .await)
    }

    /// Renames a role or changes its priority.
    ///
    /// The actor must outrank the role's current priority and, when the
    /// priority changes, the requested one as well.
    pub async fn update_role(
        &self,
        actor: &UserIdentity,
        role_id: RoleId,
        input: UpdateRoleInput,
    ) -> AppResult<MutationOutcome<RoleDefinition>> {
        let name = input.name.map(RoleName::new).transpose()?;
        let priority = input.priority.map(Priority::new).transpose()?;
        if name.is_none() && priority.is_none() {
            return Err(AppError::Validation(
                "role update must change the name or the priority".to_owned(),
            ));
        }

        self.require(actor, AdminPermission::RoleUpdate).await?;

        let role = self.load_role(role_id).await?;
        if let Some(name) = &name
            && is_protected_role(&role.name)
            && name.as_str() != role.name
        {
            return Err(AppError::Forbidden(format!(
                "role '{}' cannot be renamed",
                role.name
            )));
        }

        let actor_priority = self.actor_priority(actor).await?;
        ensure_can_grant(actor_priority, role.priority)?;
        if let Some(priority) = priority {
            ensure_can_grant(actor_priority, priority)?;
        }

        if let Some(name) = &name
            && let Some(existing) = self.repository.find_role_by_name(name.as_str()).await?
            && existing.role_id != role_id
        {
            return Err(AppError::Conflict(format!(
                "role '{}' already exists",
                name.as_str()
            )));
        }

        let updated = self
            .repository
            .update_role(
                role_id,
                RoleChanges {
                    name,
                    priority,
                    expected_priority: role.priority,
                    updated_by: actor.user_id(),
                },
            )
            .await?;

        let tags = [CacheTag::Roles, CacheTag::Role(role_id), CacheTag::Users];
        Ok(self
            .finish(actor.user_id(), "update_role", updated.name.clone(), updated, tags)
            .await)
    }

    /// Deletes a role that has no assignments and no grants.
    ///
    /// The `super_admin` role is never deletable.
    pub async fn delete_role(
        &self,
        actor: &UserIdentity,
        role_id: RoleId,
    ) -> AppResult<MutationOutcome<RoleDefinition>> {
        self.require(actor, AdminPermission::RoleDelete).await?;

        let role = self.load_role(role_id).await?;
        if is_protected_role(&role.name) {
            return Err(AppError::Forbidden(format!(
                "role '{}' cannot be deleted",
                role.name
            )));
        }

        self.require_outranks(actor, role.priority).await?;

        let deleted = self.repository.delete_role(role_id, role.priority).await?;

        let tags = [CacheTag::Roles, CacheTag::Role(role_id), CacheTag::Users];
        Ok(self
            .finish(actor.user_id(), "delete_role", deleted.name.clone(), deleted, tags)
            .await)
    }
}
