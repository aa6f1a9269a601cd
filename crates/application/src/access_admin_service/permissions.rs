use super::*;

use atelier_domain::PermissionName;

use crate::{
    CreatePermissionInput, NewPermission, PermissionDefinition, PermissionDeletion,
    ResourceReplacement, UpdatePermissionInput,
};

impl AccessAdminService {
    /// Lists permissions with their linked resources.
    pub async fn list_permissions(
        &self,
        actor: &UserIdentity,
    ) -> AppResult<Vec<PermissionDefinition>> {
        self.require(actor, AdminPermission::PermissionRead).await?;
        self.repository.list_permissions().await
    }

    /// Creates a permission, optionally linked to resources.
    pub async fn create_permission(
        &self,
        actor: &UserIdentity,
        input: CreatePermissionInput,
    ) -> AppResult<MutationOutcome<PermissionDefinition>> {
        let name = PermissionName::new(input.name)?;
        let resource_ids: BTreeSet<ResourceId> = input.resource_ids.into_iter().collect();

        self.require(actor, AdminPermission::PermissionCreate)
            .await?;

        if self
            .repository
            .find_permission_by_name(name.as_str())
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(format!(
                "permission '{}' already exists",
                name.as_str()
            )));
        }

        self.ensure_resources_exist(&resource_ids).await?;

        let permission = self
            .repository
            .create_permission(NewPermission {
                name,
                resource_ids: resource_ids.iter().copied().collect(),
            })
            .await?;

        let mut tags = vec![
            CacheTag::Permissions,
            CacheTag::Permission(permission.permission_id),
        ];
        if !resource_ids.is_empty() {
            tags.push(CacheTag::Resources);
            tags.extend(resource_ids.into_iter().map(CacheTag::Resource));
        }

        Ok(self
            .finish(
                actor.user_id(),
                "create_permission",
                permission.name.clone(),
                permission,
                tags,
            )
            .await)
    }

    /// Renames a permission.
    pub async fn update_permission(
        &self,
        actor: &UserIdentity,
        permission_id: PermissionId,
        input: UpdatePermissionInput,
    ) -> AppResult<MutationOutcome<PermissionDefinition>> {
        let name = PermissionName::new(input.name)?;

        self.require(actor, AdminPermission::PermissionUpdate)
            .await?;
        self.ensure_permission_exists(permission_id).await?;

        if let Some(existing) = self
            .repository
            .find_permission_by_name(name.as_str())
            .await?
            && existing.permission_id != permission_id
        {
            return Err(AppError::Conflict(format!(
                "permission '{}' already exists",
                name.as_str()
            )));
        }

        let permission = self
            .repository
            .rename_permission(permission_id, name)
            .await?;

        // Resolved grants carry the permission name.
        let tags = [
            CacheTag::Permissions,
            CacheTag::Permission(permission_id),
            CacheTag::Roles,
            CacheTag::Users,
        ];
        Ok(self
            .finish(
                actor.user_id(),
                "update_permission",
                permission.name.clone(),
                permission,
                tags,
            )
            .await)
    }

    /// Deletes a permission with its role grants and resource pairs.
    pub async fn delete_permission(
        &self,
        actor: &UserIdentity,
        permission_id: PermissionId,
    ) -> AppResult<MutationOutcome<PermissionDeletion>> {
        self.require(actor, AdminPermission::PermissionDelete)
            .await?;

        let deletion = self.repository.delete_permission(permission_id).await?;

        let tags = [
            CacheTag::Permissions,
            CacheTag::Permission(permission_id),
            CacheTag::Resources,
            CacheTag::Roles,
            CacheTag::Users,
        ];
        Ok(self
            .finish(
                actor.user_id(),
                "delete_permission",
                deletion.name.clone(),
                deletion,
                tags,
            )
            .await)
    }

    /// Replaces the full resource set of a permission.
    ///
    /// Repeating the call with the same ids leaves the same pairs in place.
    pub async fn assign_resources_to_permission(
        &self,
        actor: &UserIdentity,
        permission_id: PermissionId,
        resource_ids: Vec<ResourceId>,
    ) -> AppResult<MutationOutcome<ResourceReplacement>> {
        let resource_ids: BTreeSet<ResourceId> = resource_ids.into_iter().collect();

        self.require(actor, AdminPermission::PermissionUpdate)
            .await?;
        self.ensure_permission_exists(permission_id).await?;
        self.ensure_resources_exist(&resource_ids).await?;

        let replacement = self
            .repository
            .replace_permission_resources(permission_id, resource_ids.into_iter().collect())
            .await?;

        let tags = [
            CacheTag::Permissions,
            CacheTag::Permission(permission_id),
            CacheTag::Resources,
            CacheTag::Roles,
            CacheTag::Users,
        ];
        Ok(self
            .finish(
                actor.user_id(),
                "assign_resources_to_permission",
                replacement.permission.name.clone(),
                replacement,
                tags,
            )
            .await)
    }
}
