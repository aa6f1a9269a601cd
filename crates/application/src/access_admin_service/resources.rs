use super::*;

use atelier_domain::ResourceName;

use crate::{CreateResourceInput, ResourceDefinition, UpdateResourceInput};

impl AccessAdminService {
    /// Lists resources with their permission counts.
    pub async fn list_resources(&self, actor: &UserIdentity) -> AppResult<Vec<ResourceDefinition>> {
        self.require(actor, AdminPermission::ResourceRead).await?;
        self.repository.list_resources().await
    }

    /// Creates a resource. Names are unique ignoring case.
    pub async fn create_resource(
        &self,
        actor: &UserIdentity,
        input: CreateResourceInput,
    ) -> AppResult<MutationOutcome<ResourceDefinition>> {
        let name = ResourceName::new(input.name)?;

        self.require(actor, AdminPermission::ResourceCreate).await?;

        if let Some(existing) = self.repository.find_resource_by_name(name.as_str()).await? {
            return Err(AppError::Conflict(format!(
                "resource '{}' already exists as '{}'",
                name.as_str(),
                existing.name
            )));
        }

        let resource = self.repository.create_resource(name).await?;

        let tags = [CacheTag::Resources, CacheTag::Resource(resource.resource_id)];
        Ok(self
            .finish(
                actor.user_id(),
                "create_resource",
                resource.name.clone(),
                resource,
                tags,
            )
            .await)
    }

    /// Renames a resource.
    pub async fn update_resource(
        &self,
        actor: &UserIdentity,
        resource_id: ResourceId,
        input: UpdateResourceInput,
    ) -> AppResult<MutationOutcome<ResourceDefinition>> {
        let name = ResourceName::new(input.name)?;

        self.require(actor, AdminPermission::ResourceUpdate).await?;

        if self.repository.find_resource(resource_id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "resource '{resource_id}' was not found"
            )));
        }

        if let Some(existing) = self.repository.find_resource_by_name(name.as_str()).await?
            && existing.resource_id != resource_id
        {
            return Err(AppError::Conflict(format!(
                "resource '{}' already exists as '{}'",
                name.as_str(),
                existing.name
            )));
        }

        let resource = self.repository.rename_resource(resource_id, name).await?;

        let tags = [
            CacheTag::Resources,
            CacheTag::Resource(resource_id),
            CacheTag::Permissions,
            CacheTag::Roles,
            CacheTag::Users,
        ];
        Ok(self
            .finish(
                actor.user_id(),
                "update_resource",
                resource.name.clone(),
                resource,
                tags,
            )
            .await)
    }

    /// Deletes a resource that no permission applies to.
    pub async fn delete_resource(
        &self,
        actor: &UserIdentity,
        resource_id: ResourceId,
    ) -> AppResult<MutationOutcome<ResourceDefinition>> {
        self.require(actor, AdminPermission::ResourceDelete).await?;

        let resource = self.repository.delete_resource(resource_id).await?;

        let tags = [CacheTag::Resources, CacheTag::Resource(resource_id)];
        Ok(self
            .finish(
                actor.user_id(),
                "delete_resource",
                resource.name.clone(),
                resource,
                tags,
            )
            .await)
    }
}
