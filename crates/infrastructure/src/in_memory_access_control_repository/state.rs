use super::*;

impl AccessControlState {
    pub(super) fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    pub(super) fn role(&self, role_id: RoleId) -> AppResult<RoleDefinition> {
        self.roles
            .get(&role_id)
            .map(|role| role_definition(role_id, role))
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' was not found")))
    }

    /// Loads a role the hierarchy guard saw at `expected` priority.
    pub(super) fn role_at(&self, role_id: RoleId, expected: Priority) -> AppResult<RoleDefinition> {
        let role = self.role(role_id)?;
        if role.priority != expected {
            return Err(AppError::Conflict(format!(
                "role '{role_id}' changed priority concurrently; reload it and retry"
            )));
        }

        Ok(role)
    }

    pub(super) fn role_named(&self, name: &str) -> Option<RoleDefinition> {
        self.roles
            .iter()
            .find(|(_, role)| role.name == name)
            .map(|(role_id, role)| role_definition(*role_id, role))
    }

    pub(super) fn permission(&self, permission_id: PermissionId) -> AppResult<PermissionDefinition> {
        let permission = self.permissions.get(&permission_id).ok_or_else(|| {
            AppError::NotFound(format!("permission '{permission_id}' was not found"))
        })?;

        let mut resources: Vec<ResourceReference> = self
            .resource_permissions
            .values()
            .filter(|pair| pair.permission_id == permission_id)
            .filter_map(|pair| {
                self.resources
                    .get(&pair.resource_id)
                    .map(|resource| ResourceReference {
                        resource_id: pair.resource_id,
                        name: resource.name.clone(),
                    })
            })
            .collect();
        resources.sort_by(|left, right| left.name.cmp(&right.name));

        Ok(PermissionDefinition {
            permission_id,
            name: permission.name.clone(),
            resources,
            created_at: permission.created_at,
            updated_at: permission.updated_at,
        })
    }

    pub(super) fn permission_id_named(&self, name: &str) -> Option<PermissionId> {
        self.permissions
            .iter()
            .find(|(_, permission)| permission.name == name)
            .map(|(permission_id, _)| *permission_id)
    }

    pub(super) fn resource(&self, resource_id: ResourceId) -> AppResult<ResourceDefinition> {
        let resource = self
            .resources
            .get(&resource_id)
            .ok_or_else(|| AppError::NotFound(format!("resource '{resource_id}' was not found")))?;

        Ok(ResourceDefinition {
            resource_id,
            name: resource.name.clone(),
            permission_count: self.pair_count(|pair| pair.resource_id == resource_id),
            created_at: resource.created_at,
            updated_at: resource.updated_at,
        })
    }

    pub(super) fn resource_id_named(&self, name: &str) -> Option<ResourceId> {
        self.resources
            .iter()
            .find(|(_, resource)| same_resource_name(&resource.name, name))
            .map(|(resource_id, _)| *resource_id)
    }

    pub(super) fn pair_count(&self, predicate: impl Fn(&StoredPair) -> bool) -> u64 {
        self.resource_permissions
            .values()
            .filter(|pair| predicate(pair))
            .count() as u64
    }

    pub(super) fn pair_id(&self, permission_id: PermissionId, resource_id: ResourceId) -> Option<i64> {
        self.resource_permissions
            .iter()
            .find(|(_, pair)| pair.permission_id == permission_id && pair.resource_id == resource_id)
            .map(|(pair_id, _)| *pair_id)
    }

    pub(super) fn active_role_ids(
        &self,
        user_id: UserId,
        as_of: DateTime<Utc>,
    ) -> impl Iterator<Item = RoleId> + '_ {
        self.user_roles
            .iter()
            .filter(move |((stored_user_id, _), assignment)| {
                *stored_user_id == user_id && is_assignment_active(assignment.expires_at, as_of)
            })
            .map(|((_, role_id), _)| *role_id)
    }

    pub(super) fn grants_for(
        &self,
        user_id: UserId,
        as_of: DateTime<Utc>,
    ) -> AppResult<Vec<PermissionGrant>> {
        let active_roles: BTreeSet<RoleId> = self.active_role_ids(user_id, as_of).collect();

        let grants: BTreeSet<PermissionGrant> = self
            .role_permissions
            .iter()
            .filter(|(role_id, _)| active_roles.contains(role_id))
            .filter_map(|(_, pair_id)| self.resource_permissions.get(pair_id))
            .filter_map(|pair| {
                let permission = self.permissions.get(&pair.permission_id)?;
                let resource = self.resources.get(&pair.resource_id)?;
                Some(PermissionGrant::new(
                    permission.name.as_str(),
                    resource.name.as_str(),
                ))
            })
            .collect::<AppResult<_>>()?;

        Ok(grants.into_iter().collect())
    }
}

fn role_definition(role_id: RoleId, role: &StoredRole) -> RoleDefinition {
    RoleDefinition {
        role_id,
        name: role.name.clone(),
        priority: role.priority,
        created_by: role.created_by,
        updated_by: role.updated_by,
        created_at: role.created_at,
        updated_at: role.updated_at,
    }
}
