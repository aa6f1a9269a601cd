use super::*;

impl AccessControlState {
    pub(super) fn list_roles(&self, as_of: DateTime<Utc>) -> AppResult<Vec<RoleOverview>> {
        let mut roles: Vec<RoleOverview> = self
            .roles
            .keys()
            .map(|role_id| {
                Ok(RoleOverview {
                    role: self.role(*role_id)?,
                    active_assignment_count: self
                        .user_roles
                        .iter()
                        .filter(|((_, stored_role_id), assignment)| {
                            stored_role_id == role_id
                                && is_assignment_active(assignment.expires_at, as_of)
                        })
                        .count() as u64,
                    grant_count: self
                        .role_permissions
                        .iter()
                        .filter(|(stored_role_id, _)| stored_role_id == role_id)
                        .count() as u64,
                })
            })
            .collect::<AppResult<_>>()?;

        roles.sort_by(|left, right| {
            left.role
                .priority
                .cmp(&right.role.priority)
                .then_with(|| left.role.name.cmp(&right.role.name))
        });
        Ok(roles)
    }

    pub(super) fn create_role(&mut self, role: NewRole) -> AppResult<RoleDefinition> {
        if self.role_named(role.name.as_str()).is_some() {
            return Err(AppError::Conflict(format!(
                "role '{}' already exists",
                role.name.as_str()
            )));
        }

        let role_id = RoleId::new(self.next_id())?;
        let now = Utc::now();
        self.roles.insert(
            role_id,
            StoredRole {
                name: role.name.as_str().to_owned(),
                priority: role.priority,
                created_by: role.created_by,
                updated_by: role.created_by,
                created_at: now,
                updated_at: now,
            },
        );

        self.role(role_id)
    }

    pub(super) fn update_role(
        &mut self,
        role_id: RoleId,
        changes: RoleChanges,
    ) -> AppResult<RoleDefinition> {
        if let Some(name) = &changes.name
            && let Some(existing) = self.role_named(name.as_str())
            && existing.role_id != role_id
        {
            return Err(AppError::Conflict(format!(
                "role '{}' already exists",
                name.as_str()
            )));
        }

        self.role_at(role_id, changes.expected_priority)?;
        let role = self
            .roles
            .get_mut(&role_id)
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' was not found")))?;

        if let Some(name) = changes.name {
            role.name = name.as_str().to_owned();
        }
        if let Some(priority) = changes.priority {
            role.priority = priority;
        }
        role.updated_by = Some(changes.updated_by);
        role.updated_at = Utc::now();

        self.role(role_id)
    }

    pub(super) fn delete_role(
        &mut self,
        role_id: RoleId,
        expected_priority: Priority,
    ) -> AppResult<RoleDefinition> {
        let role = self.role_at(role_id, expected_priority)?;

        let assignments = self
            .user_roles
            .keys()
            .filter(|(_, stored_role_id)| *stored_role_id == role_id)
            .count() as u64;
        if assignments > 0 {
            return Err(AppError::HasDependents {
                entity: format!("role '{}'", role.name),
                relation: "user_roles".to_owned(),
                count: assignments,
            });
        }

        let grants = self
            .role_permissions
            .iter()
            .filter(|(stored_role_id, _)| *stored_role_id == role_id)
            .count() as u64;
        if grants > 0 {
            return Err(AppError::HasDependents {
                entity: format!("role '{}'", role.name),
                relation: "role_permissions".to_owned(),
                count: grants,
            });
        }

        self.roles.remove(&role_id);
        Ok(role)
    }

    pub(super) fn create_permission(
        &mut self,
        permission: NewPermission,
    ) -> AppResult<PermissionDefinition> {
        if self.permission_id_named(permission.name.as_str()).is_some() {
            return Err(AppError::Conflict(format!(
                "permission '{}' already exists",
                permission.name.as_str()
            )));
        }

        let permission_id = PermissionId::new(self.next_id())?;
        let now = Utc::now();
        self.permissions.insert(
            permission_id,
            StoredName {
                name: permission.name.as_str().to_owned(),
                created_at: now,
                updated_at: now,
            },
        );

        for resource_id in permission.resource_ids {
            self.link(permission_id, resource_id)?;
        }

        self.permission(permission_id)
    }

    pub(super) fn rename_permission(
        &mut self,
        permission_id: PermissionId,
        name: PermissionName,
    ) -> AppResult<PermissionDefinition> {
        if let Some(existing) = self.permission_id_named(name.as_str())
            && existing != permission_id
        {
            return Err(AppError::Conflict(format!(
                "permission '{}' already exists",
                name.as_str()
            )));
        }

        let permission = self.permissions.get_mut(&permission_id).ok_or_else(|| {
            AppError::NotFound(format!("permission '{permission_id}' was not found"))
        })?;
        permission.name = name.as_str().to_owned();
        permission.updated_at = Utc::now();

        self.permission(permission_id)
    }

    pub(super) fn delete_permission(
        &mut self,
        permission_id: PermissionId,
        armed: Option<InMemoryFailPoint>,
    ) -> AppResult<PermissionDeletion> {
        let permission = self.permission(permission_id)?;
        let pair_ids: BTreeSet<i64> = self
            .resource_permissions
            .iter()
            .filter(|(_, pair)| pair.permission_id == permission_id)
            .map(|(pair_id, _)| *pair_id)
            .collect();

        let removed_role_permissions = self.remove_grants_on(&pair_ids);
        trip(armed, InMemoryFailPoint::PermissionCascadeAfterRoleGrants)?;

        self.resource_permissions
            .retain(|pair_id, _| !pair_ids.contains(pair_id));
        trip(armed, InMemoryFailPoint::PermissionCascadeAfterResourcePairs)?;

        self.permissions.remove(&permission_id);

        Ok(PermissionDeletion {
            permission_id,
            name: permission.name,
            removed_resource_permissions: pair_ids.len() as u64,
            removed_role_permissions,
        })
    }

    pub(super) fn replace_permission_resources(
        &mut self,
        permission_id: PermissionId,
        resource_ids: Vec<ResourceId>,
        armed: Option<InMemoryFailPoint>,
    ) -> AppResult<ResourceReplacement> {
        self.permission(permission_id)?;
        let retained: BTreeSet<ResourceId> = resource_ids.iter().copied().collect();

        let stale_pairs: BTreeSet<i64> = self
            .resource_permissions
            .iter()
            .filter(|(_, pair)| {
                pair.permission_id == permission_id && !retained.contains(&pair.resource_id)
            })
            .map(|(pair_id, _)| *pair_id)
            .collect();

        let removed_role_permissions = self.remove_grants_on(&stale_pairs);
        self.resource_permissions
            .retain(|pair_id, _| !stale_pairs.contains(pair_id));
        trip(armed, InMemoryFailPoint::ResourceReplaceAfterRemoval)?;

        let mut added = 0;
        for resource_id in resource_ids {
            if self.link(permission_id, resource_id)? {
                added += 1;
            }
        }

        Ok(ResourceReplacement {
            permission: self.permission(permission_id)?,
            added,
            removed: stale_pairs.len() as u64,
            removed_role_permissions,
        })
    }

    pub(super) fn create_resource(&mut self, name: ResourceName) -> AppResult<ResourceDefinition> {
        if let Some(existing) = self.resource_id_named(name.as_str()) {
            return Err(AppError::Conflict(format!(
                "resource '{}' collides with resource '{existing}'",
                name.as_str()
            )));
        }

        let resource_id = ResourceId::new(self.next_id())?;
        let now = Utc::now();
        self.resources.insert(
            resource_id,
            StoredName {
                name: name.as_str().to_owned(),
                created_at: now,
                updated_at: now,
            },
        );

        self.resource(resource_id)
    }

    pub(super) fn rename_resource(
        &mut self,
        resource_id: ResourceId,
        name: ResourceName,
    ) -> AppResult<ResourceDefinition> {
        if let Some(existing) = self.resource_id_named(name.as_str())
            && existing != resource_id
        {
            return Err(AppError::Conflict(format!(
                "resource '{}' collides with resource '{existing}'",
                name.as_str()
            )));
        }

        let resource = self
            .resources
            .get_mut(&resource_id)
            .ok_or_else(|| AppError::NotFound(format!("resource '{resource_id}' was not found")))?;
        resource.name = name.as_str().to_owned();
        resource.updated_at = Utc::now();

        self.resource(resource_id)
    }

    pub(super) fn delete_resource(&mut self, resource_id: ResourceId) -> AppResult<ResourceDefinition> {
        let resource = self.resource(resource_id)?;
        if resource.permission_count > 0 {
            return Err(AppError::HasDependents {
                entity: format!("resource '{}'", resource.name),
                relation: "resource_permissions".to_owned(),
                count: resource.permission_count,
            });
        }

        self.resources.remove(&resource_id);
        Ok(resource)
    }

    /// Links a resource to a permission; returns whether a pair was added.
    pub(super) fn link(&mut self, permission_id: PermissionId, resource_id: ResourceId) -> AppResult<bool> {
        if !self.resources.contains_key(&resource_id) {
            return Err(AppError::NotFound(format!(
                "resource '{resource_id}' was not found"
            )));
        }

        if self.pair_id(permission_id, resource_id).is_some() {
            return Ok(false);
        }

        let pair_id = self.next_id();
        self.resource_permissions.insert(
            pair_id,
            StoredPair {
                resource_id,
                permission_id,
            },
        );
        Ok(true)
    }

    fn remove_grants_on(&mut self, pair_ids: &BTreeSet<i64>) -> u64 {
        let before = self.role_permissions.len();
        self.role_permissions
            .retain(|(_, pair_id)| !pair_ids.contains(pair_id));
        (before - self.role_permissions.len()) as u64
    }
}
