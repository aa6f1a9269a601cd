use super::*;

impl AccessControlState {
    pub(super) fn role_grants(&self, role_id: RoleId) -> AppResult<Vec<RoleGrant>> {
        let mut grants = self
            .role_permissions
            .iter()
            .filter(|(stored_role_id, _)| *stored_role_id == role_id)
            .filter_map(|(_, pair_id)| self.resource_permissions.get(pair_id))
            .map(|pair| {
                let permission = self.permission(pair.permission_id)?;
                let resource = self.resource(pair.resource_id)?;
                Ok(RoleGrant {
                    role_id,
                    permission_id: pair.permission_id,
                    permission_name: permission.name,
                    resource_id: pair.resource_id,
                    resource_name: resource.name,
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        grants.sort_by(|left, right| {
            left.resource_name
                .cmp(&right.resource_name)
                .then_with(|| left.permission_name.cmp(&right.permission_name))
        });
        Ok(grants)
    }

    pub(super) fn clear_role_grants(
        &mut self,
        role_id: RoleId,
        expected_priority: Priority,
    ) -> AppResult<u64> {
        self.role_at(role_id, expected_priority)?;

        let before = self.role_permissions.len();
        self.role_permissions
            .retain(|(stored_role_id, _)| *stored_role_id != role_id);
        Ok((before - self.role_permissions.len()) as u64)
    }

    pub(super) fn replace_role_grants(
        &mut self,
        role_id: RoleId,
        expected_priority: Priority,
        grants: Vec<RoleGrantInput>,
        armed: Option<InMemoryFailPoint>,
    ) -> AppResult<Vec<RoleGrant>> {
        self.clear_role_grants(role_id, expected_priority)?;
        trip(armed, InMemoryFailPoint::RoleGrantReplaceAfterClear)?;

        for grant in grants {
            let pair_id = self
                .pair_id(grant.permission_id, grant.resource_id)
                .ok_or_else(|| {
                    AppError::NotFound(format!(
                        "permission '{}' is not linked to resource '{}'",
                        grant.permission_id, grant.resource_id
                    ))
                })?;
            self.role_permissions.insert((role_id, pair_id));
        }

        self.role_grants(role_id)
    }

    pub(super) fn bootstrap_super_admin(
        &mut self,
        user_id: UserId,
        grants: &[PermissionGrant],
    ) -> AppResult<RoleDefinition> {
        if !self.users.contains_key(&user_id) {
            return Err(AppError::NotFound(format!("user '{user_id}' was not found")));
        }

        let role = match self.role_named(SUPER_ADMIN_ROLE_NAME) {
            Some(role) => role,
            None => self.create_role(NewRole {
                name: RoleName::new(SUPER_ADMIN_ROLE_NAME)?,
                priority: Priority::new(SUPER_ADMIN_PRIORITY)?,
                created_by: None,
            })?,
        };

        for grant in grants {
            let resource_id = match self.resource_id_named(grant.resource()) {
                Some(resource_id) => resource_id,
                None => {
                    self.create_resource(ResourceName::new(grant.resource())?)?
                        .resource_id
                }
            };
            let permission_id = match self.permission_id_named(grant.action()) {
                Some(permission_id) => permission_id,
                None => {
                    self.create_permission(NewPermission {
                        name: PermissionName::new(grant.action())?,
                        resource_ids: Vec::new(),
                    })?
                    .permission_id
                }
            };

            self.link(permission_id, resource_id)?;
            if let Some(pair_id) = self.pair_id(permission_id, resource_id) {
                self.role_permissions.insert((role.role_id, pair_id));
            }
        }

        let now = Utc::now();
        let key = (user_id, role.role_id);
        let created_at = self
            .user_roles
            .get(&key)
            .filter(|assignment| is_assignment_active(assignment.expires_at, now))
            .map_or(now, |assignment| assignment.created_at);
        self.user_roles.insert(
            key,
            StoredAssignment {
                assigned_by: None,
                expires_at: None,
                created_at,
            },
        );

        Ok(role)
    }
}
