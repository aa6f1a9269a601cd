use super::*;

impl AccessControlState {
    pub(super) fn assignment(
        &self,
        user_id: UserId,
        role_id: RoleId,
    ) -> AppResult<Option<UserRoleAssignment>> {
        self.user_roles
            .get(&(user_id, role_id))
            .map(|assignment| self.assignment_projection(user_id, role_id, assignment))
            .transpose()
    }

    pub(super) fn assignments_for(&self, user_id: UserId) -> AppResult<Vec<UserRoleAssignment>> {
        let mut assignments = self
            .user_roles
            .iter()
            .filter(|((stored_user_id, _), _)| *stored_user_id == user_id)
            .map(|((_, role_id), assignment)| {
                self.assignment_projection(user_id, *role_id, assignment)
            })
            .collect::<AppResult<Vec<_>>>()?;

        assignments.sort_by(|left, right| {
            left.role_priority
                .cmp(&right.role_priority)
                .then_with(|| left.role_name.cmp(&right.role_name))
        });
        Ok(assignments)
    }

    pub(super) fn insert_assignment(
        &mut self,
        assignment: NewRoleAssignment,
    ) -> AppResult<UserRoleAssignment> {
        if !self.users.contains_key(&assignment.user_id) {
            return Err(AppError::NotFound(format!(
                "user '{}' was not found",
                assignment.user_id
            )));
        }
        self.role_at(assignment.role_id, assignment.expected_role_priority)?;

        let key = (assignment.user_id, assignment.role_id);
        if let Some(existing) = self.user_roles.get(&key) {
            if is_assignment_active(existing.expires_at, assignment.as_of) {
                return Err(AppError::Conflict(format!(
                    "role '{}' is already actively assigned to user '{}'",
                    assignment.role_id, assignment.user_id
                )));
            }
            self.user_roles.remove(&key);
        }

        let stored = StoredAssignment {
            assigned_by: assignment.assigned_by,
            expires_at: assignment.expires_at,
            created_at: assignment.as_of,
        };
        self.user_roles.insert(key, stored);

        self.assignment_projection(assignment.user_id, assignment.role_id, &stored)
    }

    pub(super) fn delete_assignment(
        &mut self,
        user_id: UserId,
        role_id: RoleId,
        expected_role_priority: Priority,
    ) -> AppResult<()> {
        self.role_at(role_id, expected_role_priority)?;
        if self.user_roles.remove(&(user_id, role_id)).is_none() {
            return Err(AppError::NotFound(format!(
                "role '{role_id}' is not assigned to user '{user_id}'"
            )));
        }

        Ok(())
    }

    fn assignment_projection(
        &self,
        user_id: UserId,
        role_id: RoleId,
        assignment: &StoredAssignment,
    ) -> AppResult<UserRoleAssignment> {
        let role = self.role(role_id)?;

        Ok(UserRoleAssignment {
            user_id,
            role_id,
            role_name: role.name,
            role_priority: role.priority,
            assigned_by: assignment.assigned_by,
            expires_at: assignment.expires_at,
            created_at: assignment.created_at,
        })
    }
}
