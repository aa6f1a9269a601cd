use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};

use atelier_application::{
    AccessAdminRepository, AuthorizationRepository, NewPermission, NewRole, NewRoleAssignment,
    PermissionDefinition, PermissionDeletion, ResourceDefinition, ResourceReference,
    ResourceReplacement, RoleChanges, RoleDefinition, RoleGrant, RoleGrantInput, RoleOverview,
    UserAccount, UserRoleAssignment,
};
use atelier_core::{AppError, AppResult, UserId};
use atelier_domain::{
    PermissionGrant, PermissionId, PermissionName, Priority, ResourceId, ResourceName, RoleId,
    RoleName, SUPER_ADMIN_PRIORITY, SUPER_ADMIN_ROLE_NAME, is_assignment_active,
    same_resource_name,
};

mod assignments;
mod catalog;
mod grants;
mod state;


/// Step inside a multi-row mutation where a failure can be injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InMemoryFailPoint {
    /// After a deleted permission's role grants were removed.
    PermissionCascadeAfterRoleGrants,
    /// After a deleted permission's resource pairs were removed.
    PermissionCascadeAfterResourcePairs,
    /// After stale pairs were removed while replacing a permission's resources.
    ResourceReplaceAfterRemoval,
    /// After a role's grants were cleared while replacing them.
    RoleGrantReplaceAfterClear,
}

#[derive(Debug, Clone)]
struct StoredRole {
    name: String,
    priority: Priority,
    created_by: Option<UserId>,
    updated_by: Option<UserId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct StoredName {
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
struct StoredPair {
    resource_id: ResourceId,
    permission_id: PermissionId,
}

#[derive(Debug, Clone, Copy)]
struct StoredAssignment {
    assigned_by: Option<UserId>,
    expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
struct AccessControlState {
    users: BTreeMap<UserId, UserAccount>,
    roles: BTreeMap<RoleId, StoredRole>,
    permissions: BTreeMap<PermissionId, StoredName>,
    resources: BTreeMap<ResourceId, StoredName>,
    resource_permissions: BTreeMap<i64, StoredPair>,
    role_permissions: BTreeSet<(RoleId, i64)>,
    user_roles: BTreeMap<(UserId, RoleId), StoredAssignment>,
    next_id: i64,
}

/// In-memory access-control store.
///
/// Mutations run against a private copy of the state that replaces the
/// shared one only when the whole mutation succeeds.
#[derive(Debug, Default)]
pub struct InMemoryAccessControlRepository {
    state: RwLock<AccessControlState>,
    fail_point: Mutex<Option<InMemoryFailPoint>>,
}

impl InMemoryAccessControlRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user owned by the identity system.
    pub async fn insert_user(&self, user: UserAccount) {
        self.state.write().await.users.insert(user.user_id, user);
    }

    /// Makes every later mutation that reaches `point` fail.
    pub async fn arm_fail_point(&self, point: InMemoryFailPoint) {
        *self.fail_point.lock().await = Some(point);
    }

    /// Clears the armed fail point.
    pub async fn disarm_fail_point(&self) {
        *self.fail_point.lock().await = None;
    }

    async fn read<T>(&self, reader: impl FnOnce(&AccessControlState) -> T) -> T {
        reader(&*self.state.read().await)
    }

    async fn transact<T>(
        &self,
        mutation: impl FnOnce(&mut AccessControlState, Option<InMemoryFailPoint>) -> AppResult<T>,
    ) -> AppResult<T> {
        let armed = *self.fail_point.lock().await;
        let mut state = self.state.write().await;
        let mut draft = state.clone();

        let value = mutation(&mut draft, armed)?;
        *state = draft;

        Ok(value)
    }
}

fn trip(armed: Option<InMemoryFailPoint>, point: InMemoryFailPoint) -> AppResult<()> {
    if armed == Some(point) {
        return Err(AppError::Internal(format!(
            "injected store failure at {point:?}"
        )));
    }

    Ok(())
}

#[async_trait]
impl AuthorizationRepository for InMemoryAccessControlRepository {
    async fn list_active_role_priorities(
        &self,
        user_id: UserId,
        as_of: DateTime<Utc>,
    ) -> AppResult<Vec<Priority>> {
        Ok(self
            .read(|state| {
                state
                    .active_role_ids(user_id, as_of)
                    .filter_map(|role_id| state.roles.get(&role_id).map(|role| role.priority))
                    .collect()
            })
            .await)
    }

    async fn list_permission_grants_for_user(
        &self,
        user_id: UserId,
        as_of: DateTime<Utc>,
    ) -> AppResult<Vec<PermissionGrant>> {
        self.read(|state| state.grants_for(user_id, as_of)).await
    }

    async fn user_has_permission_grant(
        &self,
        user_id: UserId,
        action: &str,
        resource: &str,
        as_of: DateTime<Utc>,
    ) -> AppResult<bool> {
        let grants = self.read(|state| state.grants_for(user_id, as_of)).await?;
        Ok(grants.iter().any(|grant| grant.matches(action, resource)))
    }
}

#[async_trait]
impl AccessAdminRepository for InMemoryAccessControlRepository {
    async fn find_user(&self, user_id: UserId) -> AppResult<Option<UserAccount>> {
        Ok(self.read(|state| state.users.get(&user_id).cloned()).await)
    }

    async fn list_roles(&self, as_of: DateTime<Utc>) -> AppResult<Vec<RoleOverview>> {
        self.read(|state| state.list_roles(as_of)).await
    }

    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<RoleDefinition>> {
        Ok(self.read(|state| state.role(role_id).ok()).await)
    }

    async fn find_role_by_name(&self, name: &str) -> AppResult<Option<RoleDefinition>> {
        Ok(self.read(|state| state.role_named(name)).await)
    }

    async fn create_role(&self, role: NewRole) -> AppResult<RoleDefinition> {
        self.transact(|state, _| state.create_role(role)).await
    }

    async fn update_role(
        &self,
        role_id: RoleId,
        changes: RoleChanges,
    ) -> AppResult<RoleDefinition> {
        self.transact(|state, _| state.update_role(role_id, changes))
            .await
    }

    async fn delete_role(
        &self,
        role_id: RoleId,
        expected_priority: Priority,
    ) -> AppResult<RoleDefinition> {
        self.transact(|state, _| state.delete_role(role_id, expected_priority))
            .await
    }

    async fn list_permissions(&self) -> AppResult<Vec<PermissionDefinition>> {
        self.read(|state| {
            let mut permissions = state
                .permissions
                .keys()
                .map(|permission_id| state.permission(*permission_id))
                .collect::<AppResult<Vec<_>>>()?;
            permissions.sort_by(|left, right| left.name.cmp(&right.name));
            Ok(permissions)
        })
        .await
    }

    async fn find_permission(
        &self,
        permission_id: PermissionId,
    ) -> AppResult<Option<PermissionDefinition>> {
        Ok(self.read(|state| state.permission(permission_id).ok()).await)
    }

    async fn find_permission_by_name(
        &self,
        name: &str,
    ) -> AppResult<Option<PermissionDefinition>> {
        Ok(self
            .read(|state| {
                state
                    .permission_id_named(name)
                    .and_then(|permission_id| state.permission(permission_id).ok())
            })
            .await)
    }

    async fn create_permission(
        &self,
        permission: NewPermission,
    ) -> AppResult<PermissionDefinition> {
        self.transact(|state, _| state.create_permission(permission))
            .await
    }

    async fn rename_permission(
        &self,
        permission_id: PermissionId,
        name: PermissionName,
    ) -> AppResult<PermissionDefinition> {
        self.transact(|state, _| state.rename_permission(permission_id, name))
            .await
    }

    async fn delete_permission(
        &self,
        permission_id: PermissionId,
    ) -> AppResult<PermissionDeletion> {
        self.transact(|state, armed| state.delete_permission(permission_id, armed))
            .await
    }

    async fn replace_permission_resources(
        &self,
        permission_id: PermissionId,
        resource_ids: Vec<ResourceId>,
    ) -> AppResult<ResourceReplacement> {
        self.transact(|state, armed| {
            state.replace_permission_resources(permission_id, resource_ids, armed)
        })
        .await
    }

    async fn list_resources(&self) -> AppResult<Vec<ResourceDefinition>> {
        self.read(|state| {
            let mut resources = state
                .resources
                .keys()
                .map(|resource_id| state.resource(*resource_id))
                .collect::<AppResult<Vec<_>>>()?;
            resources.sort_by(|left, right| left.name.cmp(&right.name));
            Ok(resources)
        })
        .await
    }

    async fn find_resource(
        &self,
        resource_id: ResourceId,
    ) -> AppResult<Option<ResourceDefinition>> {
        Ok(self.read(|state| state.resource(resource_id).ok()).await)
    }

    async fn find_resource_by_name(&self, name: &str) -> AppResult<Option<ResourceDefinition>> {
        Ok(self
            .read(|state| {
                state
                    .resource_id_named(name)
                    .and_then(|resource_id| state.resource(resource_id).ok())
            })
            .await)
    }

    async fn create_resource(&self, name: ResourceName) -> AppResult<ResourceDefinition> {
        self.transact(|state, _| state.create_resource(name)).await
    }

    async fn rename_resource(
        &self,
        resource_id: ResourceId,
        name: ResourceName,
    ) -> AppResult<ResourceDefinition> {
        self.transact(|state, _| state.rename_resource(resource_id, name))
            .await
    }

    async fn delete_resource(&self, resource_id: ResourceId) -> AppResult<ResourceDefinition> {
        self.transact(|state, _| state.delete_resource(resource_id))
            .await
    }

    async fn list_role_grants(&self, role_id: RoleId) -> AppResult<Vec<RoleGrant>> {
        self.read(|state| {
            state.role(role_id)?;
            state.role_grants(role_id)
        })
        .await
    }

    async fn replace_role_grants(
        &self,
        role_id: RoleId,
        expected_priority: Priority,
        grants: Vec<RoleGrantInput>,
    ) -> AppResult<Vec<RoleGrant>> {
        self.transact(|state, armed| {
            state.replace_role_grants(role_id, expected_priority, grants, armed)
        })
        .await
    }

    async fn clear_role_grants(
        &self,
        role_id: RoleId,
        expected_priority: Priority,
    ) -> AppResult<u64> {
        self.transact(|state, _| state.clear_role_grants(role_id, expected_priority))
            .await
    }

    async fn list_user_role_assignments(
        &self,
        user_id: UserId,
    ) -> AppResult<Vec<UserRoleAssignment>> {
        self.read(|state| state.assignments_for(user_id)).await
    }

    async fn find_active_role_assignment(
        &self,
        user_id: UserId,
        role_id: RoleId,
        as_of: DateTime<Utc>,
    ) -> AppResult<Option<UserRoleAssignment>> {
        let assignment = self.read(|state| state.assignment(user_id, role_id)).await?;
        Ok(assignment.filter(|assignment| assignment.is_active_at(as_of)))
    }

    async fn insert_role_assignment(
        &self,
        assignment: NewRoleAssignment,
    ) -> AppResult<UserRoleAssignment> {
        self.transact(|state, _| state.insert_assignment(assignment))
            .await
    }

    async fn delete_role_assignment(
        &self,
        user_id: UserId,
        role_id: RoleId,
        expected_role_priority: Priority,
    ) -> AppResult<()> {
        self.transact(|state, _| {
            state.delete_assignment(user_id, role_id, expected_role_priority)
        })
        .await
    }

    async fn bootstrap_super_admin(
        &self,
        user_id: UserId,
        grants: &[PermissionGrant],
    ) -> AppResult<RoleDefinition> {
        self.transact(|state, _| state.bootstrap_super_admin(user_id, grants))
            .await
    }
}
