use async_trait::async_trait;
use chrono::{DateTime, Utc};

use atelier_core::{AppResult, UserId};
use atelier_domain::{
    PermissionGrant, PermissionId, PermissionName, Priority, ResourceId, ResourceName, RoleId,
};

use super::inputs::{NewPermission, NewRole, NewRoleAssignment, RoleChanges, RoleGrantInput};
use super::projections::{
    PermissionDefinition, PermissionDeletion, ResourceDefinition, ResourceReplacement,
    RoleDefinition, RoleGrant, RoleOverview, UserAccount, UserRoleAssignment,
};

/// Read port backing the priority and permission resolvers.
///
/// Implementations never open transactions; store failures surface as
/// errors and must be treated as indeterminate by callers.
#[async_trait]
pub trait AuthorizationRepository: Send + Sync {
    /// Lists priorities of the roles actively assigned to a user at `as_of`.
    async fn list_active_role_priorities(
        &self,
        user_id: UserId,
        as_of: DateTime<Utc>,
    ) -> AppResult<Vec<Priority>>;

    /// Lists the `(action, resource)` pairs granted through active roles.
    async fn list_permission_grants_for_user(
        &self,
        user_id: UserId,
        as_of: DateTime<Utc>,
    ) -> AppResult<Vec<PermissionGrant>>;

    /// Returns whether an active role grants `action` on `resource`.
    async fn user_has_permission_grant(
        &self,
        user_id: UserId,
        action: &str,
        resource: &str,
        as_of: DateTime<Utc>,
    ) -> AppResult<bool>;
}

/// Store port for role, permission, resource and assignment administration.
///
/// Every mutating method runs in a single store transaction and leaves no
/// visible change when it returns an error.
#[async_trait]
pub trait AccessAdminRepository: Send + Sync {
    /// Finds a user in the identity store.
    async fn find_user(&self, user_id: UserId) -> AppResult<Option<UserAccount>>;

    /// Lists roles ordered by priority then name.
    async fn list_roles(&self, as_of: DateTime<Utc>) -> AppResult<Vec<RoleOverview>>;

    /// Finds a role by id.
    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<RoleDefinition>>;

    /// Finds a role by exact name.
    async fn find_role_by_name(&self, name: &str) -> AppResult<Option<RoleDefinition>>;

    /// Inserts a role.
    async fn create_role(&self, role: NewRole) -> AppResult<RoleDefinition>;

    /// Updates a role whose priority still equals `changes.expected_priority`.
    async fn update_role(
        &self,
        role_id: RoleId,
        changes: RoleChanges,
    ) -> AppResult<RoleDefinition>;

    /// Deletes a role without dependents whose priority still equals
    /// `expected_priority`.
    async fn delete_role(
        &self,
        role_id: RoleId,
        expected_priority: Priority,
    ) -> AppResult<RoleDefinition>;

    /// Lists permissions ordered by name.
    async fn list_permissions(&self) -> AppResult<Vec<PermissionDefinition>>;

    /// Finds a permission by id.
    async fn find_permission(
        &self,
        permission_id: PermissionId,
    ) -> AppResult<Option<PermissionDefinition>>;

    /// Finds a permission by exact name.
    async fn find_permission_by_name(
        &self,
        name: &str,
    ) -> AppResult<Option<PermissionDefinition>>;

    /// Inserts a permission together with its initial resource pairs.
    async fn create_permission(
        &self,
        permission: NewPermission,
    ) -> AppResult<PermissionDefinition>;

    /// Renames a permission.
    async fn rename_permission(
        &self,
        permission_id: PermissionId,
        name: PermissionName,
    ) -> AppResult<PermissionDefinition>;

    /// Deletes role grants, then resource pairs, then the permission.
    async fn delete_permission(
        &self,
        permission_id: PermissionId,
    ) -> AppResult<PermissionDeletion>;

    /// Replaces the resource set of a permission.
    async fn replace_permission_resources(
        &self,
        permission_id: PermissionId,
        resource_ids: Vec<ResourceId>,
    ) -> AppResult<ResourceReplacement>;

    /// Lists resources ordered by name.
    async fn list_resources(&self) -> AppResult<Vec<ResourceDefinition>>;

    /// Finds a resource by id.
    async fn find_resource(
        &self,
        resource_id: ResourceId,
    ) -> AppResult<Option<ResourceDefinition>>;

    /// Finds a resource by name, ignoring case.
    async fn find_resource_by_name(&self, name: &str) -> AppResult<Option<ResourceDefinition>>;

    /// Inserts a resource.
    async fn create_resource(&self, name: ResourceName) -> AppResult<ResourceDefinition>;

    /// Renames a resource.
    async fn rename_resource(
        &self,
        resource_id: ResourceId,
        name: ResourceName,
    ) -> AppResult<ResourceDefinition>;

    /// Deletes a resource without linked permissions.
    async fn delete_resource(&self, resource_id: ResourceId) -> AppResult<ResourceDefinition>;

    /// Lists the grants of a role ordered by resource then permission.
    async fn list_role_grants(&self, role_id: RoleId) -> AppResult<Vec<RoleGrant>>;

    /// Replaces every grant of a role whose priority still equals
    /// `expected_priority`.
    async fn replace_role_grants(
        &self,
        role_id: RoleId,
        expected_priority: Priority,
        grants: Vec<RoleGrantInput>,
    ) -> AppResult<Vec<RoleGrant>>;

    /// Removes every grant of a role whose priority still equals
    /// `expected_priority` and returns how many were removed.
    async fn clear_role_grants(
        &self,
        role_id: RoleId,
        expected_priority: Priority,
    ) -> AppResult<u64>;

    /// Lists every stored assignment of a user, active or not.
    async fn list_user_role_assignments(
        &self,
        user_id: UserId,
    ) -> AppResult<Vec<UserRoleAssignment>>;

    /// Finds an assignment of the pair that is active at `as_of`.
    async fn find_active_role_assignment(
        &self,
        user_id: UserId,
        role_id: RoleId,
        as_of: DateTime<Utc>,
    ) -> AppResult<Option<UserRoleAssignment>>;

    /// Inserts an assignment, replacing an expired row of the same pair.
    ///
    /// Fails with a conflict when an active assignment already exists or the
    /// role no longer has `assignment.expected_role_priority`.
    async fn insert_role_assignment(
        &self,
        assignment: NewRoleAssignment,
    ) -> AppResult<UserRoleAssignment>;

    /// Deletes the assignment of the pair while the role still has
    /// `expected_role_priority`.
    async fn delete_role_assignment(
        &self,
        user_id: UserId,
        role_id: RoleId,
        expected_role_priority: Priority,
    ) -> AppResult<()>;

    /// Ensures the `super_admin` role exists with `grants` and is held by the user.
    async fn bootstrap_super_admin(
        &self,
        user_id: UserId,
        grants: &[PermissionGrant],
    ) -> AppResult<RoleDefinition>;
}
