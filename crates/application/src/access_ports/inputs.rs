use chrono::{DateTime, Utc};

use atelier_core::UserId;
use atelier_domain::{PermissionId, PermissionName, Priority, ResourceId, RoleId, RoleName};

/// Input payload for creating roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRoleInput {
    /// Unique role name.
    pub name: String,
    /// Requested priority; must be positive.
    pub priority: i32,
}

/// Input payload for updating roles. Omitted fields stay unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UpdateRoleInput {
    /// New role name.
    pub name: Option<String>,
    /// New role priority.
    pub priority: Option<i32>,
}

/// Input payload for creating permissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePermissionInput {
    /// Unique permission name.
    pub name: String,
    /// Resources the permission applies to from the start.
    pub resource_ids: Vec<ResourceId>,
}

/// Input payload for renaming permissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePermissionInput {
    /// New permission name.
    pub name: String,
}

/// Input payload for creating resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateResourceInput {
    /// Unique resource name.
    pub name: String,
}

/// Input payload for renaming resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateResourceInput {
    /// New resource name.
    pub name: String,
}

/// Input payload for assigning a role to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignRoleInput {
    /// User receiving the role.
    pub user_id: UserId,
    /// Role being assigned.
    pub role_id: RoleId,
    /// Optional expiry; `None` never expires.
    pub expires_at: Option<DateTime<Utc>>,
}

/// One `(permission, resource)` pair granted to a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RoleGrantInput {
    /// Permission identifier.
    pub permission_id: PermissionId,
    /// Resource identifier.
    pub resource_id: ResourceId,
}

/// Validated role insert handed to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRole {
    /// Role name.
    pub name: RoleName,
    /// Role priority.
    pub priority: Priority,
    /// Creating user.
    pub created_by: Option<UserId>,
}

/// Validated role update handed to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleChanges {
    /// New name, when changing.
    pub name: Option<RoleName>,
    /// New priority, when changing.
    pub priority: Option<Priority>,
    /// Priority the hierarchy guard was evaluated against.
    ///
    /// The store refuses the update if the role moved in the meantime.
    pub expected_priority: Priority,
    /// Updating user.
    pub updated_by: UserId,
}

/// Validated permission insert handed to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPermission {
    /// Permission name.
    pub name: PermissionName,
    /// Initial resources, de-duplicated.
    pub resource_ids: Vec<ResourceId>,
}

/// Validated assignment insert handed to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRoleAssignment {
    /// User receiving the role.
    pub user_id: UserId,
    /// Role being assigned.
    pub role_id: RoleId,
    /// Assigning user; `None` for system bootstrap.
    pub assigned_by: Option<UserId>,
    /// Optional expiry.
    pub expires_at: Option<DateTime<Utc>>,
    /// Role priority the hierarchy guard was evaluated against.
    pub expected_role_priority: Priority,
    /// Instant activity is evaluated at.
    pub as_of: DateTime<Utc>,
}
