use chrono::{DateTime, Utc};
use serde::Serialize;

use atelier_core::UserId;
use atelier_domain::{PermissionId, Priority, ResourceId, RoleId, is_assignment_active};

/// User record read from the external identity store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserAccount {
    /// Stable user identifier.
    pub user_id: UserId,
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
    /// Whether the identity system verified the email.
    pub email_verified: bool,
}

/// Role definition returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleDefinition {
    /// Stable role identifier.
    pub role_id: RoleId,
    /// Unique role name.
    pub name: String,
    /// Role priority; lower is more privileged.
    pub priority: Priority,
    /// User who created the role, when known.
    pub created_by: Option<UserId>,
    /// User who last updated the role, when known.
    pub updated_by: Option<UserId>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Role listing row with usage counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleOverview {
    /// Role definition.
    pub role: RoleDefinition,
    /// Assignments active at listing time.
    pub active_assignment_count: u64,
    /// Role-permission grants attached to the role.
    pub grant_count: u64,
}

/// Resource linked to a permission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceReference {
    /// Resource identifier.
    pub resource_id: ResourceId,
    /// Resource name.
    pub name: String,
}

/// Permission definition returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionDefinition {
    /// Stable permission identifier.
    pub permission_id: PermissionId,
    /// Unique permission name.
    pub name: String,
    /// Resources the permission applies to, ordered by name.
    pub resources: Vec<ResourceReference>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Resource definition returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceDefinition {
    /// Stable resource identifier.
    pub resource_id: ResourceId,
    /// Unique resource name.
    pub name: String,
    /// Number of permissions linked to the resource.
    pub permission_count: u64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Result of a permission delete cascade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionDeletion {
    /// Deleted permission identifier.
    pub permission_id: PermissionId,
    /// Deleted permission name.
    pub name: String,
    /// Resource-permission pairs removed.
    pub removed_resource_permissions: u64,
    /// Role grants removed with those pairs.
    pub removed_role_permissions: u64,
}

/// Result of replacing a permission's resource set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceReplacement {
    /// Permission after the replacement.
    pub permission: PermissionDefinition,
    /// Pairs inserted.
    pub added: u64,
    /// Pairs removed.
    pub removed: u64,
    /// Role grants removed with the removed pairs.
    pub removed_role_permissions: u64,
}

/// Role grant scoped to one resource-permission pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct RoleGrant {
    /// Granted role.
    pub role_id: RoleId,
    /// Granted permission.
    pub permission_id: PermissionId,
    /// Permission name.
    pub permission_name: String,
    /// Resource the grant is scoped to.
    pub resource_id: ResourceId,
    /// Resource name.
    pub resource_name: String,
}

/// Stored assignment of a role to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRoleAssignment {
    /// Assigned user.
    pub user_id: UserId,
    /// Assigned role.
    pub role_id: RoleId,
    /// Role name.
    pub role_name: String,
    /// Role priority.
    pub role_priority: Priority,
    /// Assigning user; `None` for system bootstrap.
    pub assigned_by: Option<UserId>,
    /// Expiry; `None` never expires.
    pub expires_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl UserRoleAssignment {
    /// Returns whether the assignment counts at `as_of`.
    #[must_use]
    pub fn is_active_at(&self, as_of: DateTime<Utc>) -> bool {
        is_assignment_active(self.expires_at, as_of)
    }
}
