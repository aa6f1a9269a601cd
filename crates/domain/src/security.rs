use serde::{Deserialize, Serialize};

use crate::PermissionGrant;

/// Built-in permissions gating the administrative mutation surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminPermission {
    /// Allows listing roles and their grants.
    RoleRead,
    /// Allows creating roles.
    RoleCreate,
    /// Allows renaming, re-prioritising and re-granting roles.
    RoleUpdate,
    /// Allows deleting roles.
    RoleDelete,
    /// Allows listing permissions.
    PermissionRead,
    /// Allows creating permissions.
    PermissionCreate,
    /// Allows renaming permissions and changing their resources.
    PermissionUpdate,
    /// Allows deleting permissions.
    PermissionDelete,
    /// Allows listing resources.
    ResourceRead,
    /// Allows creating resources.
    ResourceCreate,
    /// Allows renaming resources.
    ResourceUpdate,
    /// Allows deleting resources.
    ResourceDelete,
    /// Allows listing a user's role assignments.
    UserRoleRead,
    /// Allows assigning roles to users.
    UserRoleAssign,
    /// Allows removing roles from users.
    UserRoleRemove,
}

impl AdminPermission {
    /// Returns the resource this permission protects.
    #[must_use]
    pub fn resource(&self) -> &'static str {
        match self {
            Self::RoleRead | Self::RoleCreate | Self::RoleUpdate | Self::RoleDelete => "roles",
            Self::PermissionRead
            | Self::PermissionCreate
            | Self::PermissionUpdate
            | Self::PermissionDelete => "permissions",
            Self::ResourceRead
            | Self::ResourceCreate
            | Self::ResourceUpdate
            | Self::ResourceDelete => "resources",
            Self::UserRoleRead | Self::UserRoleAssign | Self::UserRoleRemove => "users",
        }
    }

    /// Returns the action name checked on the resource.
    #[must_use]
    pub fn action(&self) -> &'static str {
        match self {
            Self::RoleRead | Self::PermissionRead | Self::ResourceRead => "read",
            Self::RoleCreate | Self::PermissionCreate | Self::ResourceCreate => "create",
            Self::RoleUpdate | Self::PermissionUpdate | Self::ResourceUpdate => "update",
            Self::RoleDelete | Self::PermissionDelete | Self::ResourceDelete => "delete",
            Self::UserRoleRead => "read_roles",
            Self::UserRoleAssign => "assign_role",
            Self::UserRoleRemove => "remove_role",
        }
    }

    /// Returns the structured grant for this permission.
    #[must_use]
    pub fn grant(&self) -> PermissionGrant {
        PermissionGrant::from_parts(self.action(), self.resource())
    }

    /// Returns the legacy combined `resource.action` value.
    #[must_use]
    pub fn as_legacy_name(&self) -> String {
        format!("{}.{}", self.resource(), self.action())
    }

    /// Returns all built-in permissions.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[AdminPermission] = &[
            AdminPermission::RoleRead,
            AdminPermission::RoleCreate,
            AdminPermission::RoleUpdate,
            AdminPermission::RoleDelete,
            AdminPermission::PermissionRead,
            AdminPermission::PermissionCreate,
            AdminPermission::PermissionUpdate,
            AdminPermission::PermissionDelete,
            AdminPermission::ResourceRead,
            AdminPermission::ResourceCreate,
            AdminPermission::ResourceUpdate,
            AdminPermission::ResourceDelete,
            AdminPermission::UserRoleRead,
            AdminPermission::UserRoleAssign,
            AdminPermission::UserRoleRemove,
        ];

        ALL
    }
}
