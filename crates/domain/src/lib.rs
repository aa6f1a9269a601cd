//! Domain types and invariants of the access-control core.

#![forbid(unsafe_code)]

mod access;
mod assignment;
mod cache;
mod grant;
mod priority;
mod security;

pub use access::{
    PermissionId, PermissionName, ResourceId, ResourceName, RoleId, RoleName,
    SUPER_ADMIN_PRIORITY, SUPER_ADMIN_ROLE_NAME, is_protected_role, same_resource_name,
};
pub use assignment::is_assignment_active;
pub use cache::CacheTag;
pub use grant::PermissionGrant;
pub use priority::{EffectivePriority, NO_ROLE_PRIORITY, Priority, can_grant, ensure_can_grant};
pub use security::AdminPermission;
