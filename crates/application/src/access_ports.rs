mod cache;
mod inputs;
mod projections;
mod repositories;

pub use cache::CacheInvalidator;
pub use inputs::{
    AssignRoleInput, CreatePermissionInput, CreateResourceInput, CreateRoleInput, NewPermission,
    NewRole, NewRoleAssignment, RoleChanges, RoleGrantInput, UpdatePermissionInput,
    UpdateResourceInput, UpdateRoleInput,
};
pub use projections::{
    PermissionDefinition, PermissionDeletion, ResourceDefinition, ResourceReference,
    ResourceReplacement, RoleDefinition, RoleGrant, RoleOverview, UserAccount,
    UserRoleAssignment,
};
pub use repositories::{AccessAdminRepository, AuthorizationRepository};
