//! Application services and ports of the access-control core.

#![forbid(unsafe_code)]

mod access_admin_service;
mod access_ports;
mod authorization_service;
mod mutation;
mod role_assignment_service;

#[cfg(test)]
mod test_fakes;

pub use access_admin_service::AccessAdminService;
pub use access_ports::{
    AccessAdminRepository, AssignRoleInput, AuthorizationRepository, CacheInvalidator,
    CreatePermissionInput, CreateResourceInput, CreateRoleInput, NewPermission, NewRole,
    NewRoleAssignment, PermissionDefinition, PermissionDeletion, ResourceDefinition,
    ResourceReference, ResourceReplacement, RoleChanges, RoleDefinition, RoleGrant,
    RoleGrantInput, RoleOverview, UpdatePermissionInput, UpdateResourceInput, UpdateRoleInput,
    UserAccount, UserRoleAssignment,
};
pub use authorization_service::AuthorizationService;
pub use mutation::MutationOutcome;
pub use role_assignment_service::{RoleAssignmentRequest, RoleAssignmentService};
