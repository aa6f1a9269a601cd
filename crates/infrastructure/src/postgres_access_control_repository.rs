use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, Transaction};
use uuid::Uuid;

use atelier_application::{
    AccessAdminRepository, NewPermission, NewRole, NewRoleAssignment, PermissionDefinition,
    PermissionDeletion, ResourceDefinition, ResourceReference, ResourceReplacement, RoleChanges,
    RoleDefinition, RoleGrant, RoleGrantInput, RoleOverview, UserAccount, UserRoleAssignment,
};
use atelier_core::{AppError, AppResult, UserId};
use atelier_domain::{
    PermissionGrant, PermissionId, PermissionName, Priority, ResourceId, ResourceName, RoleId,
};

mod assignments;
mod authorization;
mod bootstrap;
mod permissions;
mod resources;
mod role_grants;
mod roles;
mod transactions;

#[cfg(test)]
mod tests;

use transactions::{begin, finish, map_store_error};

/// PostgreSQL-backed store for the access-control tables.
///
/// Implements both the read port used by the resolvers and the
/// transactional administration port.
#[derive(Clone)]
pub struct PostgresAccessControlRepository {
    pool: PgPool,
}

impl PostgresAccessControlRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    email_verified: bool,
}

#[derive(Debug, FromRow)]
struct RoleRow {
    id: i64,
    name: String,
    priority: i32,
    created_by: Option<Uuid>,
    updated_by: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct RoleOverviewRow {
    #[sqlx(flatten)]
    role: RoleRow,
    active_assignment_count: i64,
    grant_count: i64,
}

#[derive(Debug, FromRow)]
struct PermissionRow {
    id: i64,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct PermissionResourceRow {
    permission_id: i64,
    resource_id: i64,
    resource_name: String,
}

#[derive(Debug, FromRow)]
struct ResourceRow {
    id: i64,
    name: String,
    permission_count: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct RoleGrantRow {
    role_id: i64,
    permission_id: i64,
    permission_name: String,
    resource_id: i64,
    resource_name: String,
}

#[derive(Debug, FromRow)]
struct AssignmentRow {
    user_id: Uuid,
    role_id: i64,
    role_name: String,
    role_priority: i32,
    assigned_by: Option<Uuid>,
    expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

fn count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

fn user_account(row: UserRow) -> UserAccount {
    UserAccount {
        user_id: UserId::from_uuid(row.id),
        name: row.name,
        email: row.email,
        email_verified: row.email_verified,
    }
}

fn role_definition(row: RoleRow) -> AppResult<RoleDefinition> {
    Ok(RoleDefinition {
        role_id: RoleId::new(row.id)?,
        name: row.name,
        priority: Priority::new(row.priority).map_err(|error| {
            AppError::Internal(format!("stored role '{}' is invalid: {error}", row.id))
        })?,
        created_by: row.created_by.map(UserId::from_uuid),
        updated_by: row.updated_by.map(UserId::from_uuid),
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn permission_definition(
    row: PermissionRow,
    resource_rows: &[PermissionResourceRow],
) -> AppResult<PermissionDefinition> {
    let resources = resource_rows
        .iter()
        .filter(|resource| resource.permission_id == row.id)
        .map(|resource| {
            Ok(ResourceReference {
                resource_id: ResourceId::new(resource.resource_id)?,
                name: resource.resource_name.clone(),
            })
        })
        .collect::<AppResult<Vec<_>>>()?;

    Ok(PermissionDefinition {
        permission_id: PermissionId::new(row.id)?,
        name: row.name,
        resources,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn resource_definition(row: ResourceRow) -> AppResult<ResourceDefinition> {
    Ok(ResourceDefinition {
        resource_id: ResourceId::new(row.id)?,
        name: row.name,
        permission_count: count(row.permission_count),
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn role_grant(row: RoleGrantRow) -> AppResult<RoleGrant> {
    Ok(RoleGrant {
        role_id: RoleId::new(row.role_id)?,
        permission_id: PermissionId::new(row.permission_id)?,
        permission_name: row.permission_name,
        resource_id: ResourceId::new(row.resource_id)?,
        resource_name: row.resource_name,
    })
}

fn role_assignment(row: AssignmentRow) -> AppResult<UserRoleAssignment> {
    Ok(UserRoleAssignment {
        user_id: UserId::from_uuid(row.user_id),
        role_id: RoleId::new(row.role_id)?,
        role_name: row.role_name,
        role_priority: Priority::new(row.role_priority).map_err(|error| {
            AppError::Internal(format!("stored role '{}' is invalid: {error}", row.role_id))
        })?,
        assigned_by: row.assigned_by.map(UserId::from_uuid),
        expires_at: row.expires_at,
        created_at: row.created_at,
    })
}

#[async_trait]
impl AccessAdminRepository for PostgresAccessControlRepository {
    async fn find_user(&self, user_id: UserId) -> AppResult<Option<UserAccount>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, name, email, email_verified
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find user: {error}")))?;

        Ok(row.map(user_account))
    }

    async fn list_roles(&self, as_of: DateTime<Utc>) -> AppResult<Vec<RoleOverview>> {
        self.list_roles_impl(as_of).await
    }

    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<RoleDefinition>> {
        self.find_role_impl(role_id).await
    }

    async fn find_role_by_name(&self, name: &str) -> AppResult<Option<RoleDefinition>> {
        self.find_role_by_name_impl(name).await
    }

    async fn create_role(&self, role: NewRole) -> AppResult<RoleDefinition> {
        self.create_role_impl(role).await
    }

    async fn update_role(
        &self,
        role_id: RoleId,
        changes: RoleChanges,
    ) -> AppResult<RoleDefinition> {
        self.update_role_impl(role_id, changes).await
    }

    async fn delete_role(
        &self,
        role_id: RoleId,
        expected_priority: Priority,
    ) -> AppResult<RoleDefinition> {
        self.delete_role_impl(role_id, expected_priority).await
    }

    async fn list_permissions(&self) -> AppResult<Vec<PermissionDefinition>> {
        self.list_permissions_impl().await
    }

    async fn find_permission(
        &self,
        permission_id: PermissionId,
    ) -> AppResult<Option<PermissionDefinition>> {
        self.find_permission_impl(permission_id).await
    }

    async fn find_permission_by_name(
        &self,
        name: &str,
    ) -> AppResult<Option<PermissionDefinition>> {
        self.find_permission_by_name_impl(name).await
    }

    async fn create_permission(
        &self,
        permission: NewPermission,
    ) -> AppResult<PermissionDefinition> {
        self.create_permission_impl(permission).await
    }

    async fn rename_permission(
        &self,
        permission_id: PermissionId,
        name: PermissionName,
    ) -> AppResult<PermissionDefinition> {
        self.rename_permission_impl(permission_id, name).await
    }

    async fn delete_permission(
        &self,
        permission_id: PermissionId,
    ) -> AppResult<PermissionDeletion> {
        self.delete_permission_impl(permission_id).await
    }

    async fn replace_permission_resources(
        &self,
        permission_id: PermissionId,
        resource_ids: Vec<ResourceId>,
    ) -> AppResult<ResourceReplacement> {
        self.replace_permission_resources_impl(permission_id, resource_ids)
            .await
    }

    async fn list_resources(&self) -> AppResult<Vec<ResourceDefinition>> {
        self.list_resources_impl().await
    }

    async fn find_resource(
        &self,
        resource_id: ResourceId,
    ) -> AppResult<Option<ResourceDefinition>> {
        self.find_resource_impl(resource_id).await
    }

    async fn find_resource_by_name(&self, name: &str) -> AppResult<Option<ResourceDefinition>> {
        self.find_resource_by_name_impl(name).await
    }

    async fn create_resource(&self, name: ResourceName) -> AppResult<ResourceDefinition> {
        self.create_resource_impl(name).await
    }

    async fn rename_resource(
        &self,
        resource_id: ResourceId,
        name: ResourceName,
    ) -> AppResult<ResourceDefinition> {
        self.rename_resource_impl(resource_id, name).await
    }

    async fn delete_resource(&self, resource_id: ResourceId) -> AppResult<ResourceDefinition> {
        self.delete_resource_impl(resource_id).await
    }

    async fn list_role_grants(&self, role_id: RoleId) -> AppResult<Vec<RoleGrant>> {
        self.list_role_grants_impl(role_id).await
    }

    async fn replace_role_grants(
        &self,
        role_id: RoleId,
        expected_priority: Priority,
        grants: Vec<RoleGrantInput>,
    ) -> AppResult<Vec<RoleGrant>> {
        self.replace_role_grants_impl(role_id, expected_priority, grants)
            .await
    }

    async fn clear_role_grants(
        &self,
        role_id: RoleId,
        expected_priority: Priority,
    ) -> AppResult<u64> {
        self.clear_role_grants_impl(role_id, expected_priority).await
    }

    async fn list_user_role_assignments(
        &self,
        user_id: UserId,
    ) -> AppResult<Vec<UserRoleAssignment>> {
        self.list_user_role_assignments_impl(user_id).await
    }

    async fn find_active_role_assignment(
        &self,
        user_id: UserId,
        role_id: RoleId,
        as_of: DateTime<Utc>,
    ) -> AppResult<Option<UserRoleAssignment>> {
        self.find_active_role_assignment_impl(user_id, role_id, as_of)
            .await
    }

    async fn insert_role_assignment(
        &self,
        assignment: NewRoleAssignment,
    ) -> AppResult<UserRoleAssignment> {
        self.insert_role_assignment_impl(assignment).await
    }

    async fn delete_role_assignment(
        &self,
        user_id: UserId,
        role_id: RoleId,
        expected_role_priority: Priority,
    ) -> AppResult<()> {
        self.delete_role_assignment_impl(user_id, role_id, expected_role_priority)
            .await
    }

    async fn bootstrap_super_admin(
        &self,
        user_id: UserId,
        grants: &[PermissionGrant],
    ) -> AppResult<RoleDefinition> {
        self.bootstrap_super_admin_impl(user_id, grants).await
    }
}
