use super::*;

use atelier_domain::{SUPER_ADMIN_PRIORITY, SUPER_ADMIN_ROLE_NAME};

use super::assignments::discard_expired_assignment;

impl PostgresAccessControlRepository {
    pub(super) async fn bootstrap_super_admin_impl(
        &self,
        user_id: UserId,
        grants: &[PermissionGrant],
    ) -> AppResult<RoleDefinition> {
        let mut transaction = begin(&self.pool).await?;
        let result = ensure_super_admin(&mut transaction, user_id, grants).await;
        finish(transaction, result).await
    }
}

async fn ensure_super_admin(
    connection: &mut PgConnection,
    user_id: UserId,
    grants: &[PermissionGrant],
) -> AppResult<RoleDefinition> {
    sqlx::query(
        r#"
        INSERT INTO roles (name, priority)
        VALUES ($1, $2)
        ON CONFLICT (name) DO NOTHING
        "#,
    )
    .bind(SUPER_ADMIN_ROLE_NAME)
    .bind(SUPER_ADMIN_PRIORITY)
    .execute(&mut *connection)
    .await
    .map_err(|error| map_store_error(error, "create super admin role"))?;

    let role = sqlx::query_as::<_, RoleRow>(
        r#"
        SELECT id, name, priority, created_by, updated_by, created_at, updated_at
        FROM roles
        WHERE name = $1
        FOR UPDATE
        "#,
    )
    .bind(SUPER_ADMIN_ROLE_NAME)
    .fetch_one(&mut *connection)
    .await
    .map_err(|error| AppError::Internal(format!("failed to load super admin role: {error}")))?;
    let role = role_definition(role)?;

    for grant in grants {
        let resource_permission_id = ensure_grant_pair(connection, grant).await?;

        sqlx::query(
            r#"
            INSERT INTO role_permissions (role_id, resource_permission_id)
            VALUES ($1, $2)
            ON CONFLICT (role_id, resource_permission_id) DO NOTHING
            "#,
        )
        .bind(role.role_id.value())
        .bind(resource_permission_id)
        .execute(&mut *connection)
        .await
        .map_err(|error| map_store_error(error, "grant super admin permission"))?;
    }

    discard_expired_assignment(connection, user_id, role.role_id, Utc::now()).await?;

    sqlx::query(
        r#"
        INSERT INTO user_roles (user_id, role_id)
        VALUES ($1, $2)
        ON CONFLICT (user_id, role_id)
        DO UPDATE SET expires_at = NULL, assigned_by = NULL
        "#,
    )
    .bind(user_id.as_uuid())
    .bind(role.role_id.value())
    .execute(&mut *connection)
    .await
    .map_err(|error| map_store_error(error, "assign super admin role"))?;

    Ok(role)
}

async fn ensure_grant_pair(connection: &mut PgConnection, grant: &PermissionGrant) -> AppResult<i64> {
    sqlx::query("INSERT INTO resources (name) VALUES ($1) ON CONFLICT DO NOTHING")
        .bind(grant.resource())
        .execute(&mut *connection)
        .await
        .map_err(|error| map_store_error(error, "create resource"))?;

    let resource_id =
        sqlx::query_scalar::<_, i64>("SELECT id FROM resources WHERE lower(name) = lower($1)")
            .bind(grant.resource())
            .fetch_one(&mut *connection)
            .await
            .map_err(|error| AppError::Internal(format!("failed to load resource: {error}")))?;

    sqlx::query("INSERT INTO permissions (name) VALUES ($1) ON CONFLICT (name) DO NOTHING")
        .bind(grant.action())
        .execute(&mut *connection)
        .await
        .map_err(|error| map_store_error(error, "create permission"))?;

    let permission_id =
        sqlx::query_scalar::<_, i64>("SELECT id FROM permissions WHERE name = $1")
            .bind(grant.action())
            .fetch_one(&mut *connection)
            .await
            .map_err(|error| AppError::Internal(format!("failed to load permission: {error}")))?;

    sqlx::query(
        r#"
        INSERT INTO resource_permissions (resource_id, permission_id)
        VALUES ($1, $2)
        ON CONFLICT (resource_id, permission_id) DO NOTHING
        "#,
    )
    .bind(resource_id)
    .bind(permission_id)
    .execute(&mut *connection)
    .await
    .map_err(|error| map_store_error(error, "link resource to permission"))?;

    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT id
        FROM resource_permissions
        WHERE resource_id = $1
            AND permission_id = $2
        "#,
    )
    .bind(resource_id)
    .bind(permission_id)
    .fetch_one(&mut *connection)
    .await
    .map_err(|error| AppError::Internal(format!("failed to load resource pair: {error}")))
}
