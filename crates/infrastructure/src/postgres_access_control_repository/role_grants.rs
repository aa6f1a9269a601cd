use super::*;

use super::roles::lock_role_at;

impl PostgresAccessControlRepository {
    pub(super) async fn list_role_grants_impl(&self, role_id: RoleId) -> AppResult<Vec<RoleGrant>> {
        let mut connection = self.pool.acquire().await.map_err(|error| {
            AppError::Internal(format!("failed to acquire connection: {error}"))
        })?;

        fetch_role_grants(&mut connection, role_id).await
    }

    pub(super) async fn replace_role_grants_impl(
        &self,
        role_id: RoleId,
        expected_priority: Priority,
        grants: Vec<RoleGrantInput>,
    ) -> AppResult<Vec<RoleGrant>> {
        let mut transaction = begin(&self.pool).await?;
        let result = replace_grants(&mut transaction, role_id, expected_priority, grants).await;
        finish(transaction, result).await
    }

    pub(super) async fn clear_role_grants_impl(
        &self,
        role_id: RoleId,
        expected_priority: Priority,
    ) -> AppResult<u64> {
        let mut transaction = begin(&self.pool).await?;
        let result = clear_grants(&mut transaction, role_id, expected_priority).await;
        finish(transaction, result).await
    }
}

async fn fetch_role_grants(
    connection: &mut PgConnection,
    role_id: RoleId,
) -> AppResult<Vec<RoleGrant>> {
    let rows = sqlx::query_as::<_, RoleGrantRow>(
        r#"
        SELECT
            role_permissions.role_id,
            permissions.id AS permission_id,
            permissions.name AS permission_name,
            resources.id AS resource_id,
            resources.name AS resource_name
        FROM role_permissions
        INNER JOIN resource_permissions
            ON resource_permissions.id = role_permissions.resource_permission_id
        INNER JOIN permissions
            ON permissions.id = resource_permissions.permission_id
        INNER JOIN resources
            ON resources.id = resource_permissions.resource_id
        WHERE role_permissions.role_id = $1
        ORDER BY resources.name, permissions.name
        "#,
    )
    .bind(role_id.value())
    .fetch_all(&mut *connection)
    .await
    .map_err(|error| AppError::Internal(format!("failed to list role grants: {error}")))?;

    rows.into_iter().map(role_grant).collect()
}

async fn clear_grants(
    connection: &mut PgConnection,
    role_id: RoleId,
    expected_priority: Priority,
) -> AppResult<u64> {
    lock_role_at(connection, role_id, expected_priority).await?;

    let removed = sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
        .bind(role_id.value())
        .execute(&mut *connection)
        .await
        .map_err(|error| map_store_error(error, "clear role grants"))?
        .rows_affected();

    Ok(removed)
}

async fn replace_grants(
    connection: &mut PgConnection,
    role_id: RoleId,
    expected_priority: Priority,
    grants: Vec<RoleGrantInput>,
) -> AppResult<Vec<RoleGrant>> {
    clear_grants(connection, role_id, expected_priority).await?;

    for grant in grants {
        let resource_permission_id = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT id
            FROM resource_permissions
            WHERE permission_id = $1
                AND resource_id = $2
            "#,
        )
        .bind(grant.permission_id.value())
        .bind(grant.resource_id.value())
        .fetch_optional(&mut *connection)
        .await
        .map_err(|error| AppError::Internal(format!("failed to resolve grant pair: {error}")))?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "permission '{}' is not linked to resource '{}'",
                grant.permission_id, grant.resource_id
            ))
        })?;

        sqlx::query(
            r#"
            INSERT INTO role_permissions (role_id, resource_permission_id)
            VALUES ($1, $2)
            ON CONFLICT (role_id, resource_permission_id) DO NOTHING
            "#,
        )
        .bind(role_id.value())
        .bind(resource_permission_id)
        .execute(&mut *connection)
        .await
        .map_err(|error| map_store_error(error, "grant permission to role"))?;
    }

    fetch_role_grants(connection, role_id).await
}
