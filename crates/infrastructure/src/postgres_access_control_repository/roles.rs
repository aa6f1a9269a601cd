use super::*;

impl PostgresAccessControlRepository {
    pub(super) async fn list_roles_impl(
        &self,
        as_of: DateTime<Utc>,
    ) -> AppResult<Vec<RoleOverview>> {
        let rows = sqlx::query_as::<_, RoleOverviewRow>(
            r#"
            SELECT
                roles.id,
                roles.name,
                roles.priority,
                roles.created_by,
                roles.updated_by,
                roles.created_at,
                roles.updated_at,
                (
                    SELECT COUNT(*)
                    FROM user_roles
                    WHERE user_roles.role_id = roles.id
                        AND (user_roles.expires_at IS NULL OR user_roles.expires_at > $1)
                ) AS active_assignment_count,
                (
                    SELECT COUNT(*)
                    FROM role_permissions
                    WHERE role_permissions.role_id = roles.id
                ) AS grant_count
            FROM roles
            ORDER BY roles.priority, roles.name
            "#,
        )
        .bind(as_of)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list roles: {error}")))?;

        rows.into_iter()
            .map(|row| {
                Ok(RoleOverview {
                    role: role_definition(row.role)?,
                    active_assignment_count: count(row.active_assignment_count),
                    grant_count: count(row.grant_count),
                })
            })
            .collect()
    }

    pub(super) async fn find_role_impl(
        &self,
        role_id: RoleId,
    ) -> AppResult<Option<RoleDefinition>> {
        sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT id, name, priority, created_by, updated_by, created_at, updated_at
            FROM roles
            WHERE id = $1
            "#,
        )
        .bind(role_id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find role: {error}")))?
        .map(role_definition)
        .transpose()
    }

    pub(super) async fn find_role_by_name_impl(
        &self,
        name: &str,
    ) -> AppResult<Option<RoleDefinition>> {
        sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT id, name, priority, created_by, updated_by, created_at, updated_at
            FROM roles
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find role: {error}")))?
        .map(role_definition)
        .transpose()
    }

    pub(super) async fn create_role_impl(&self, role: NewRole) -> AppResult<RoleDefinition> {
        let mut transaction = begin(&self.pool).await?;
        let result = insert_role(&mut transaction, role).await;
        finish(transaction, result).await
    }

    pub(super) async fn update_role_impl(
        &self,
        role_id: RoleId,
        changes: RoleChanges,
    ) -> AppResult<RoleDefinition> {
        let mut transaction = begin(&self.pool).await?;
        let result = update_role_row(&mut transaction, role_id, changes).await;
        finish(transaction, result).await
    }

    pub(super) async fn delete_role_impl(
        &self,
        role_id: RoleId,
        expected_priority: Priority,
    ) -> AppResult<RoleDefinition> {
        let mut transaction = begin(&self.pool).await?;
        let result = delete_role_row(&mut transaction, role_id, expected_priority).await;
        finish(transaction, result).await
    }
}

/// Loads a role and locks it for the rest of the transaction.
async fn lock_role(
    connection: &mut PgConnection,
    role_id: RoleId,
) -> AppResult<RoleDefinition> {
    let row = sqlx::query_as::<_, RoleRow>(
        r#"
        SELECT id, name, priority, created_by, updated_by, created_at, updated_at
        FROM roles
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(role_id.value())
    .fetch_optional(&mut *connection)
    .await
    .map_err(|error| AppError::Internal(format!("failed to lock role: {error}")))?
    .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' was not found")))?;

    role_definition(row)
}

/// Locks a role the hierarchy guard saw at `expected` priority.
pub(super) async fn lock_role_at(
    connection: &mut PgConnection,
    role_id: RoleId,
    expected: Priority,
) -> AppResult<RoleDefinition> {
    let role = lock_role(connection, role_id).await?;
    if role.priority != expected {
        return Err(priority_changed(role_id));
    }

    Ok(role)
}

fn priority_changed(role_id: RoleId) -> AppError {
    AppError::Conflict(format!(
        "role '{role_id}' changed priority concurrently; reload it and retry"
    ))
}

async fn insert_role(connection: &mut PgConnection, role: NewRole) -> AppResult<RoleDefinition> {
    let row = sqlx::query_as::<_, RoleRow>(
        r#"
        INSERT INTO roles (name, priority, created_by, updated_by)
        VALUES ($1, $2, $3, $3)
        RETURNING id, name, priority, created_by, updated_by, created_at, updated_at
        "#,
    )
    .bind(role.name.as_str())
    .bind(role.priority.value())
    .bind(role.created_by.map(|user_id| user_id.as_uuid()))
    .fetch_one(&mut *connection)
    .await
    .map_err(|error| map_store_error(error, "create role"))?;

    role_definition(row)
}

async fn update_role_row(
    connection: &mut PgConnection,
    role_id: RoleId,
    changes: RoleChanges,
) -> AppResult<RoleDefinition> {
    let row = sqlx::query_as::<_, RoleRow>(
        r#"
        UPDATE roles
        SET
            name = COALESCE($2, name),
            priority = COALESCE($3, priority),
            updated_by = $4,
            updated_at = now()
        WHERE id = $1
            AND priority = $5
        RETURNING id, name, priority, created_by, updated_by, created_at, updated_at
        "#,
    )
    .bind(role_id.value())
    .bind(changes.name.as_ref().map(|name| name.as_str()))
    .bind(changes.priority.map(|priority| priority.value()))
    .bind(changes.updated_by.as_uuid())
    .bind(changes.expected_priority.value())
    .fetch_optional(&mut *connection)
    .await
    .map_err(|error| map_store_error(error, "update role"))?;

    if let Some(row) = row {
        return role_definition(row);
    }

    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM roles WHERE id = $1)")
        .bind(role_id.value())
        .fetch_one(&mut *connection)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find role: {error}")))?;

    if !exists {
        return Err(AppError::NotFound(format!("role '{role_id}' was not found")));
    }

    Err(priority_changed(role_id))
}

async fn delete_role_row(
    connection: &mut PgConnection,
    role_id: RoleId,
    expected_priority: Priority,
) -> AppResult<RoleDefinition> {
    let role = lock_role_at(connection, role_id, expected_priority).await?;

    let assignments = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM user_roles WHERE role_id = $1",
    )
    .bind(role_id.value())
    .fetch_one(&mut *connection)
    .await
    .map_err(|error| AppError::Internal(format!("failed to count role assignments: {error}")))?;

    if assignments > 0 {
        return Err(AppError::HasDependents {
            entity: format!("role '{}'", role.name),
            relation: "user_roles".to_owned(),
            count: count(assignments),
        });
    }

    let grants = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM role_permissions WHERE role_id = $1",
    )
    .bind(role_id.value())
    .fetch_one(&mut *connection)
    .await
    .map_err(|error| AppError::Internal(format!("failed to count role grants: {error}")))?;

    if grants > 0 {
        return Err(AppError::HasDependents {
            entity: format!("role '{}'", role.name),
            relation: "role_permissions".to_owned(),
            count: count(grants),
        });
    }

    sqlx::query("DELETE FROM roles WHERE id = $1")
        .bind(role_id.value())
        .execute(&mut *connection)
        .await
        .map_err(|error| map_store_error(error, "delete role"))?;

    Ok(role)
}
