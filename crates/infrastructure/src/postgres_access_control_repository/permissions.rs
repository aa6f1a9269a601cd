use super::*;

impl PostgresAccessControlRepository {
    pub(super) async fn list_permissions_impl(&self) -> AppResult<Vec<PermissionDefinition>> {
        let rows = sqlx::query_as::<_, PermissionRow>(
            r#"
            SELECT id, name, created_at, updated_at
            FROM permissions
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list permissions: {error}")))?;

        let resource_rows = sqlx::query_as::<_, PermissionResourceRow>(
            r#"
            SELECT
                resource_permissions.permission_id,
                resources.id AS resource_id,
                resources.name AS resource_name
            FROM resource_permissions
            INNER JOIN resources
                ON resources.id = resource_permissions.resource_id
            ORDER BY resources.name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list permission resources: {error}"))
        })?;

        rows.into_iter()
            .map(|row| permission_definition(row, &resource_rows))
            .collect()
    }

    pub(super) async fn find_permission_impl(
        &self,
        permission_id: PermissionId,
    ) -> AppResult<Option<PermissionDefinition>> {
        let mut connection = self.pool.acquire().await.map_err(|error| {
            AppError::Internal(format!("failed to acquire connection: {error}"))
        })?;

        fetch_permission(&mut connection, permission_id).await
    }

    pub(super) async fn find_permission_by_name_impl(
        &self,
        name: &str,
    ) -> AppResult<Option<PermissionDefinition>> {
        let mut connection = self.pool.acquire().await.map_err(|error| {
            AppError::Internal(format!("failed to acquire connection: {error}"))
        })?;

        let permission_id =
            sqlx::query_scalar::<_, i64>("SELECT id FROM permissions WHERE name = $1")
                .bind(name)
                .fetch_optional(&mut *connection)
                .await
                .map_err(|error| {
                    AppError::Internal(format!("failed to find permission: {error}"))
                })?;

        match permission_id {
            Some(permission_id) => {
                fetch_permission(&mut connection, PermissionId::new(permission_id)?).await
            }
            None => Ok(None),
        }
    }

    pub(super) async fn create_permission_impl(
        &self,
        permission: NewPermission,
    ) -> AppResult<PermissionDefinition> {
        let mut transaction = begin(&self.pool).await?;
        let result = insert_permission(&mut transaction, permission).await;
        finish(transaction, result).await
    }

    pub(super) async fn rename_permission_impl(
        &self,
        permission_id: PermissionId,
        name: PermissionName,
    ) -> AppResult<PermissionDefinition> {
        let mut transaction = begin(&self.pool).await?;
        let result = rename_permission_row(&mut transaction, permission_id, name).await;
        finish(transaction, result).await
    }

    pub(super) async fn delete_permission_impl(
        &self,
        permission_id: PermissionId,
    ) -> AppResult<PermissionDeletion> {
        let mut transaction = begin(&self.pool).await?;
        let result = delete_permission_cascade(&mut transaction, permission_id).await;
        finish(transaction, result).await
    }

    pub(super) async fn replace_permission_resources_impl(
        &self,
        permission_id: PermissionId,
        resource_ids: Vec<ResourceId>,
    ) -> AppResult<ResourceReplacement> {
        let mut transaction = begin(&self.pool).await?;
        let result = replace_resources(&mut transaction, permission_id, resource_ids).await;
        finish(transaction, result).await
    }
}

async fn fetch_permission(
    connection: &mut PgConnection,
    permission_id: PermissionId,
) -> AppResult<Option<PermissionDefinition>> {
    let row = sqlx::query_as::<_, PermissionRow>(
        r#"
        SELECT id, name, created_at, updated_at
        FROM permissions
        WHERE id = $1
        "#,
    )
    .bind(permission_id.value())
    .fetch_optional(&mut *connection)
    .await
    .map_err(|error| AppError::Internal(format!("failed to find permission: {error}")))?;

    let Some(row) = row else {
        return Ok(None);
    };

    let resource_rows = sqlx::query_as::<_, PermissionResourceRow>(
        r#"
        SELECT
            resource_permissions.permission_id,
            resources.id AS resource_id,
            resources.name AS resource_name
        FROM resource_permissions
        INNER JOIN resources
            ON resources.id = resource_permissions.resource_id
        WHERE resource_permissions.permission_id = $1
        ORDER BY resources.name
        "#,
    )
    .bind(permission_id.value())
    .fetch_all(&mut *connection)
    .await
    .map_err(|error| {
        AppError::Internal(format!("failed to load permission resources: {error}"))
    })?;

    permission_definition(row, &resource_rows).map(Some)
}

async fn fetch_existing_permission(
    connection: &mut PgConnection,
    permission_id: PermissionId,
) -> AppResult<PermissionDefinition> {
    fetch_permission(connection, permission_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("permission '{permission_id}' was not found")))
}

async fn lock_permission(
    connection: &mut PgConnection,
    permission_id: PermissionId,
) -> AppResult<String> {
    sqlx::query_scalar::<_, String>("SELECT name FROM permissions WHERE id = $1 FOR UPDATE")
        .bind(permission_id.value())
        .fetch_optional(&mut *connection)
        .await
        .map_err(|error| AppError::Internal(format!("failed to lock permission: {error}")))?
        .ok_or_else(|| AppError::NotFound(format!("permission '{permission_id}' was not found")))
}

async fn link_resource(
    connection: &mut PgConnection,
    permission_id: PermissionId,
    resource_id: ResourceId,
) -> AppResult<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO resource_permissions (resource_id, permission_id)
        VALUES ($1, $2)
        ON CONFLICT (resource_id, permission_id) DO NOTHING
        "#,
    )
    .bind(resource_id.value())
    .bind(permission_id.value())
    .execute(&mut *connection)
    .await
    .map_err(|error| map_store_error(error, "link resource to permission"))?;

    Ok(result.rows_affected())
}

async fn insert_permission(
    connection: &mut PgConnection,
    permission: NewPermission,
) -> AppResult<PermissionDefinition> {
    let permission_id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO permissions (name)
        VALUES ($1)
        RETURNING id
        "#,
    )
    .bind(permission.name.as_str())
    .fetch_one(&mut *connection)
    .await
    .map_err(|error| map_store_error(error, "create permission"))?;
    let permission_id = PermissionId::new(permission_id)?;

    for resource_id in permission.resource_ids {
        link_resource(connection, permission_id, resource_id).await?;
    }

    fetch_existing_permission(connection, permission_id).await
}

async fn rename_permission_row(
    connection: &mut PgConnection,
    permission_id: PermissionId,
    name: PermissionName,
) -> AppResult<PermissionDefinition> {
    let result = sqlx::query(
        r#"
        UPDATE permissions
        SET name = $2, updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(permission_id.value())
    .bind(name.as_str())
    .execute(&mut *connection)
    .await
    .map_err(|error| map_store_error(error, "rename permission"))?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "permission '{permission_id}' was not found"
        )));
    }

    fetch_existing_permission(connection, permission_id).await
}

async fn delete_permission_cascade(
    connection: &mut PgConnection,
    permission_id: PermissionId,
) -> AppResult<PermissionDeletion> {
    let name = lock_permission(connection, permission_id).await?;

    let removed_role_permissions = sqlx::query(
        r#"
        DELETE FROM role_permissions
        WHERE resource_permission_id IN (
            SELECT id
            FROM resource_permissions
            WHERE permission_id = $1
        )
        "#,
    )
    .bind(permission_id.value())
    .execute(&mut *connection)
    .await
    .map_err(|error| map_store_error(error, "delete role grants"))?
    .rows_affected();

    let removed_resource_permissions =
        sqlx::query("DELETE FROM resource_permissions WHERE permission_id = $1")
            .bind(permission_id.value())
            .execute(&mut *connection)
            .await
            .map_err(|error| map_store_error(error, "delete resource pairs"))?
            .rows_affected();

    sqlx::query("DELETE FROM permissions WHERE id = $1")
        .bind(permission_id.value())
        .execute(&mut *connection)
        .await
        .map_err(|error| map_store_error(error, "delete permission"))?;

    Ok(PermissionDeletion {
        permission_id,
        name,
        removed_resource_permissions,
        removed_role_permissions,
    })
}

async fn replace_resources(
    connection: &mut PgConnection,
    permission_id: PermissionId,
    resource_ids: Vec<ResourceId>,
) -> AppResult<ResourceReplacement> {
    lock_permission(connection, permission_id).await?;

    let retained: Vec<i64> = resource_ids.iter().map(ResourceId::value).collect();

    let removed_role_permissions = sqlx::query(
        r#"
        DELETE FROM role_permissions
        WHERE resource_permission_id IN (
            SELECT id
            FROM resource_permissions
            WHERE permission_id = $1
                AND NOT (resource_id = ANY($2))
        )
        "#,
    )
    .bind(permission_id.value())
    .bind(&retained)
    .execute(&mut *connection)
    .await
    .map_err(|error| map_store_error(error, "delete role grants"))?
    .rows_affected();

    let removed = sqlx::query(
        r#"
        DELETE FROM resource_permissions
        WHERE permission_id = $1
            AND NOT (resource_id = ANY($2))
        "#,
    )
    .bind(permission_id.value())
    .bind(&retained)
    .execute(&mut *connection)
    .await
    .map_err(|error| map_store_error(error, "delete resource pairs"))?
    .rows_affected();

    let mut added = 0;
    for resource_id in resource_ids {
        added += link_resource(connection, permission_id, resource_id).await?;
    }

    Ok(ResourceReplacement {
        permission: fetch_existing_permission(connection, permission_id).await?,
        added,
        removed,
        removed_role_permissions,
    })
}
