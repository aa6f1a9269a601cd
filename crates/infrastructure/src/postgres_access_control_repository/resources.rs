use super::*;

impl PostgresAccessControlRepository {
    pub(super) async fn list_resources_impl(&self) -> AppResult<Vec<ResourceDefinition>> {
        let rows = sqlx::query_as::<_, ResourceRow>(
            r#"
            SELECT
                resources.id,
                resources.name,
                COUNT(resource_permissions.id) AS permission_count,
                resources.created_at,
                resources.updated_at
            FROM resources
            LEFT JOIN resource_permissions
                ON resource_permissions.resource_id = resources.id
            GROUP BY resources.id
            ORDER BY resources.name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list resources: {error}")))?;

        rows.into_iter().map(resource_definition).collect()
    }

    pub(super) async fn find_resource_impl(
        &self,
        resource_id: ResourceId,
    ) -> AppResult<Option<ResourceDefinition>> {
        let mut connection = self.pool.acquire().await.map_err(|error| {
            AppError::Internal(format!("failed to acquire connection: {error}"))
        })?;

        fetch_resource(&mut connection, resource_id).await
    }

    pub(super) async fn find_resource_by_name_impl(
        &self,
        name: &str,
    ) -> AppResult<Option<ResourceDefinition>> {
        sqlx::query_as::<_, ResourceRow>(
            r#"
            SELECT
                resources.id,
                resources.name,
                COUNT(resource_permissions.id) AS permission_count,
                resources.created_at,
                resources.updated_at
            FROM resources
            LEFT JOIN resource_permissions
                ON resource_permissions.resource_id = resources.id
            WHERE lower(resources.name) = lower($1)
            GROUP BY resources.id
            "#,
        )
        .bind(name.trim())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find resource: {error}")))?
        .map(resource_definition)
        .transpose()
    }

    pub(super) async fn create_resource_impl(
        &self,
        name: ResourceName,
    ) -> AppResult<ResourceDefinition> {
        let mut transaction = begin(&self.pool).await?;
        let result = insert_resource(&mut transaction, name).await;
        finish(transaction, result).await
    }

    pub(super) async fn rename_resource_impl(
        &self,
        resource_id: ResourceId,
        name: ResourceName,
    ) -> AppResult<ResourceDefinition> {
        let mut transaction = begin(&self.pool).await?;
        let result = rename_resource_row(&mut transaction, resource_id, name).await;
        finish(transaction, result).await
    }

    pub(super) async fn delete_resource_impl(
        &self,
        resource_id: ResourceId,
    ) -> AppResult<ResourceDefinition> {
        let mut transaction = begin(&self.pool).await?;
        let result = delete_resource_row(&mut transaction, resource_id).await;
        finish(transaction, result).await
    }
}

async fn fetch_resource(
    connection: &mut PgConnection,
    resource_id: ResourceId,
) -> AppResult<Option<ResourceDefinition>> {
    sqlx::query_as::<_, ResourceRow>(
        r#"
        SELECT
            resources.id,
            resources.name,
            COUNT(resource_permissions.id) AS permission_count,
            resources.created_at,
            resources.updated_at
        FROM resources
        LEFT JOIN resource_permissions
            ON resource_permissions.resource_id = resources.id
        WHERE resources.id = $1
        GROUP BY resources.id
        "#,
    )
    .bind(resource_id.value())
    .fetch_optional(&mut *connection)
    .await
    .map_err(|error| AppError::Internal(format!("failed to find resource: {error}")))?
    .map(resource_definition)
    .transpose()
}

async fn fetch_existing_resource(
    connection: &mut PgConnection,
    resource_id: ResourceId,
) -> AppResult<ResourceDefinition> {
    fetch_resource(connection, resource_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("resource '{resource_id}' was not found")))
}

async fn insert_resource(
    connection: &mut PgConnection,
    name: ResourceName,
) -> AppResult<ResourceDefinition> {
    let resource_id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO resources (name)
        VALUES ($1)
        RETURNING id
        "#,
    )
    .bind(name.as_str())
    .fetch_one(&mut *connection)
    .await
    .map_err(|error| map_store_error(error, "create resource"))?;

    fetch_existing_resource(connection, ResourceId::new(resource_id)?).await
}

async fn rename_resource_row(
    connection: &mut PgConnection,
    resource_id: ResourceId,
    name: ResourceName,
) -> AppResult<ResourceDefinition> {
    let result = sqlx::query(
        r#"
        UPDATE resources
        SET name = $2, updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(resource_id.value())
    .bind(name.as_str())
    .execute(&mut *connection)
    .await
    .map_err(|error| map_store_error(error, "rename resource"))?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "resource '{resource_id}' was not found"
        )));
    }

    fetch_existing_resource(connection, resource_id).await
}

async fn delete_resource_row(
    connection: &mut PgConnection,
    resource_id: ResourceId,
) -> AppResult<ResourceDefinition> {
    let locked = sqlx::query_scalar::<_, i64>("SELECT id FROM resources WHERE id = $1 FOR UPDATE")
        .bind(resource_id.value())
        .fetch_optional(&mut *connection)
        .await
        .map_err(|error| AppError::Internal(format!("failed to lock resource: {error}")))?;
    if locked.is_none() {
        return Err(AppError::NotFound(format!(
            "resource '{resource_id}' was not found"
        )));
    }

    let resource = fetch_existing_resource(connection, resource_id).await?;
    if resource.permission_count > 0 {
        return Err(AppError::HasDependents {
            entity: format!("resource '{}'", resource.name),
            relation: "resource_permissions".to_owned(),
            count: resource.permission_count,
        });
    }

    sqlx::query("DELETE FROM resources WHERE id = $1")
        .bind(resource_id.value())
        .execute(&mut *connection)
        .await
        .map_err(|error| map_store_error(error, "delete resource"))?;

    Ok(resource)
}
