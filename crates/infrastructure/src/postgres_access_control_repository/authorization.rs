use super::*;

use atelier_application::AuthorizationRepository;

#[derive(Debug, FromRow)]
struct GrantRow {
    action: String,
    resource: String,
}

#[async_trait]
impl AuthorizationRepository for PostgresAccessControlRepository {
    async fn list_active_role_priorities(
        &self,
        user_id: UserId,
        as_of: DateTime<Utc>,
    ) -> AppResult<Vec<Priority>> {
        let priorities = sqlx::query_scalar::<_, i32>(
            r#"
            SELECT roles.priority
            FROM user_roles
            INNER JOIN roles
                ON roles.id = user_roles.role_id
            WHERE user_roles.user_id = $1
                AND (user_roles.expires_at IS NULL OR user_roles.expires_at > $2)
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(as_of)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load role priorities: {error}")))?;

        priorities
            .into_iter()
            .map(|priority| {
                Priority::new(priority).map_err(|error| {
                    AppError::Internal(format!(
                        "stored priority for user '{user_id}' is invalid: {error}"
                    ))
                })
            })
            .collect()
    }

    async fn list_permission_grants_for_user(
        &self,
        user_id: UserId,
        as_of: DateTime<Utc>,
    ) -> AppResult<Vec<PermissionGrant>> {
        let rows = sqlx::query_as::<_, GrantRow>(
            r#"
            SELECT DISTINCT
                permissions.name AS action,
                resources.name AS resource
            FROM user_roles
            INNER JOIN role_permissions
                ON role_permissions.role_id = user_roles.role_id
            INNER JOIN resource_permissions
                ON resource_permissions.id = role_permissions.resource_permission_id
            INNER JOIN permissions
                ON permissions.id = resource_permissions.permission_id
            INNER JOIN resources
                ON resources.id = resource_permissions.resource_id
            WHERE user_roles.user_id = $1
                AND (user_roles.expires_at IS NULL OR user_roles.expires_at > $2)
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(as_of)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load permissions: {error}")))?;

        rows.into_iter()
            .map(|row| {
                PermissionGrant::new(row.action.as_str(), row.resource.as_str()).map_err(|error| {
                    AppError::Internal(format!(
                        "failed to decode grant '{}' on '{}' for user '{user_id}': {error}",
                        row.action, row.resource
                    ))
                })
            })
            .collect()
    }

    async fn user_has_permission_grant(
        &self,
        user_id: UserId,
        action: &str,
        resource: &str,
        as_of: DateTime<Utc>,
    ) -> AppResult<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM user_roles
                INNER JOIN role_permissions
                    ON role_permissions.role_id = user_roles.role_id
                INNER JOIN resource_permissions
                    ON resource_permissions.id = role_permissions.resource_permission_id
                INNER JOIN permissions
                    ON permissions.id = resource_permissions.permission_id
                INNER JOIN resources
                    ON resources.id = resource_permissions.resource_id
                WHERE user_roles.user_id = $1
                    AND (user_roles.expires_at IS NULL OR user_roles.expires_at > $4)
                    AND permissions.name = $2
                    AND lower(resources.name) = lower($3)
            )
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(action)
        .bind(resource)
        .bind(as_of)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to check permission: {error}")))
    }
}
