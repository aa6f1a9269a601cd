use super::*;

use super::roles::lock_role_at;

impl PostgresAccessControlRepository {
    pub(super) async fn list_user_role_assignments_impl(
        &self,
        user_id: UserId,
    ) -> AppResult<Vec<UserRoleAssignment>> {
        let rows = sqlx::query_as::<_, AssignmentRow>(
            r#"
            SELECT
                user_roles.user_id,
                user_roles.role_id,
                roles.name AS role_name,
                roles.priority AS role_priority,
                user_roles.assigned_by,
                user_roles.expires_at,
                user_roles.created_at
            FROM user_roles
            INNER JOIN roles
                ON roles.id = user_roles.role_id
            WHERE user_roles.user_id = $1
            ORDER BY roles.priority, roles.name
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list role assignments: {error}"))
        })?;

        rows.into_iter().map(role_assignment).collect()
    }

    pub(super) async fn find_active_role_assignment_impl(
        &self,
        user_id: UserId,
        role_id: RoleId,
        as_of: DateTime<Utc>,
    ) -> AppResult<Option<UserRoleAssignment>> {
        sqlx::query_as::<_, AssignmentRow>(
            r#"
            SELECT
                user_roles.user_id,
                user_roles.role_id,
                roles.name AS role_name,
                roles.priority AS role_priority,
                user_roles.assigned_by,
                user_roles.expires_at,
                user_roles.created_at
            FROM user_roles
            INNER JOIN roles
                ON roles.id = user_roles.role_id
            WHERE user_roles.user_id = $1
                AND user_roles.role_id = $2
                AND (user_roles.expires_at IS NULL OR user_roles.expires_at > $3)
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(role_id.value())
        .bind(as_of)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find role assignment: {error}")))?
        .map(role_assignment)
        .transpose()
    }

    pub(super) async fn insert_role_assignment_impl(
        &self,
        assignment: NewRoleAssignment,
    ) -> AppResult<UserRoleAssignment> {
        let mut transaction = begin(&self.pool).await?;
        let result = insert_assignment(&mut transaction, assignment).await;
        finish(transaction, result).await
    }

    pub(super) async fn delete_role_assignment_impl(
        &self,
        user_id: UserId,
        role_id: RoleId,
        expected_role_priority: Priority,
    ) -> AppResult<()> {
        let mut transaction = begin(&self.pool).await?;
        let result =
            delete_assignment(&mut transaction, user_id, role_id, expected_role_priority).await;
        finish(transaction, result).await
    }
}

/// Drops an expired row of the pair so the primary key admits a new one.
pub(super) async fn discard_expired_assignment(
    connection: &mut PgConnection,
    user_id: UserId,
    role_id: RoleId,
    as_of: DateTime<Utc>,
) -> AppResult<()> {
    sqlx::query(
        r#"
        DELETE FROM user_roles
        WHERE user_id = $1
            AND role_id = $2
            AND expires_at IS NOT NULL
            AND expires_at <= $3
        "#,
    )
    .bind(user_id.as_uuid())
    .bind(role_id.value())
    .bind(as_of)
    .execute(&mut *connection)
    .await
    .map_err(|error| map_store_error(error, "discard expired role assignment"))?;

    Ok(())
}

async fn insert_assignment(
    connection: &mut PgConnection,
    assignment: NewRoleAssignment,
) -> AppResult<UserRoleAssignment> {
    lock_role_at(
        connection,
        assignment.role_id,
        assignment.expected_role_priority,
    )
    .await?;

    discard_expired_assignment(
        connection,
        assignment.user_id,
        assignment.role_id,
        assignment.as_of,
    )
    .await?;

    sqlx::query(
        r#"
        INSERT INTO user_roles (user_id, role_id, assigned_by, expires_at, created_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(assignment.user_id.as_uuid())
    .bind(assignment.role_id.value())
    .bind(assignment.assigned_by.map(|user_id| user_id.as_uuid()))
    .bind(assignment.expires_at)
    .bind(assignment.as_of)
    .execute(&mut *connection)
    .await
    .map_err(|error| {
        if let sqlx::Error::Database(database_error) = &error {
            match database_error.code().as_deref() {
                Some("23505") => {
                    return AppError::Conflict(format!(
                        "role '{}' is already actively assigned to user '{}'",
                        assignment.role_id, assignment.user_id
                    ));
                }
                Some("23503") => {
                    return missing_assignment_reference(
                        database_error.constraint(),
                        &assignment,
                    );
                }
                _ => {}
            }
        }

        map_store_error(error, "assign role")
    })?;

    let row = sqlx::query_as::<_, AssignmentRow>(
        r#"
        SELECT
            user_roles.user_id,
            user_roles.role_id,
            roles.name AS role_name,
            roles.priority AS role_priority,
            user_roles.assigned_by,
            user_roles.expires_at,
            user_roles.created_at
        FROM user_roles
        INNER JOIN roles
            ON roles.id = user_roles.role_id
        WHERE user_roles.user_id = $1
            AND user_roles.role_id = $2
        "#,
    )
    .bind(assignment.user_id.as_uuid())
    .bind(assignment.role_id.value())
    .fetch_one(&mut *connection)
    .await
    .map_err(|error| AppError::Internal(format!("failed to reload role assignment: {error}")))?;

    role_assignment(row)
}

/// Names the row an assignment insert referenced after it was deleted.
pub(super) fn missing_assignment_reference(
    constraint: Option<&str>,
    assignment: &NewRoleAssignment,
) -> AppError {
    match constraint {
        Some("user_roles_role_id_fkey") => {
            AppError::NotFound(format!("role '{}' was not found", assignment.role_id))
        }
        Some("user_roles_assigned_by_fkey") => AppError::NotFound(format!(
            "assigning user '{}' was not found",
            assignment
                .assigned_by
                .map_or_else(|| "none".to_owned(), |user_id| user_id.to_string())
        )),
        _ => AppError::NotFound(format!("user '{}' was not found", assignment.user_id)),
    }
}

async fn delete_assignment(
    connection: &mut PgConnection,
    user_id: UserId,
    role_id: RoleId,
    expected_role_priority: Priority,
) -> AppResult<()> {
    lock_role_at(connection, role_id, expected_role_priority).await?;

    let result = sqlx::query("DELETE FROM user_roles WHERE user_id = $1 AND role_id = $2")
        .bind(user_id.as_uuid())
        .bind(role_id.value())
        .execute(&mut *connection)
        .await
        .map_err(|error| map_store_error(error, "revoke role"))?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "role '{role_id}' is not assigned to user '{user_id}'"
        )));
    }

    Ok(())
}
