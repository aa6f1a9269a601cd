use super::*;

use tracing::warn;

pub(super) async fn begin(pool: &PgPool) -> AppResult<Transaction<'static, Postgres>> {
    pool.begin()
        .await
        .map_err(|error| AppError::Internal(format!("failed to begin transaction: {error}")))
}

/// Commits on success and issues an explicit rollback on failure.
pub(super) async fn finish<T>(
    transaction: Transaction<'static, Postgres>,
    result: AppResult<T>,
) -> AppResult<T> {
    match result {
        Ok(value) => {
            transaction.commit().await.map_err(|error| {
                AppError::Internal(format!("failed to commit transaction: {error}"))
            })?;
            Ok(value)
        }
        Err(error) => {
            if let Err(rollback_error) = transaction.rollback().await {
                warn!(error = %rollback_error, "failed to roll back transaction");
            }
            Err(error)
        }
    }
}

/// Maps unique and foreign-key violations to conflicts.
pub(super) fn map_store_error(error: sqlx::Error, action: &str) -> AppError {
    if let sqlx::Error::Database(database_error) = &error {
        let constraint = database_error.constraint().unwrap_or("unknown").to_owned();
        match database_error.code().as_deref() {
            Some("23505") => {
                return AppError::Conflict(format!(
                    "failed to {action}: value already exists ({constraint})"
                ));
            }
            Some("23503") => {
                return AppError::Conflict(format!(
                    "failed to {action}: blocked by related rows ({constraint})"
                ));
            }
            _ => {}
        }
    }

    AppError::Internal(format!("failed to {action}: {error}"))
}
