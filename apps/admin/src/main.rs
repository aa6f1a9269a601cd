//! Atelier access-control operator binary.

#![forbid(unsafe_code)]

mod admin_command;
mod admin_config;

use std::env;
use std::sync::Arc;

use atelier_application::{
    AccessAdminRepository, AccessAdminService, AuthorizationService, CacheInvalidator,
};
use atelier_core::{AppError, AppResult, UserId, UserIdentity};
use atelier_domain::{EffectivePriority, PermissionGrant};
use atelier_infrastructure::{
    LoggingCacheInvalidator, MIGRATOR, PostgresAccessControlRepository, RedisCacheInvalidator,
};
use serde::Serialize;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::admin_command::AdminCommand;
use crate::admin_config::{AdminConfig, init_tracing};

#[derive(Debug, Serialize)]
struct PriorityReport {
    user_id: UserId,
    effective_priority: EffectivePriority,
    value: i32,
}

#[derive(Debug, Serialize)]
struct PermissionsReport {
    user_id: UserId,
    grants: Vec<PermissionGrant>,
}

#[derive(Debug, Serialize)]
struct CheckReport {
    user_id: UserId,
    action: String,
    resource: String,
    allowed: bool,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let command = AdminCommand::parse(env::args().skip(1))?;
    let config = AdminConfig::load()?;
    let pool = connect_pool(&config).await?;

    MIGRATOR
        .run(&pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

    if command == AdminCommand::Migrate {
        info!("database migrations applied successfully");
        return Ok(());
    }

    let repository = Arc::new(PostgresAccessControlRepository::new(pool));
    let authorization_service = AuthorizationService::new(repository.clone());
    let access_admin_service = AccessAdminService::new(
        authorization_service.clone(),
        repository.clone(),
        build_cache_invalidator(&config)?,
    );

    let output = match command {
        AdminCommand::Migrate => return Ok(()),
        AdminCommand::Bootstrap(user_id) => {
            let outcome = access_admin_service.bootstrap_super_admin(user_id).await?;
            render(&outcome)?
        }
        AdminCommand::Priority(user_id) => {
            let effective_priority = authorization_service.effective_priority(user_id).await?;
            render(&PriorityReport {
                user_id,
                effective_priority,
                value: effective_priority.as_i32(),
            })?
        }
        AdminCommand::Permissions(user_id) => {
            let actor = identity(repository.as_ref(), user_id).await?;
            let grants = authorization_service
                .resolve_permissions(Some(&actor))
                .await?;
            render(&PermissionsReport {
                user_id,
                grants: grants.into_iter().collect(),
            })?
        }
        AdminCommand::Check { user_id, grant } => {
            let actor = identity(repository.as_ref(), user_id).await?;
            let allowed = authorization_service
                .has_permission(Some(&actor), grant.action(), grant.resource())
                .await?;
            render(&CheckReport {
                user_id,
                action: grant.action().to_owned(),
                resource: grant.resource().to_owned(),
                allowed,
            })?
        }
    };

    println!("{output}");
    Ok(())
}

async fn connect_pool(config: &AdminConfig) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(config.database_url.as_str())
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

fn build_cache_invalidator(config: &AdminConfig) -> AppResult<Arc<dyn CacheInvalidator>> {
    let Some(redis_url) = config.redis_url.as_deref() else {
        info!("REDIS_URL not set; cache invalidations are logged only");
        return Ok(Arc::new(LoggingCacheInvalidator::new()));
    };

    let client = redis::Client::open(redis_url)
        .map_err(|error| AppError::Validation(format!("invalid REDIS_URL: {error}")))?;

    Ok(Arc::new(RedisCacheInvalidator::new(
        client,
        config.cache_channel.clone(),
        config.cache_key_prefix.clone(),
    )))
}

/// Unknown users still resolve; they hold no roles and therefore no grants.
async fn identity(
    repository: &dyn AccessAdminRepository,
    user_id: UserId,
) -> AppResult<UserIdentity> {
    Ok(match repository.find_user(user_id).await? {
        Some(user) => UserIdentity::new(user_id, user.name, Some(user.email)),
        None => UserIdentity::new(user_id, user_id.to_string(), None),
    })
}

fn render(value: &impl Serialize) -> AppResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|error| AppError::Internal(format!("failed to encode output: {error}")))
}
