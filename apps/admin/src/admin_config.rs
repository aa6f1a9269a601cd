use std::env;

use atelier_core::AppError;
use tracing_subscriber::EnvFilter;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_CACHE_CHANNEL: &str = "access-control:invalidate";
const DEFAULT_CACHE_KEY_PREFIX: &str = "access-control";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub redis_url: Option<String>,
    pub cache_channel: String,
    pub cache_key_prefix: String,
}

impl AdminConfig {
    pub fn load() -> Result<Self, AppError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let database_url = required_non_empty(&lookup, "DATABASE_URL")?;

        let database_max_connections = match non_empty(&lookup, "DATABASE_MAX_CONNECTIONS") {
            Some(value) => value.trim().parse::<u32>().map_err(|error| {
                AppError::Validation(format!("invalid DATABASE_MAX_CONNECTIONS: {error}"))
            })?,
            None => DEFAULT_MAX_CONNECTIONS,
        };
        if database_max_connections == 0 {
            return Err(AppError::Validation(
                "DATABASE_MAX_CONNECTIONS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            database_url,
            database_max_connections,
            redis_url: non_empty(&lookup, "REDIS_URL"),
            cache_channel: non_empty(&lookup, "CACHE_INVALIDATION_CHANNEL")
                .unwrap_or_else(|| DEFAULT_CACHE_CHANNEL.to_owned()),
            cache_key_prefix: non_empty(&lookup, "CACHE_KEY_PREFIX")
                .unwrap_or_else(|| DEFAULT_CACHE_KEY_PREFIX.to_owned()),
        })
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).filter(|value| !value.trim().is_empty())
}

fn required_non_empty(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<String, AppError> {
    match lookup(name) {
        None => Err(AppError::Validation(format!("{name} is required"))),
        Some(value) if value.trim().is_empty() => {
            Err(AppError::Validation(format!("{name} must not be empty")))
        }
        Some(value) => Ok(value),
    }
}
