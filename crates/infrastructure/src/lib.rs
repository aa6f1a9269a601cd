//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_access_control_repository;
mod logging_cache_invalidator;
mod postgres_access_control_repository;
mod recording_cache_invalidator;
mod redis_cache_invalidator;

use sqlx::migrate::Migrator;

pub use in_memory_access_control_repository::{InMemoryAccessControlRepository, InMemoryFailPoint};
pub use logging_cache_invalidator::LoggingCacheInvalidator;
pub use postgres_access_control_repository::PostgresAccessControlRepository;
pub use recording_cache_invalidator::RecordingCacheInvalidator;
pub use redis_cache_invalidator::RedisCacheInvalidator;

/// Embedded schema migrations for the access-control tables.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");
