//! Shared primitives for all Rust crates in Atelier.

#![forbid(unsafe_code)]

/// Authentication primitives shared across services.
pub mod auth;

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use auth::UserIdentity;

/// Result type used across Atelier crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string with surrounding whitespace removed.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

/// Identifier of a user owned by the external identity system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(Uuid);

impl UserId {
    /// Creates a random user identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a user identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Parses a user identifier from its textual UUID form.
    pub fn parse(value: &str) -> AppResult<Self> {
        Uuid::parse_str(value.trim())
            .map(Self)
            .map_err(|error| AppError::Validation(format!("invalid user id '{value}': {error}")))
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for UserId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Machine-checkable reason attached to every [`AppError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    /// Input failed validation before any store I/O.
    Validation,
    /// A referenced record does not exist.
    NotFound,
    /// A unique name or active assignment already exists.
    Duplicate,
    /// The hierarchy guard rejected the operation.
    InsufficientPrivilege,
    /// A delete was blocked by dependent rows.
    HasDependents,
    /// No authenticated caller was supplied.
    Unauthorized,
    /// The caller lacks a permission or hit a protected record.
    Forbidden,
    /// Unmapped store or transport failure.
    Store,
}

impl ReasonCode {
    /// Returns the stable transport value for this reason.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Duplicate => "duplicate",
            Self::InsufficientPrivilege => "insufficient_privilege",
            Self::HasDependents => "has_dependents",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::Store => "store",
        }
    }
}

impl Display for ReasonCode {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write operation conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Actor tried to grant or modify a priority it does not strictly outrank.
    #[error(
        "insufficient privileges: actor priority {actor_priority} must be strictly lower than target priority {target_priority}"
    )]
    InsufficientPrivilege {
        /// Resolved effective priority of the actor.
        actor_priority: i32,
        /// Priority being granted or modified.
        target_priority: i32,
    },

    /// Delete blocked by rows that still reference the target.
    #[error("{entity} cannot be deleted: {count} dependent row(s) in {relation}")]
    HasDependents {
        /// Human-readable description of the delete target.
        entity: String,
        /// Relation holding the blocking rows.
        relation: String,
        /// Number of blocking rows.
        count: u64,
    },

    /// User is not authenticated or not allowed to access a resource.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// User is authenticated but blocked by authorization policy.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the machine-checkable reason for this error.
    #[must_use]
    pub fn reason_code(&self) -> ReasonCode {
        match self {
            Self::Validation(_) => ReasonCode::Validation,
            Self::NotFound(_) => ReasonCode::NotFound,
            Self::Conflict(_) => ReasonCode::Duplicate,
            Self::InsufficientPrivilege { .. } => ReasonCode::InsufficientPrivilege,
            Self::HasDependents { .. } => ReasonCode::HasDependents,
            Self::Unauthorized(_) => ReasonCode::Unauthorized,
            Self::Forbidden(_) => ReasonCode::Forbidden,
            Self::Internal(_) => ReasonCode::Store,
        }
    }
}
