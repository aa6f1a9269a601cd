//! Identifiers and validated names of access-control records.

use std::fmt::{Display, Formatter};

use atelier_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

/// Name of the role that regular delete and rename operations never touch.
pub const SUPER_ADMIN_ROLE_NAME: &str = "super_admin";

/// Priority given to the bootstrap `super_admin` role.
pub const SUPER_ADMIN_PRIORITY: i32 = 1;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Creates a validated identifier from a store key.
            pub fn new(value: i64) -> AppResult<Self> {
                if value <= 0 {
                    return Err(AppError::Validation(format!(
                        concat!("invalid ", $label, " id {}"),
                        value
                    )));
                }

                Ok(Self(value))
            }

            /// Returns the raw store key.
            #[must_use]
            pub fn value(&self) -> i64 {
                self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
                write!(formatter, "{}", self.0)
            }
        }
    };
}

record_id!(
    /// Identifier of a role.
    RoleId,
    "role"
);
record_id!(
    /// Identifier of a permission.
    PermissionId,
    "permission"
);
record_id!(
    /// Identifier of a resource.
    ResourceId,
    "resource"
);

/// Unique role name, compared case-sensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleName(NonEmptyString);

impl RoleName {
    /// Creates a validated role name.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        NonEmptyString::new(value)
            .map(Self)
            .map_err(|_| AppError::Validation("role name must not be blank".to_owned()))
    }

    /// Returns the role name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns whether this is the protected `super_admin` role.
    #[must_use]
    pub fn is_protected(&self) -> bool {
        is_protected_role(self.as_str())
    }
}

/// Unique permission name, compared case-sensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionName(NonEmptyString);

impl PermissionName {
    /// Creates a validated permission name.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        NonEmptyString::new(value)
            .map(Self)
            .map_err(|_| AppError::Validation("permission name must not be blank".to_owned()))
    }

    /// Returns the permission name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// Unique resource name, compared case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceName(NonEmptyString);

impl ResourceName {
    /// Creates a validated resource name.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        NonEmptyString::new(value)
            .map(Self)
            .map_err(|_| AppError::Validation("resource name must not be blank".to_owned()))
    }

    /// Returns the resource name as entered.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// Returns whether two resource names denote the same resource.
///
/// Uniqueness, lookups and grant matching all compare through this fold, so a
/// name that collides on create also matches on permission checks.
#[must_use]
pub fn same_resource_name(left: &str, right: &str) -> bool {
    resource_name_key(left) == resource_name_key(right)
}

fn resource_name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Returns whether a stored role name is the protected `super_admin` role.
#[must_use]
pub fn is_protected_role(name: &str) -> bool {
    name == SUPER_ADMIN_ROLE_NAME
}
