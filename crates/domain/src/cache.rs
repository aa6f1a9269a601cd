use std::fmt::{Display, Formatter};

use atelier_core::UserId;
use serde::{Serialize, Serializer};

use crate::{PermissionId, ResourceId, RoleId};

/// Deterministic cache tag signalled after a committed mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CacheTag {
    /// Every role listing and role-derived computation.
    Roles,
    /// One role.
    Role(RoleId),
    /// Every permission listing.
    Permissions,
    /// One permission.
    Permission(PermissionId),
    /// Every resource listing.
    Resources,
    /// One resource.
    Resource(ResourceId),
    /// Every per-user computation (priorities, permission sets).
    Users,
    /// One user.
    User(UserId),
}

impl CacheTag {
    /// Returns the stable tag string.
    #[must_use]
    pub fn as_string(&self) -> String {
        match self {
            Self::Roles => "roles".to_owned(),
            Self::Role(role_id) => format!("role:{role_id}"),
            Self::Permissions => "permissions".to_owned(),
            Self::Permission(permission_id) => format!("permission:{permission_id}"),
            Self::Resources => "resources".to_owned(),
            Self::Resource(resource_id) => format!("resource:{resource_id}"),
            Self::Users => "users".to_owned(),
            Self::User(user_id) => format!("user:{user_id}"),
        }
    }

    /// Sorts and de-duplicates a tag list.
    #[must_use]
    pub fn normalize(tags: impl IntoIterator<Item = Self>) -> Vec<Self> {
        let mut tags: Vec<Self> = tags.into_iter().collect();
        tags.sort();
        tags.dedup();
        tags
    }
}

impl Display for CacheTag {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_string().as_str())
    }
}

impl Serialize for CacheTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_string().as_str())
    }
}
