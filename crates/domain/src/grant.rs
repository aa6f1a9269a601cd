use std::fmt::{Display, Formatter};

use atelier_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use crate::access::same_resource_name;

/// Structured `(action, resource)` pair a role can be granted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PermissionGrant {
    action: String,
    resource: String,
}

impl PermissionGrant {
    /// Creates a grant from an action name and a resource name.
    pub fn new(action: impl Into<String>, resource: impl Into<String>) -> AppResult<Self> {
        let action = action.into().trim().to_owned();
        let resource = resource.into().trim().to_owned();

        if action.is_empty() || resource.is_empty() {
            return Err(AppError::Validation(
                "permission grants require a non-empty action and resource".to_owned(),
            ));
        }

        Ok(Self { action, resource })
    }

    pub(crate) fn from_parts(action: &'static str, resource: &'static str) -> Self {
        Self {
            action: action.to_owned(),
            resource: resource.to_owned(),
        }
    }

    /// Decodes the legacy combined `resource.action` name.
    ///
    /// The last dot separates the action, so `catalog.brands.update` reads
    /// as action `update` on resource `catalog.brands`.
    pub fn from_legacy_name(value: &str) -> AppResult<Self> {
        let Some((resource, action)) = value.trim().rsplit_once('.') else {
            return Err(AppError::Validation(format!(
                "legacy permission name '{value}' must look like 'resource.action'"
            )));
        };

        Self::new(action, resource)
    }

    /// Returns the action name.
    #[must_use]
    pub fn action(&self) -> &str {
        self.action.as_str()
    }

    /// Returns the resource name.
    #[must_use]
    pub fn resource(&self) -> &str {
        self.resource.as_str()
    }

    /// Returns whether this grant covers the requested pair.
    ///
    /// Actions match exactly; resources match under the same fold that
    /// governs resource name uniqueness.
    #[must_use]
    pub fn matches(&self, action: &str, resource: &str) -> bool {
        self.action == action.trim() && same_resource_name(&self.resource, resource)
    }

    /// Returns the legacy combined `resource.action` name.
    #[must_use]
    pub fn legacy_name(&self) -> String {
        format!("{}.{}", self.resource, self.action)
    }
}

impl Display for PermissionGrant {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{} on {}", self.action, self.resource)
    }
}

#[cfg(test)]
mod tests {
    use super::PermissionGrant;

    #[test]
    fn legacy_name_splits_on_last_dot() {
        let grant = PermissionGrant::from_legacy_name("catalog.brands.update");
        assert!(grant.as_ref().is_ok_and(|grant| grant.action() == "update"));
        assert!(grant.is_ok_and(|grant| grant.resource() == "catalog.brands"));
    }

    #[test]
    fn legacy_name_without_separator_is_rejected() {
        assert!(PermissionGrant::from_legacy_name("brands").is_err());
        assert!(PermissionGrant::from_legacy_name("brands.").is_err());
    }

    #[test]
    fn matching_ignores_resource_case_only() {
        let grant = PermissionGrant::new("update", "brands");
        assert!(grant.as_ref().is_ok_and(|grant| grant.matches("update", "Brands")));
        assert!(grant.is_ok_and(|grant| !grant.matches("Update", "brands")));
    }

    #[test]
    fn matching_folds_non_ascii_resource_names() {
        let grant = PermissionGrant::new("view", "Éclat");
        assert!(grant.as_ref().is_ok_and(|grant| grant.matches("view", "éclat")));
        assert!(grant.as_ref().is_ok_and(|grant| grant.matches("view", "ÉCLAT")));
        assert!(grant.is_ok_and(|grant| !grant.matches("view", "eclat")));
    }
}
