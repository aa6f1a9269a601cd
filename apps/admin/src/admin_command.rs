use atelier_core::{AppError, UserId};
use atelier_domain::PermissionGrant;

pub const USAGE: &str = "usage: atelier-admin <migrate | bootstrap <user-id> | priority <user-id> | permissions <user-id> | check <user-id> <action> <resource> | check <user-id> <resource.action>>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    Migrate,
    Bootstrap(UserId),
    Priority(UserId),
    Permissions(UserId),
    Check {
        user_id: UserId,
        grant: PermissionGrant,
    },
}

impl AdminCommand {
    pub fn parse(arguments: impl IntoIterator<Item = String>) -> Result<Self, AppError> {
        let arguments: Vec<String> = arguments.into_iter().collect();
        let arguments: Vec<&str> = arguments.iter().map(String::as_str).collect();

        match arguments.as_slice() {
            ["migrate"] => Ok(Self::Migrate),
            ["bootstrap", user_id] => Ok(Self::Bootstrap(UserId::parse(user_id)?)),
            ["priority", user_id] => Ok(Self::Priority(UserId::parse(user_id)?)),
            ["permissions", user_id] => Ok(Self::Permissions(UserId::parse(user_id)?)),
            ["check", user_id, action, resource] => Ok(Self::Check {
                user_id: UserId::parse(user_id)?,
                grant: PermissionGrant::new(*action, *resource)?,
            }),
            ["check", user_id, legacy_name] => Ok(Self::Check {
                user_id: UserId::parse(user_id)?,
                grant: PermissionGrant::from_legacy_name(legacy_name)?,
            }),
            _ => Err(AppError::Validation(USAGE.to_owned())),
        }
    }
}
