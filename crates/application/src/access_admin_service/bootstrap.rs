use super::*;

use atelier_domain::PermissionGrant;

impl AccessAdminService {
    /// Makes `user_id` a holder of the `super_admin` role.
    ///
    /// Creates the admin catalogue records and the role on first use and is
    /// idempotent afterwards. This is the only path that assigns a role
    /// without an assigner, so it must stay behind operator tooling.
    pub async fn bootstrap_super_admin(
        &self,
        user_id: UserId,
    ) -> AppResult<MutationOutcome<RoleDefinition>> {
        if self.repository.find_user(user_id).await?.is_none() {
            return Err(AppError::NotFound(format!("user '{user_id}' was not found")));
        }

        let grants: Vec<PermissionGrant> = AdminPermission::all()
            .iter()
            .map(AdminPermission::grant)
            .collect();

        let role = self
            .repository
            .bootstrap_super_admin(user_id, &grants)
            .await?;

        let tags = [
            CacheTag::Roles,
            CacheTag::Role(role.role_id),
            CacheTag::Permissions,
            CacheTag::Resources,
            CacheTag::Users,
            CacheTag::User(user_id),
        ];
        Ok(self
            .finish(user_id, "bootstrap_super_admin", role.name.clone(), role, tags)
            .await)
    }
}
