//! Port fakes shared by the service tests.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use atelier_core::{AppError, AppResult, UserId, UserIdentity};
use atelier_domain::{
    CacheTag, PermissionGrant, PermissionId, PermissionName, Priority, ResourceId, ResourceName,
    RoleId, SUPER_ADMIN_PRIORITY, SUPER_ADMIN_ROLE_NAME, is_assignment_active, same_resource_name,
};

use crate::{
    AccessAdminRepository, AuthorizationRepository, CacheInvalidator, NewPermission, NewRole,
    NewRoleAssignment, PermissionDefinition, PermissionDeletion, ResourceDefinition,
    ResourceReference, ResourceReplacement, RoleChanges, RoleDefinition, RoleGrant,
    RoleGrantInput, RoleOverview, UserAccount, UserRoleAssignment,
};

#[derive(Default)]
pub(crate) struct FakeStore {
    pub(crate) users: Vec<UserAccount>,
    pub(crate) roles: Vec<RoleDefinition>,
    pub(crate) permissions: Vec<(PermissionId, String)>,
    pub(crate) resources: Vec<(ResourceId, String)>,
    pub(crate) pairs: Vec<(PermissionId, ResourceId)>,
    pub(crate) grants: Vec<(RoleId, PermissionId, ResourceId)>,
    pub(crate) assignments: Vec<UserRoleAssignment>,
    next_id: i64,
}

impl FakeStore {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn role(&self, role_id: RoleId) -> AppResult<RoleDefinition> {
        self.roles
            .iter()
            .find(|role| role.role_id == role_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' was not found")))
    }

    fn role_at(&self, role_id: RoleId, expected: Priority) -> AppResult<RoleDefinition> {
        let role = self.role(role_id)?;
        if role.priority != expected {
            return Err(AppError::Conflict(format!(
                "role '{role_id}' changed priority concurrently"
            )));
        }
        Ok(role)
    }

    fn resource_named(&self, name: &str) -> Option<ResourceId> {
        self.resources
            .iter()
            .find(|(_, stored)| same_resource_name(stored, name))
            .map(|(resource_id, _)| *resource_id)
    }

    fn permission(&self, permission_id: PermissionId) -> AppResult<PermissionDefinition> {
        let (_, name) = self
            .permissions
            .iter()
            .find(|(id, _)| *id == permission_id)
            .ok_or_else(|| {
                AppError::NotFound(format!("permission '{permission_id}' was not found"))
            })?;

        let mut resources: Vec<ResourceReference> = self
            .pairs
            .iter()
            .filter(|(id, _)| *id == permission_id)
            .filter_map(|(_, resource_id)| {
                self.resources
                    .iter()
                    .find(|(id, _)| id == resource_id)
                    .map(|(id, name)| ResourceReference {
                        resource_id: *id,
                        name: name.clone(),
                    })
            })
            .collect();
        resources.sort_by(|left, right| left.name.cmp(&right.name));

        Ok(PermissionDefinition {
            permission_id,
            name: name.clone(),
            resources,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
    }

    fn resource(&self, resource_id: ResourceId) -> AppResult<ResourceDefinition> {
        let (_, name) = self
            .resources
            .iter()
            .find(|(id, _)| *id == resource_id)
            .ok_or_else(|| AppError::NotFound(format!("resource '{resource_id}' was not found")))?;

        Ok(ResourceDefinition {
            resource_id,
            name: name.clone(),
            permission_count: self
                .pairs
                .iter()
                .filter(|(_, id)| *id == resource_id)
                .count() as u64,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
    }

    fn grants_for(&self, user_id: UserId, as_of: DateTime<Utc>) -> Vec<PermissionGrant> {
        let active_roles: BTreeSet<RoleId> = self
            .assignments
            .iter()
            .filter(|assignment| assignment.user_id == user_id && assignment.is_active_at(as_of))
            .map(|assignment| assignment.role_id)
            .collect();

        self.grants
            .iter()
            .filter(|(role_id, _, _)| active_roles.contains(role_id))
            .filter_map(|(_, permission_id, resource_id)| {
                let action = self.permissions.iter().find(|(id, _)| id == permission_id)?;
                let resource = self.resources.iter().find(|(id, _)| id == resource_id)?;
                PermissionGrant::new(action.1.clone(), resource.1.clone()).ok()
            })
            .collect()
    }

    fn role_grants(&self, role_id: RoleId) -> Vec<RoleGrant> {
        let mut grants: Vec<RoleGrant> = self
            .grants
            .iter()
            .filter(|(id, _, _)| *id == role_id)
            .filter_map(|(_, permission_id, resource_id)| {
                let permission = self.permissions.iter().find(|(id, _)| id == permission_id)?;
                let resource = self.resources.iter().find(|(id, _)| id == resource_id)?;
                Some(RoleGrant {
                    role_id,
                    permission_id: *permission_id,
                    permission_name: permission.1.clone(),
                    resource_id: *resource_id,
                    resource_name: resource.1.clone(),
                })
            })
            .collect();
        grants.sort();
        grants
    }
}

/// In-process stand-in for both store ports.
#[derive(Default)]
pub(crate) struct FakeAccessRepository {
    pub(crate) store: Mutex<FakeStore>,
}

impl FakeAccessRepository {
    pub(crate) async fn add_user(&self, name: &str) -> UserIdentity {
        let user_id = UserId::new();
        self.store.lock().await.users.push(UserAccount {
            user_id,
            name: name.to_owned(),
            email: format!("{name}@example.test"),
            email_verified: true,
        });
        UserIdentity::new(user_id, name, Some(format!("{name}@example.test")))
    }

    pub(crate) async fn add_role(&self, name: &str, priority: i32) -> RoleId {
        let mut store = self.store.lock().await;
        let role_id = id(RoleId::new(store.next_id()));
        store.roles.push(RoleDefinition {
            role_id,
            name: name.to_owned(),
            priority: test_priority(priority),
            created_by: None,
            updated_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        });
        role_id
    }

    pub(crate) async fn add_assignment(
        &self,
        user_id: UserId,
        role_id: RoleId,
        expires_at: Option<DateTime<Utc>>,
    ) {
        let mut store = self.store.lock().await;
        let role = match store.role(role_id) {
            Ok(role) => role,
            Err(error) => panic!("unknown test role: {error}"),
        };
        store.assignments.push(UserRoleAssignment {
            user_id,
            role_id,
            role_name: role.name,
            role_priority: role.priority,
            assigned_by: None,
            expires_at,
            created_at: Utc::now(),
        });
    }

    /// Grants `action` on `resource` to a role, creating both records on demand.
    pub(crate) async fn add_grant(&self, role_id: RoleId, action: &str, resource: &str) {
        let mut store = self.store.lock().await;
        let existing_permission = store
            .permissions
            .iter()
            .find(|(_, name)| name == action)
            .map(|(permission_id, _)| *permission_id);
        let permission_id = match existing_permission {
            Some(permission_id) => permission_id,
            None => {
                let permission_id = id(PermissionId::new(store.next_id()));
                store.permissions.push((permission_id, action.to_owned()));
                permission_id
            }
        };
        let resource_id = match store.resource_named(resource) {
            Some(resource_id) => resource_id,
            None => {
                let resource_id = id(ResourceId::new(store.next_id()));
                store.resources.push((resource_id, resource.to_owned()));
                resource_id
            }
        };
        if !store.pairs.contains(&(permission_id, resource_id)) {
            store.pairs.push((permission_id, resource_id));
        }
        if !store.grants.contains(&(role_id, permission_id, resource_id)) {
            store.grants.push((role_id, permission_id, resource_id));
        }
    }

    /// Creates a user holding a role with every grant in `grants`.
    pub(crate) async fn add_actor(
        &self,
        name: &str,
        priority: i32,
        grants: &[(&str, &str)],
    ) -> UserIdentity {
        let actor = self.add_user(name).await;
        let role_id = self.add_role(&format!("{name}-role"), priority).await;
        for (action, resource) in grants {
            self.add_grant(role_id, action, resource).await;
        }
        self.add_assignment(actor.user_id(), role_id, None).await;
        actor
    }

    pub(crate) async fn role_priority(&self, role_id: RoleId) -> Option<i32> {
        self.store
            .lock()
            .await
            .role(role_id)
            .ok()
            .map(|role| role.priority.value())
    }
}

pub(crate) fn id<T>(value: AppResult<T>) -> T {
    match value {
        Ok(value) => value,
        Err(error) => panic!("invalid test id: {error}"),
    }
}

pub(crate) fn test_priority(value: i32) -> Priority {
    match Priority::new(value) {
        Ok(priority) => priority,
        Err(error) => panic!("invalid test priority: {error}"),
    }
}

#[async_trait]
impl AuthorizationRepository for FakeAccessRepository {
    async fn list_active_role_priorities(
        &self,
        user_id: UserId,
        as_of: DateTime<Utc>,
    ) -> AppResult<Vec<Priority>> {
        Ok(self
            .store
            .lock()
            .await
            .assignments
            .iter()
            .filter(|assignment| {
                assignment.user_id == user_id && is_assignment_active(assignment.expires_at, as_of)
            })
            .map(|assignment| assignment.role_priority)
            .collect())
    }

    async fn list_permission_grants_for_user(
        &self,
        user_id: UserId,
        as_of: DateTime<Utc>,
    ) -> AppResult<Vec<PermissionGrant>> {
        Ok(self.store.lock().await.grants_for(user_id, as_of))
    }

    async fn user_has_permission_grant(
        &self,
        user_id: UserId,
        action: &str,
        resource: &str,
        as_of: DateTime<Utc>,
    ) -> AppResult<bool> {
        Ok(self
            .store
            .lock()
            .await
            .grants_for(user_id, as_of)
            .iter()
            .any(|grant| grant.matches(action, resource)))
    }
}

#[async_trait]
impl AccessAdminRepository for FakeAccessRepository {
    async fn find_user(&self, user_id: UserId) -> AppResult<Option<UserAccount>> {
        Ok(self
            .store
            .lock()
            .await
            .users
            .iter()
            .find(|user| user.user_id == user_id)
            .cloned())
    }

    async fn list_roles(&self, as_of: DateTime<Utc>) -> AppResult<Vec<RoleOverview>> {
        let store = self.store.lock().await;
        let mut roles: Vec<RoleOverview> = store
            .roles
            .iter()
            .map(|role| RoleOverview {
                role: role.clone(),
                active_assignment_count: store
                    .assignments
                    .iter()
                    .filter(|assignment| {
                        assignment.role_id == role.role_id && assignment.is_active_at(as_of)
                    })
                    .count() as u64,
                grant_count: store
                    .grants
                    .iter()
                    .filter(|(role_id, _, _)| *role_id == role.role_id)
                    .count() as u64,
            })
            .collect();
        roles.sort_by(|left, right| {
            left.role
                .priority
                .cmp(&right.role.priority)
                .then_with(|| left.role.name.cmp(&right.role.name))
        });
        Ok(roles)
    }

    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<RoleDefinition>> {
        Ok(self.store.lock().await.role(role_id).ok())
    }

    async fn find_role_by_name(&self, name: &str) -> AppResult<Option<RoleDefinition>> {
        Ok(self
            .store
            .lock()
            .await
            .roles
            .iter()
            .find(|role| role.name == name)
            .cloned())
    }

    async fn create_role(&self, role: NewRole) -> AppResult<RoleDefinition> {
        let mut store = self.store.lock().await;
        if store.roles.iter().any(|stored| stored.name == role.name.as_str()) {
            return Err(AppError::Conflict(format!(
                "role '{}' already exists",
                role.name.as_str()
            )));
        }

        let created = RoleDefinition {
            role_id: RoleId::new(store.next_id())?,
            name: role.name.as_str().to_owned(),
            priority: role.priority,
            created_by: role.created_by,
            updated_by: role.created_by,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        store.roles.push(created.clone());
        Ok(created)
    }

    async fn update_role(
        &self,
        role_id: RoleId,
        changes: RoleChanges,
    ) -> AppResult<RoleDefinition> {
        let mut store = self.store.lock().await;
        store.role_at(role_id, changes.expected_priority)?;
        let Some(role) = store.roles.iter_mut().find(|role| role.role_id == role_id) else {
            return Err(AppError::NotFound(format!("role '{role_id}' was not found")));
        };

        if let Some(name) = changes.name {
            role.name = name.as_str().to_owned();
        }
        if let Some(priority) = changes.priority {
            role.priority = priority;
        }
        role.updated_by = Some(changes.updated_by);
        Ok(role.clone())
    }

    async fn delete_role(
        &self,
        role_id: RoleId,
        expected_priority: Priority,
    ) -> AppResult<RoleDefinition> {
        let mut store = self.store.lock().await;
        let role = store.role_at(role_id, expected_priority)?;
        let assignments = store
            .assignments
            .iter()
            .filter(|assignment| assignment.role_id == role_id)
            .count() as u64;
        if assignments > 0 {
            return Err(AppError::HasDependents {
                entity: format!("role '{}'", role.name),
                relation: "user_roles".to_owned(),
                count: assignments,
            });
        }
        let grants = store
            .grants
            .iter()
            .filter(|(id, _, _)| *id == role_id)
            .count() as u64;
        if grants > 0 {
            return Err(AppError::HasDependents {
                entity: format!("role '{}'", role.name),
                relation: "role_permissions".to_owned(),
                count: grants,
            });
        }

        store.roles.retain(|stored| stored.role_id != role_id);
        Ok(role)
    }

    async fn list_permissions(&self) -> AppResult<Vec<PermissionDefinition>> {
        let store = self.store.lock().await;
        store
            .permissions
            .iter()
            .map(|(permission_id, _)| store.permission(*permission_id))
            .collect()
    }

    async fn find_permission(
        &self,
        permission_id: PermissionId,
    ) -> AppResult<Option<PermissionDefinition>> {
        Ok(self.store.lock().await.permission(permission_id).ok())
    }

    async fn find_permission_by_name(
        &self,
        name: &str,
    ) -> AppResult<Option<PermissionDefinition>> {
        let store = self.store.lock().await;
        let Some((permission_id, _)) = store.permissions.iter().find(|(_, stored)| stored == name)
        else {
            return Ok(None);
        };
        store.permission(*permission_id).map(Some)
    }

    async fn create_permission(
        &self,
        permission: NewPermission,
    ) -> AppResult<PermissionDefinition> {
        let mut store = self.store.lock().await;
        for resource_id in &permission.resource_ids {
            store.resource(*resource_id)?;
        }

        let permission_id = PermissionId::new(store.next_id())?;
        store
            .permissions
            .push((permission_id, permission.name.as_str().to_owned()));
        for resource_id in permission.resource_ids {
            store.pairs.push((permission_id, resource_id));
        }
        store.permission(permission_id)
    }

    async fn rename_permission(
        &self,
        permission_id: PermissionId,
        name: PermissionName,
    ) -> AppResult<PermissionDefinition> {
        let mut store = self.store.lock().await;
        let Some(entry) = store
            .permissions
            .iter_mut()
            .find(|(id, _)| *id == permission_id)
        else {
            return Err(AppError::NotFound(format!(
                "permission '{permission_id}' was not found"
            )));
        };
        entry.1 = name.as_str().to_owned();
        store.permission(permission_id)
    }

    async fn delete_permission(
        &self,
        permission_id: PermissionId,
    ) -> AppResult<PermissionDeletion> {
        let mut store = self.store.lock().await;
        let permission = store.permission(permission_id)?;

        let grants_before = store.grants.len();
        store.grants.retain(|(_, id, _)| *id != permission_id);
        let removed_role_permissions = (grants_before - store.grants.len()) as u64;

        let pairs_before = store.pairs.len();
        store.pairs.retain(|(id, _)| *id != permission_id);
        let removed_resource_permissions = (pairs_before - store.pairs.len()) as u64;

        store.permissions.retain(|(id, _)| *id != permission_id);

        Ok(PermissionDeletion {
            permission_id,
            name: permission.name,
            removed_resource_permissions,
            removed_role_permissions,
        })
    }

    async fn replace_permission_resources(
        &self,
        permission_id: PermissionId,
        resource_ids: Vec<ResourceId>,
    ) -> AppResult<ResourceReplacement> {
        let mut store = self.store.lock().await;
        store.permission(permission_id)?;
        for resource_id in &resource_ids {
            store.resource(*resource_id)?;
        }

        let wanted: BTreeSet<ResourceId> = resource_ids.into_iter().collect();
        let grants_before = store.grants.len();
        store.grants.retain(|(_, id, resource_id)| {
            *id != permission_id || wanted.contains(resource_id)
        });
        let removed_role_permissions = (grants_before - store.grants.len()) as u64;

        let pairs_before = store.pairs.len();
        store
            .pairs
            .retain(|(id, resource_id)| *id != permission_id || wanted.contains(resource_id));
        let removed = (pairs_before - store.pairs.len()) as u64;

        let mut added = 0;
        for resource_id in wanted {
            if !store.pairs.contains(&(permission_id, resource_id)) {
                store.pairs.push((permission_id, resource_id));
                added += 1;
            }
        }

        Ok(ResourceReplacement {
            permission: store.permission(permission_id)?,
            added,
            removed,
            removed_role_permissions,
        })
    }

    async fn list_resources(&self) -> AppResult<Vec<ResourceDefinition>> {
        let store = self.store.lock().await;
        store
            .resources
            .iter()
            .map(|(resource_id, _)| store.resource(*resource_id))
            .collect()
    }

    async fn find_resource(
        &self,
        resource_id: ResourceId,
    ) -> AppResult<Option<ResourceDefinition>> {
        Ok(self.store.lock().await.resource(resource_id).ok())
    }

    async fn find_resource_by_name(&self, name: &str) -> AppResult<Option<ResourceDefinition>> {
        let store = self.store.lock().await;
        let Some(resource_id) = store.resource_named(name) else {
            return Ok(None);
        };
        store.resource(resource_id).map(Some)
    }

    async fn create_resource(&self, name: ResourceName) -> AppResult<ResourceDefinition> {
        let mut store = self.store.lock().await;
        let resource_id = ResourceId::new(store.next_id())?;
        store.resources.push((resource_id, name.as_str().to_owned()));
        store.resource(resource_id)
    }

    async fn rename_resource(
        &self,
        resource_id: ResourceId,
        name: ResourceName,
    ) -> AppResult<ResourceDefinition> {
        let mut store = self.store.lock().await;
        let Some(entry) = store.resources.iter_mut().find(|(id, _)| *id == resource_id) else {
            return Err(AppError::NotFound(format!(
                "resource '{resource_id}' was not found"
            )));
        };
        entry.1 = name.as_str().to_owned();
        store.resource(resource_id)
    }

    async fn delete_resource(&self, resource_id: ResourceId) -> AppResult<ResourceDefinition> {
        let mut store = self.store.lock().await;
        let resource = store.resource(resource_id)?;
        if resource.permission_count > 0 {
            return Err(AppError::HasDependents {
                entity: format!("resource '{}'", resource.name),
                relation: "resource_permissions".to_owned(),
                count: resource.permission_count,
            });
        }
        store.resources.retain(|(id, _)| *id != resource_id);
        Ok(resource)
    }

    async fn list_role_grants(&self, role_id: RoleId) -> AppResult<Vec<RoleGrant>> {
        let store = self.store.lock().await;
        store.role(role_id)?;
        Ok(store.role_grants(role_id))
    }

    async fn replace_role_grants(
        &self,
        role_id: RoleId,
        expected_priority: Priority,
        grants: Vec<RoleGrantInput>,
    ) -> AppResult<Vec<RoleGrant>> {
        let mut store = self.store.lock().await;
        store.role_at(role_id, expected_priority)?;
        for grant in &grants {
            if !store.pairs.contains(&(grant.permission_id, grant.resource_id)) {
                return Err(AppError::NotFound(format!(
                    "permission '{}' is not linked to resource '{}'",
                    grant.permission_id, grant.resource_id
                )));
            }
        }

        store.grants.retain(|(id, _, _)| *id != role_id);
        for grant in grants.into_iter().collect::<BTreeSet<_>>() {
            store
                .grants
                .push((role_id, grant.permission_id, grant.resource_id));
        }
        Ok(store.role_grants(role_id))
    }

    async fn clear_role_grants(
        &self,
        role_id: RoleId,
        expected_priority: Priority,
    ) -> AppResult<u64> {
        let mut store = self.store.lock().await;
        store.role_at(role_id, expected_priority)?;
        let before = store.grants.len();
        store.grants.retain(|(id, _, _)| *id != role_id);
        Ok((before - store.grants.len()) as u64)
    }

    async fn list_user_role_assignments(
        &self,
        user_id: UserId,
    ) -> AppResult<Vec<UserRoleAssignment>> {
        Ok(self
            .store
            .lock()
            .await
            .assignments
            .iter()
            .filter(|assignment| assignment.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn find_active_role_assignment(
        &self,
        user_id: UserId,
        role_id: RoleId,
        as_of: DateTime<Utc>,
    ) -> AppResult<Option<UserRoleAssignment>> {
        Ok(self
            .store
            .lock()
            .await
            .assignments
            .iter()
            .find(|assignment| {
                assignment.user_id == user_id
                    && assignment.role_id == role_id
                    && assignment.is_active_at(as_of)
            })
            .cloned())
    }

    async fn insert_role_assignment(
        &self,
        assignment: NewRoleAssignment,
    ) -> AppResult<UserRoleAssignment> {
        let mut store = self.store.lock().await;
        let role = store.role_at(assignment.role_id, assignment.expected_role_priority)?;
        store.assignments.retain(|stored| {
            !(stored.user_id == assignment.user_id
                && stored.role_id == assignment.role_id
                && !stored.is_active_at(assignment.as_of))
        });
        if store.assignments.iter().any(|stored| {
            stored.user_id == assignment.user_id && stored.role_id == assignment.role_id
        }) {
            return Err(AppError::Conflict(format!(
                "role '{}' is already actively assigned to user '{}'",
                role.name, assignment.user_id
            )));
        }

        let created = UserRoleAssignment {
            user_id: assignment.user_id,
            role_id: assignment.role_id,
            role_name: role.name,
            role_priority: role.priority,
            assigned_by: assignment.assigned_by,
            expires_at: assignment.expires_at,
            created_at: assignment.as_of,
        };
        store.assignments.push(created.clone());
        Ok(created)
    }

    async fn delete_role_assignment(
        &self,
        user_id: UserId,
        role_id: RoleId,
        expected_role_priority: Priority,
    ) -> AppResult<()> {
        let mut store = self.store.lock().await;
        store.role_at(role_id, expected_role_priority)?;
        let before = store.assignments.len();
        store
            .assignments
            .retain(|stored| !(stored.user_id == user_id && stored.role_id == role_id));
        if store.assignments.len() == before {
            return Err(AppError::NotFound(format!(
                "role assignment '{user_id}:{role_id}' was not found"
            )));
        }
        Ok(())
    }

    async fn bootstrap_super_admin(
        &self,
        user_id: UserId,
        grants: &[PermissionGrant],
    ) -> AppResult<RoleDefinition> {
        let existing = self.find_role_by_name(SUPER_ADMIN_ROLE_NAME).await?;
        let role_id = match existing {
            Some(role) => role.role_id,
            None => self.add_role(SUPER_ADMIN_ROLE_NAME, SUPER_ADMIN_PRIORITY).await,
        };
        for grant in grants {
            self.add_grant(role_id, grant.action(), grant.resource()).await;
        }
        self.store
            .lock()
            .await
            .assignments
            .retain(|stored| !(stored.user_id == user_id && stored.role_id == role_id));
        self.add_assignment(user_id, role_id, None).await;
        self.store.lock().await.role(role_id)
    }
}

/// Cache invalidator that records every signalled tag.
#[derive(Default)]
pub(crate) struct RecordingCacheInvalidator {
    pub(crate) tags: Mutex<Vec<CacheTag>>,
    pub(crate) unavailable: bool,
}

#[async_trait]
impl CacheInvalidator for RecordingCacheInvalidator {
    async fn invalidate(&self, tag: &CacheTag) -> AppResult<()> {
        if self.unavailable {
            return Err(AppError::Internal("cache bus unreachable".to_owned()));
        }
        self.tags.lock().await.push(*tag);
        Ok(())
    }
}
