use chrono::{Duration, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use atelier_application::{
    AccessAdminRepository, AuthorizationRepository, NewPermission, NewRole, NewRoleAssignment,
    RoleChanges, RoleGrantInput,
};
use atelier_core::{AppError, ReasonCode, UserId};
use atelier_domain::{
    AdminPermission, PermissionGrant, PermissionName, Priority, ResourceName, RoleId, RoleName,
};

use super::PostgresAccessControlRepository;
use super::assignments::missing_assignment_reference;
use crate::MIGRATOR;

async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    if let Err(error) = MIGRATOR.run(&pool).await {
        panic!("failed to run migrations for access control repository tests: {error}");
    }

    Some(pool)
}

async fn ensure_user(pool: &PgPool) -> UserId {
    let user_id = UserId::new();
    let insert = sqlx::query(
        r#"
            INSERT INTO users (id, name, email, email_verified)
            VALUES ($1, $2, $3, true)
            "#,
    )
    .bind(user_id.as_uuid())
    .bind(format!("user-{user_id}"))
    .bind(format!("{user_id}@example.test"))
    .execute(pool)
    .await;

    assert!(insert.is_ok());
    user_id
}

fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

fn priority(value: i32) -> Priority {
    match Priority::new(value) {
        Ok(priority) => priority,
        Err(error) => panic!("invalid test priority: {error}"),
    }
}

async fn create_role(
    repository: &PostgresAccessControlRepository,
    priority_value: i32,
) -> atelier_application::RoleDefinition {
    let name = match RoleName::new(unique("role")) {
        Ok(name) => name,
        Err(error) => panic!("invalid role name: {error}"),
    };
    match repository
        .create_role(NewRole {
            name,
            priority: priority(priority_value),
            created_by: None,
        })
        .await
    {
        Ok(role) => role,
        Err(error) => panic!("failed to create role: {error}"),
    }
}

async fn create_resource(
    repository: &PostgresAccessControlRepository,
    name: &str,
) -> atelier_application::ResourceDefinition {
    let name = match ResourceName::new(name) {
        Ok(name) => name,
        Err(error) => panic!("invalid resource name: {error}"),
    };
    match repository.create_resource(name).await {
        Ok(resource) => resource,
        Err(error) => panic!("failed to create resource: {error}"),
    }
}

#[tokio::test]
async fn resource_names_are_unique_ignoring_case() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresAccessControlRepository::new(pool);
    let name = unique("brands");

    create_resource(&repository, name.as_str()).await;

    let duplicate = match ResourceName::new(name.to_uppercase()) {
        Ok(name) => repository.create_resource(name).await,
        Err(error) => panic!("invalid resource name: {error}"),
    };
    assert!(duplicate.is_err_and(|error| error.reason_code() == ReasonCode::Duplicate));

    let found = repository.find_resource_by_name(&name.to_uppercase()).await;
    assert!(found.is_ok_and(|resource| resource.is_some()));
}

#[tokio::test]
async fn stale_expected_priority_is_rejected() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresAccessControlRepository::new(pool.clone());
    let actor = ensure_user(&pool).await;
    let role = create_role(&repository, 50).await;

    let stale = repository
        .update_role(
            role.role_id,
            RoleChanges {
                name: None,
                priority: Some(priority(40)),
                expected_priority: priority(45),
                updated_by: actor,
            },
        )
        .await;
    assert!(stale.is_err_and(|error| error.reason_code() == ReasonCode::Duplicate));

    let current = repository
        .update_role(
            role.role_id,
            RoleChanges {
                name: None,
                priority: Some(priority(40)),
                expected_priority: priority(50),
                updated_by: actor,
            },
        )
        .await;
    assert!(current.is_ok_and(|role| role.priority.value() == 40 && role.updated_by == Some(actor)));
}

#[tokio::test]
async fn guarded_writes_reject_stale_role_priority() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresAccessControlRepository::new(pool.clone());
    let user_id = ensure_user(&pool).await;
    let role = create_role(&repository, 50).await;
    let stale = priority(45);

    let assigned = repository
        .insert_role_assignment(NewRoleAssignment {
            user_id,
            role_id: role.role_id,
            assigned_by: None,
            expires_at: None,
            expected_role_priority: stale,
            as_of: Utc::now(),
        })
        .await;
    assert!(assigned.is_err_and(|error| error.reason_code() == ReasonCode::Duplicate));

    let cleared = repository.clear_role_grants(role.role_id, stale).await;
    assert!(cleared.is_err_and(|error| error.reason_code() == ReasonCode::Duplicate));

    let deleted = repository.delete_role(role.role_id, stale).await;
    assert!(deleted.is_err_and(|error| error.reason_code() == ReasonCode::Duplicate));

    let assignments = repository
        .list_user_role_assignments(user_id)
        .await
        .unwrap_or_default();
    assert!(assignments.is_empty());

    let deleted = repository.delete_role(role.role_id, role.priority).await;
    assert!(deleted.is_ok());
}

#[tokio::test]
async fn assignment_for_unknown_user_is_not_found() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresAccessControlRepository::new(pool);
    let role = create_role(&repository, 50).await;

    let assigned = repository
        .insert_role_assignment(NewRoleAssignment {
            user_id: UserId::new(),
            role_id: role.role_id,
            assigned_by: None,
            expires_at: None,
            expected_role_priority: role.priority,
            as_of: Utc::now(),
        })
        .await;
    assert!(assigned.is_err_and(|error| error.reason_code() == ReasonCode::NotFound));
}

#[test]
fn missing_assignment_reference_names_the_deleted_row() {
    let assignment = NewRoleAssignment {
        user_id: UserId::new(),
        role_id: match RoleId::new(9) {
            Ok(role_id) => role_id,
            Err(error) => panic!("invalid role id: {error}"),
        },
        assigned_by: None,
        expires_at: None,
        expected_role_priority: priority(50),
        as_of: Utc::now(),
    };

    let role = missing_assignment_reference(Some("user_roles_role_id_fkey"), &assignment);
    assert!(matches!(role, AppError::NotFound(ref message) if message.contains("role '9'")));

    let user = missing_assignment_reference(Some("user_roles_user_id_fkey"), &assignment);
    assert_eq!(user.reason_code(), ReasonCode::NotFound);
    assert!(user.to_string().contains(&assignment.user_id.to_string()));
}

#[tokio::test]
async fn role_with_assignment_is_protected_from_delete() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresAccessControlRepository::new(pool.clone());
    let user_id = ensure_user(&pool).await;
    let role = create_role(&repository, 70).await;

    let assigned = repository
        .insert_role_assignment(NewRoleAssignment {
            user_id,
            role_id: role.role_id,
            assigned_by: None,
            expires_at: Some(Utc::now() - Duration::hours(1)),
            expected_role_priority: role.priority,
            as_of: Utc::now(),
        })
        .await;
    assert!(assigned.is_ok());

    let deleted = repository.delete_role(role.role_id, role.priority).await;
    assert!(matches!(
        deleted,
        Err(AppError::HasDependents { ref relation, count: 1, .. }) if relation == "user_roles"
    ));

    let still_there = repository.find_role(role.role_id).await;
    assert!(still_there.is_ok_and(|role| role.is_some()));
}

#[tokio::test]
async fn expired_assignment_is_inert_and_replaceable() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresAccessControlRepository::new(pool.clone());
    let user_id = ensure_user(&pool).await;
    let role = create_role(&repository, 60).await;
    let now = Utc::now();

    let expired = repository
        .insert_role_assignment(NewRoleAssignment {
            user_id,
            role_id: role.role_id,
            assigned_by: None,
            expires_at: Some(now - Duration::hours(1)),
            expected_role_priority: role.priority,
            as_of: now,
        })
        .await;
    assert!(expired.is_ok());

    let priorities = repository.list_active_role_priorities(user_id, now).await;
    assert!(priorities.is_ok_and(|priorities| priorities.is_empty()));

    let renewed = repository
        .insert_role_assignment(NewRoleAssignment {
            user_id,
            role_id: role.role_id,
            assigned_by: None,
            expires_at: None,
            expected_role_priority: role.priority,
            as_of: now,
        })
        .await;
    assert!(renewed.is_ok_and(|assignment| assignment.expires_at.is_none()));

    let duplicate = repository
        .insert_role_assignment(NewRoleAssignment {
            user_id,
            role_id: role.role_id,
            assigned_by: None,
            expires_at: None,
            expected_role_priority: role.priority,
            as_of: now,
        })
        .await;
    assert!(duplicate.is_err_and(|error| error.reason_code() == ReasonCode::Duplicate));

    let priorities = repository.list_active_role_priorities(user_id, now).await;
    assert!(priorities.is_ok_and(|priorities| priorities == vec![priority(60)]));
}

#[tokio::test]
async fn permission_delete_cascades_through_grants() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresAccessControlRepository::new(pool.clone());
    let user_id = ensure_user(&pool).await;
    let role = create_role(&repository, 50).await;
    let brands = create_resource(&repository, unique("brands").as_str()).await;
    let types = create_resource(&repository, unique("types").as_str()).await;
    let action = unique("update");

    let permission = match PermissionName::new(action.as_str()) {
        Ok(name) => repository
            .create_permission(NewPermission {
                name,
                resource_ids: vec![brands.resource_id, types.resource_id],
            })
            .await,
        Err(error) => panic!("invalid permission name: {error}"),
    };
    let permission = match permission {
        Ok(permission) => permission,
        Err(error) => panic!("failed to create permission: {error}"),
    };
    assert_eq!(permission.resources.len(), 2);

    let grants = repository
        .replace_role_grants(
            role.role_id,
            role.priority,
            vec![
                RoleGrantInput {
                    permission_id: permission.permission_id,
                    resource_id: brands.resource_id,
                },
                RoleGrantInput {
                    permission_id: permission.permission_id,
                    resource_id: types.resource_id,
                },
            ],
        )
        .await;
    assert!(grants.is_ok_and(|grants| grants.len() == 2));

    let assigned = repository
        .insert_role_assignment(NewRoleAssignment {
            user_id,
            role_id: role.role_id,
            assigned_by: None,
            expires_at: None,
            expected_role_priority: role.priority,
            as_of: Utc::now(),
        })
        .await;
    assert!(assigned.is_ok());

    let allowed = repository
        .user_has_permission_grant(user_id, action.as_str(), &brands.name.to_uppercase(), Utc::now())
        .await;
    assert!(allowed.is_ok_and(|allowed| allowed));

    let blocked = repository.delete_resource(brands.resource_id).await;
    assert!(blocked.is_err_and(|error| error.reason_code() == ReasonCode::HasDependents));

    let deletion = repository.delete_permission(permission.permission_id).await;
    assert!(deletion.is_ok_and(|deletion| {
        deletion.removed_resource_permissions == 2 && deletion.removed_role_permissions == 2
    }));

    let allowed = repository
        .user_has_permission_grant(user_id, action.as_str(), brands.name.as_str(), Utc::now())
        .await;
    assert!(allowed.is_ok_and(|allowed| !allowed));

    let grants = repository.list_role_grants(role.role_id).await;
    assert!(grants.is_ok_and(|grants| grants.is_empty()));
}

#[tokio::test]
async fn resource_replacement_keeps_grants_on_retained_pairs() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresAccessControlRepository::new(pool);
    let role = create_role(&repository, 50).await;
    let brands = create_resource(&repository, unique("brands").as_str()).await;
    let types = create_resource(&repository, unique("types").as_str()).await;

    let permission = match PermissionName::new(unique("publish")) {
        Ok(name) => repository
            .create_permission(NewPermission {
                name,
                resource_ids: vec![brands.resource_id, types.resource_id],
            })
            .await,
        Err(error) => panic!("invalid permission name: {error}"),
    };
    let permission = match permission {
        Ok(permission) => permission,
        Err(error) => panic!("failed to create permission: {error}"),
    };

    let granted = repository
        .replace_role_grants(
            role.role_id,
            role.priority,
            vec![
                RoleGrantInput {
                    permission_id: permission.permission_id,
                    resource_id: brands.resource_id,
                },
                RoleGrantInput {
                    permission_id: permission.permission_id,
                    resource_id: types.resource_id,
                },
            ],
        )
        .await;
    assert!(granted.is_ok());

    let replacement = repository
        .replace_permission_resources(permission.permission_id, vec![brands.resource_id])
        .await;
    assert!(replacement.is_ok_and(|replacement| {
        replacement.added == 0 && replacement.removed == 1 && replacement.removed_role_permissions == 1
    }));

    let again = repository
        .replace_permission_resources(permission.permission_id, vec![brands.resource_id])
        .await;
    assert!(again.is_ok_and(|replacement| {
        replacement.added == 0 && replacement.removed == 0 && replacement.permission.resources.len() == 1
    }));

    let grants = repository.list_role_grants(role.role_id).await;
    assert!(grants.is_ok_and(|grants| {
        grants.len() == 1 && grants[0].resource_id == brands.resource_id
    }));
}

#[tokio::test]
async fn bootstrap_grants_catalogue_idempotently() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresAccessControlRepository::new(pool.clone());
    let user_id = ensure_user(&pool).await;
    let grants: Vec<PermissionGrant> = AdminPermission::all()
        .iter()
        .map(AdminPermission::grant)
        .collect();

    let first = repository.bootstrap_super_admin(user_id, &grants).await;
    let second = repository.bootstrap_super_admin(user_id, &grants).await;
    assert!(first.is_ok_and(|role| role.priority.value() == 1));
    assert!(second.is_ok());

    let resolved = repository
        .list_permission_grants_for_user(user_id, Utc::now())
        .await
        .unwrap_or_default();
    for grant in &grants {
        assert!(resolved.contains(grant), "missing bootstrap grant {grant}");
    }
}

#[tokio::test]
async fn bootstrap_clears_expiry_of_held_super_admin_role() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repository = PostgresAccessControlRepository::new(pool.clone());
    let user_id = ensure_user(&pool).await;

    let role = match repository.bootstrap_super_admin(user_id, &[]).await {
        Ok(role) => role,
        Err(error) => panic!("failed to bootstrap: {error}"),
    };

    let expiring = sqlx::query(
        r#"
            UPDATE user_roles
            SET expires_at = now() + interval '1 hour'
            WHERE user_id = $1
                AND role_id = $2
            "#,
    )
    .bind(user_id.as_uuid())
    .bind(role.role_id.value())
    .execute(&pool)
    .await;
    assert!(expiring.is_ok());

    assert!(repository.bootstrap_super_admin(user_id, &[]).await.is_ok());

    let assignments = repository
        .list_user_role_assignments(user_id)
        .await
        .unwrap_or_default();
    assert!(assignments.iter().any(|assignment| {
        assignment.role_id == role.role_id
            && assignment.expires_at.is_none()
            && assignment.assigned_by.is_none()
    }));
}
