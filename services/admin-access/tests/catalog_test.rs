//! 目录服务集成测试

mod common;

use std::collections::BTreeSet;

use admin_access::application::catalog::{
    CatalogService, CreatePermissionCommand, CreateRoleCommand, UpdatePermissionCommand,
    UpdateRoleCommand,
};
use admin_access::domain::role::Permission;
use bastion_errors::AppError;
use common::Catalog;

fn service(catalog: &Catalog) -> CatalogService {
    CatalogService::new(catalog.factory.clone())
}

fn codes(permissions: &[Permission]) -> BTreeSet<String> {
    permissions.iter().map(|p| p.code.clone()).collect()
}

#[tokio::test]
async fn test_grant_is_idempotent() {
    let catalog = Catalog::seeded().await;
    let service = service(&catalog);
    let moderator = catalog.role("moderator");
    let delete_media = catalog.permission_id("delete_media").await;

    assert!(
        service
            .grant_permission(&catalog.actor("admin"), &moderator, &delete_media)
            .await
            .unwrap()
    );
    let once = service.granted_permissions(&moderator).await.unwrap();

    assert!(
        !service
            .grant_permission(&catalog.actor("admin"), &moderator, &delete_media)
            .await
            .unwrap()
    );
    let twice = service.granted_permissions(&moderator).await.unwrap();

    assert_eq!(once, twice);
    assert_eq!(service.role_count(&delete_media).await.unwrap(), 3);
}

#[tokio::test]
async fn test_cannot_delegate_outside_own_grants() {
    let catalog = Catalog::seeded().await;
    let service = service(&catalog);
    let editor = catalog.role("editor");
    let manage_roles = catalog.permission_id("manage_roles").await;
    let manage_users = catalog.permission_id("manage_users").await;

    service
        .grant_permission(&catalog.actor("admin"), &editor, &manage_roles)
        .await
        .unwrap();

    for target in ["moderator", "user"] {
        let err = service
            .grant_permission(&catalog.actor("editor"), &catalog.role(target), &manage_users)
            .await
            .unwrap_err();
        assert!(err.is_forbidden(), "{:?}", err);
    }

    let moderator_grants = service
        .granted_permissions(&catalog.role("moderator"))
        .await
        .unwrap();
    assert!(!codes(&moderator_grants).contains("manage_users"));
}

#[tokio::test]
async fn test_cannot_grant_to_unmanageable_role() {
    let catalog = Catalog::seeded().await;
    let service = service(&catalog);
    let view_blogs = catalog.permission_id("view_blogs").await;

    // 同级与更高角色都不可管理
    for target in ["editor", "admin", "developer"] {
        let err = service
            .grant_permission(&catalog.actor("editor"), &catalog.role(target), &view_blogs)
            .await
            .unwrap_err();
        assert!(err.is_forbidden());
    }
}

#[tokio::test]
async fn test_granted_permissions_round_trip() {
    let catalog = Catalog::seeded().await;
    let service = service(&catalog);

    let granted = service.granted_permissions(&catalog.role("editor")).await.unwrap();
    let json = serde_json::to_string(&granted).unwrap();
    let reloaded: Vec<Permission> = serde_json::from_str(&json).unwrap();

    assert_eq!(reloaded, granted);
    assert_eq!(codes(&reloaded).len(), 18);
}

#[tokio::test]
async fn test_delete_role_in_use_conflicts() {
    let catalog = Catalog::seeded().await;
    let service = service(&catalog);
    let moderator = catalog.role("moderator");

    let err = service
        .delete_role(&catalog.actor("admin"), &moderator)
        .await
        .unwrap_err();
    assert!(err.is_conflict());
    assert!(service.role_by_id(&moderator).await.is_ok());
    assert_eq!(service.principal_count(&moderator).await.unwrap(), 1);
}

#[tokio::test]
async fn test_delete_unused_role_cascades_grants() {
    let catalog = Catalog::seeded().await;
    let service = service(&catalog);
    let admin = catalog.actor("admin");

    let role = service
        .create_role(
            &admin,
            CreateRoleCommand {
                code: "support".into(),
                name: "Support".into(),
                description: None,
                priority: 40,
            },
        )
        .await
        .unwrap();
    let view_contacts = catalog.permission_id("view_contacts").await;
    service.grant_permission(&admin, &role.id, &view_contacts).await.unwrap();

    service.delete_role(&admin, &role.id).await.unwrap();

    assert!(matches!(
        service.role_by_id(&role.id).await,
        Err(AppError::NotFound(_))
    ));
    assert_eq!(service.role_count(&view_contacts).await.unwrap(), 4);
}

#[tokio::test]
async fn test_delete_held_permission_conflicts() {
    let catalog = Catalog::seeded().await;
    let service = service(&catalog);
    let developer = catalog.actor("developer");

    let view_jobs = catalog.permission_id("view_jobs").await;
    let err = service.delete_permission(&developer, &view_jobs).await.unwrap_err();
    assert!(err.is_conflict());

    let fresh = service
        .create_permission(
            &developer,
            CreatePermissionCommand {
                code: "export_reports".into(),
                name: "Export reports".into(),
                description: None,
                category: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(fresh.category, "other");
    service.delete_permission(&developer, &fresh.id).await.unwrap();
}

#[tokio::test]
async fn test_permission_catalog_limited_to_top_two_roles() {
    let catalog = Catalog::seeded().await;
    let service = service(&catalog);
    let cmd = |code: &str| CreatePermissionCommand {
        code: code.into(),
        name: "Manage invoices".into(),
        description: None,
        category: Some("billing".into()),
    };

    let err = service
        .create_permission(&catalog.actor("editor"), cmd("manage_invoices"))
        .await
        .unwrap_err();
    assert!(err.is_forbidden());

    service
        .create_permission(&catalog.actor("admin"), cmd("manage_invoices"))
        .await
        .unwrap();

    let err = service
        .create_permission(&catalog.actor("developer"), cmd("manage_invoices"))
        .await
        .unwrap_err();
    assert!(err.is_conflict());

    let grouped = service.permissions_by_category().await.unwrap();
    assert_eq!(grouped["billing"].len(), 1);
    assert_eq!(grouped["users"].len(), 3);
}

#[tokio::test]
async fn test_system_roles_are_protected() {
    let catalog = Catalog::seeded().await;
    let service = service(&catalog);
    let user_role = catalog.role("user");

    let err = service
        .delete_role(&catalog.actor("admin"), &user_role)
        .await
        .unwrap_err();
    assert!(err.is_forbidden());

    let mut rename = UpdateRoleCommand::new(user_role);
    rename.code = Some("member".into());
    let err = service
        .update_role(&catalog.actor("admin"), rename)
        .await
        .unwrap_err();
    assert!(err.is_forbidden());

    let mut deactivate = UpdateRoleCommand::new(catalog.role("developer"));
    deactivate.is_active = Some(false);
    let err = service
        .update_role(&catalog.actor("developer"), deactivate)
        .await
        .unwrap_err();
    assert!(err.is_forbidden());
}

#[tokio::test]
async fn test_role_priority_rules() {
    let catalog = Catalog::seeded().await;
    let service = service(&catalog);
    let role = |code: &str, priority| CreateRoleCommand {
        code: code.into(),
        name: code.into(),
        description: None,
        priority,
    };

    let err = service
        .create_role(&catalog.actor("editor"), role("lead", 70))
        .await
        .unwrap_err();
    assert!(err.is_forbidden());

    let err = service
        .create_role(&catalog.actor("developer"), role("root", 1000))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = service
        .create_role(&catalog.actor("developer"), role("zero", 0))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let lead = service
        .create_role(&catalog.actor("editor"), role("lead", 60))
        .await
        .unwrap();

    let mut raise = UpdateRoleCommand::new(lead.id);
    raise.priority = Some(80);
    let err = service
        .update_role(&catalog.actor("editor"), raise)
        .await
        .unwrap_err();
    assert!(err.is_forbidden());

    let mut lower_apex = UpdateRoleCommand::new(catalog.role("developer"));
    lower_apex.priority = Some(100);
    let err = service
        .update_role(&catalog.actor("developer"), lower_apex)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_manageable_roles_scenario() {
    let catalog = Catalog::seeded().await;
    let service = service(&catalog);

    let editor_view: Vec<String> = service
        .manageable_roles(&catalog.actor("editor"))
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.code)
        .collect();
    assert_eq!(editor_view, ["moderator", "user"]);

    let apex_view: Vec<String> = service
        .manageable_roles(&catalog.actor("developer"))
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.code)
        .collect();
    assert_eq!(apex_view, ["developer", "admin", "editor", "moderator", "user"]);

    let admin_view = service.manageable_roles(&catalog.actor("admin")).await.unwrap();
    assert!(admin_view.iter().all(|r| r.code != "developer"));
}

#[tokio::test]
async fn test_set_role_permissions_keeps_grants_outside_closure() {
    let catalog = Catalog::seeded().await;
    let service = service(&catalog);
    let moderator = catalog.role("moderator");
    let view_blogs = catalog.permission_id("view_blogs").await;

    let granted = service
        .set_role_permissions(&catalog.actor("editor"), &moderator, &[view_blogs])
        .await
        .unwrap();

    let expected: BTreeSet<String> = ["edit_own_blog", "manage_contacts", "view_blogs"]
        .into_iter()
        .map(String::from)
        .collect();
    assert_eq!(codes(&granted), expected);
}

#[tokio::test]
async fn test_set_role_permissions_rejects_foreign_selection() {
    let catalog = Catalog::seeded().await;
    let service = service(&catalog);
    let moderator = catalog.role("moderator");
    let before = service.granted_permissions(&moderator).await.unwrap();

    let selection = [
        catalog.permission_id("view_blogs").await,
        catalog.permission_id("manage_users").await,
    ];
    let err = service
        .set_role_permissions(&catalog.actor("editor"), &moderator, &selection)
        .await
        .unwrap_err();

    assert!(err.is_forbidden());
    assert_eq!(service.granted_permissions(&moderator).await.unwrap(), before);
}

#[tokio::test]
async fn test_inactive_role_holds_nothing() {
    let catalog = Catalog::seeded().await;
    let service = service(&catalog);
    let editor = catalog.role("editor");
    assert!(service.has_permission(&editor, "publish_blog").await.unwrap());

    let mut deactivate = UpdateRoleCommand::new(editor);
    deactivate.is_active = Some(false);
    service
        .update_role(&catalog.actor("admin"), deactivate)
        .await
        .unwrap();

    assert!(!service.has_permission(&editor, "publish_blog").await.unwrap());
}

#[tokio::test]
async fn test_unknown_actor_is_unauthenticated() {
    let catalog = Catalog::seeded().await;
    let service = service(&catalog);

    let err = service
        .manageable_roles(&bastion_common::PrincipalId::new())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthenticated(_)));
}

#[tokio::test]
async fn test_roles_listed_by_priority() {
    let catalog = Catalog::seeded().await;
    let service = service(&catalog);

    let codes: Vec<String> = service
        .roles_by_priority_desc()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.code)
        .collect();
    assert_eq!(codes, vec!["developer", "admin", "editor", "moderator", "user"]);

    let editor = service.role_by_code("editor").await.unwrap();
    assert_eq!(editor.id, catalog.role("editor"));
    assert_eq!(editor.priority, 70);
    assert!(matches!(
        service.role_by_code("missing").await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_deactivated_permission_cannot_be_delegated() {
    let catalog = Catalog::seeded().await;
    let service = service(&catalog);
    let admin = catalog.actor("admin");
    let manage_users = catalog.permission_id("manage_users").await;

    let mut retire = UpdatePermissionCommand::new(manage_users);
    retire.is_active = Some(false);
    service
        .update_permission(&catalog.actor("developer"), retire)
        .await
        .unwrap();

    assert!(!service.has_permission(&catalog.role("admin"), "manage_users").await.unwrap());
    let assignable = service.assignable_permissions(&admin).await.unwrap();
    assert!(!codes(&assignable).contains("manage_users"));

    let err = service
        .grant_permission(&admin, &catalog.role("editor"), &manage_users)
        .await
        .unwrap_err();
    assert!(err.is_forbidden(), "{:?}", err);

    let err = service
        .set_role_permissions(&admin, &catalog.role("editor"), &[manage_users])
        .await
        .unwrap_err();
    assert!(err.is_forbidden(), "{:?}", err);
    let editor_grants = service
        .granted_permissions(&catalog.role("editor"))
        .await
        .unwrap();
    assert!(!codes(&editor_grants).contains("manage_users"));
}
