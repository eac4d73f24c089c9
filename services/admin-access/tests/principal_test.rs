//! 主体管理集成测试

mod common;

use admin_access::application::principal::{
    CreatePrincipalCommand, PrincipalService, UpdatePrincipalCommand,
};
use bastion_errors::AppError;
use common::{Catalog, PASSWORD};

fn service(catalog: &Catalog) -> PrincipalService {
    PrincipalService::new(catalog.factory.clone(), catalog.hasher.clone())
}

fn create(
    username: &str,
    role_id: Option<admin_access::domain::role::RoleId>,
) -> CreatePrincipalCommand {
    CreatePrincipalCommand {
        username: username.into(),
        email: format!("  {}@Example.COM ", username),
        password: PASSWORD.into(),
        role_id,
    }
}

#[tokio::test]
async fn test_create_principal_within_choices() {
    let catalog = Catalog::seeded().await;
    let service = service(&catalog);

    let created = service
        .create_principal(
            &catalog.actor("editor"),
            create("writer", Some(catalog.role("moderator"))),
        )
        .await
        .unwrap();
    assert_eq!(created.email, "writer@example.com");
    assert_ne!(created.password_hash, PASSWORD);

    let err = service
        .create_principal(&catalog.actor("editor"), create("chief", Some(catalog.role("editor"))))
        .await
        .unwrap_err();
    assert!(err.is_forbidden());

    let err = service
        .create_principal(&catalog.actor("admin"), create("root", Some(catalog.role("developer"))))
        .await
        .unwrap_err();
    assert!(err.is_forbidden());
}

#[tokio::test]
async fn test_duplicate_principal_conflicts() {
    let catalog = Catalog::seeded().await;
    let service = service(&catalog);

    let err = service
        .create_principal(&catalog.actor("admin"), create("moderator", None))
        .await
        .unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_self_escalation_is_forbidden() {
    let catalog = Catalog::seeded().await;
    let service = service(&catalog);
    let moderator = catalog.actor("moderator");

    for target in ["editor", "admin", "developer"] {
        let mut cmd = UpdatePrincipalCommand::new(moderator);
        cmd.role_id = Some(Some(catalog.role(target)));
        let err = service.update_principal(&moderator, cmd).await.unwrap_err();
        assert!(err.is_forbidden(), "{} -> {:?}", target, err);
    }

    let unchanged = catalog.principal(&moderator).await.unwrap();
    assert_eq!(unchanged.role_id, Some(catalog.role("moderator")));
}

#[tokio::test]
async fn test_self_edit_without_manage_rights() {
    let catalog = Catalog::seeded().await;
    let service = service(&catalog);
    let moderator = catalog.actor("moderator");

    let mut cmd = UpdatePrincipalCommand::new(moderator);
    cmd.username = Some("mod_renamed".into());
    cmd.role_id = Some(Some(catalog.role("user")));
    let updated = service.update_principal(&moderator, cmd).await.unwrap();

    assert_eq!(updated.username, "mod_renamed");
    assert_eq!(updated.role_id, Some(catalog.role("user")));
}

#[tokio::test]
async fn test_update_requires_dominance() {
    let catalog = Catalog::seeded().await;
    let service = service(&catalog);

    let mut cmd = UpdatePrincipalCommand::new(catalog.actor("admin"));
    cmd.is_active = Some(false);
    let err = service
        .update_principal(&catalog.actor("editor"), cmd)
        .await
        .unwrap_err();
    assert!(err.is_forbidden());

    let mut cmd = UpdatePrincipalCommand::new(catalog.actor("user"));
    cmd.password = Some("changed-password".into());
    let updated = service
        .update_principal(&catalog.actor("editor"), cmd)
        .await
        .unwrap();
    assert_eq!(updated.password_hash, "plain:changed-password");
}

#[tokio::test]
async fn test_delete_rules() {
    let catalog = Catalog::seeded().await;
    let service = service(&catalog);
    let admin = catalog.actor("admin");

    let err = service.delete_principal(&admin, &admin).await.unwrap_err();
    assert!(err.is_forbidden());

    let err = service
        .delete_principal(&catalog.actor("developer"), &catalog.actor("developer"))
        .await
        .unwrap_err();
    assert!(err.is_forbidden());

    let second_developer = catalog
        .add_principal("developer2", Some(catalog.role("developer")))
        .await;
    let err = service
        .delete_principal(&catalog.actor("developer"), &second_developer)
        .await
        .unwrap_err();
    assert!(err.is_forbidden());

    let err = service
        .delete_principal(&catalog.actor("moderator"), &catalog.actor("editor"))
        .await
        .unwrap_err();
    assert!(err.is_forbidden());

    service.delete_principal(&admin, &catalog.actor("editor")).await.unwrap();
    assert!(catalog.principal(&catalog.actor("editor")).await.is_none());
}

#[tokio::test]
async fn test_visibility() {
    let catalog = Catalog::seeded().await;
    let service = service(&catalog);
    let unassigned = catalog.add_principal("newcomer", None).await;

    let names = |list: Vec<admin_access::domain::role::Principal>| {
        let mut names: Vec<String> = list.into_iter().map(|p| p.username).collect();
        names.sort();
        names
    };

    let visible = service
        .visible_principals(&catalog.actor("editor"), None)
        .await
        .unwrap();
    assert_eq!(names(visible), ["moderator", "newcomer", "user"]);

    let filtered = service
        .visible_principals(&catalog.actor("editor"), Some("user"))
        .await
        .unwrap();
    assert_eq!(names(filtered), ["user"]);

    // 看不到的角色作为过滤条件被忽略
    let ignored = service
        .visible_principals(&catalog.actor("editor"), Some("developer"))
        .await
        .unwrap();
    assert_eq!(names(ignored), ["moderator", "newcomer", "user"]);

    let everyone = service
        .visible_principals(&catalog.actor("developer"), None)
        .await
        .unwrap();
    assert_eq!(everyone.len(), 6);

    let err = service
        .principal(&catalog.actor("admin"), &catalog.actor("developer"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let own = service
        .principal(&catalog.actor("user"), &catalog.actor("user"))
        .await
        .unwrap();
    assert_eq!(own.username, "user");
    assert!(service.principal(&catalog.actor("admin"), &unassigned).await.is_ok());
}
