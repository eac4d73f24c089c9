//! 集成测试共用的目录夹具

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use admin_access::application::seed::CatalogSeeder;
use admin_access::domain::credential::CredentialHasher;
use admin_access::domain::role::{Permission, PermissionId, Principal, RoleId};
use admin_access::domain::unit_of_work::UnitOfWorkFactory;
use admin_access::infrastructure::persistence::InMemoryUnitOfWorkFactory;
use bastion_common::PrincipalId;
use bastion_errors::AppResult;

/// 测试用哈希，避免 argon2 的开销
pub struct PlainHasher;

impl CredentialHasher for PlainHasher {
    fn hash(&self, plain: &str) -> AppResult<String> {
        Ok(format!("plain:{}", plain))
    }

    fn verify(&self, plain: &str, hash: &str) -> bool {
        hash.strip_prefix("plain:") == Some(plain)
    }
}

pub const PASSWORD: &str = "secret123";

/// 已初始化默认目录，并为每个默认角色准备了一个主体
pub struct Catalog {
    pub factory: Arc<dyn UnitOfWorkFactory>,
    pub hasher: Arc<dyn CredentialHasher>,
    pub roles: HashMap<&'static str, RoleId>,
    pub principals: HashMap<&'static str, PrincipalId>,
}

impl Catalog {
    pub async fn seeded() -> Self {
        let factory: Arc<dyn UnitOfWorkFactory> = Arc::new(InMemoryUnitOfWorkFactory::new());
        CatalogSeeder::new(factory.clone())
            .seed()
            .await
            .expect("seed default catalog");

        let mut catalog = Self {
            factory,
            hasher: Arc::new(PlainHasher),
            roles: HashMap::new(),
            principals: HashMap::new(),
        };

        for code in ["developer", "admin", "editor", "moderator", "user"] {
            let role_id = catalog.role_id(code).await;
            catalog.roles.insert(code, role_id);
            let id = catalog.add_principal(code, Some(role_id)).await;
            catalog.principals.insert(code, id);
        }
        catalog
    }

    pub fn role(&self, code: &str) -> RoleId {
        self.roles[code]
    }

    pub fn actor(&self, code: &str) -> PrincipalId {
        self.principals[code]
    }

    async fn role_id(&self, code: &str) -> RoleId {
        let uow = self.factory.begin().await.expect("begin");
        let role = uow.roles().find_by_code(code).await.expect("find role");
        uow.rollback().await.expect("rollback");
        role.expect("seeded role").id
    }

    /// 直接写入主体（绕过委派检查）
    pub async fn add_principal(&self, username: &str, role_id: Option<RoleId>) -> PrincipalId {
        let principal = Principal::new(
            username.to_string(),
            format!("{}@example.com", username),
            self.hasher.hash(PASSWORD).expect("hash"),
            role_id,
        );
        let uow = self.factory.begin().await.expect("begin");
        uow.principals().create(&principal).await.expect("create principal");
        uow.commit().await.expect("commit");
        principal.id
    }

    pub async fn principal(&self, id: &PrincipalId) -> Option<Principal> {
        let uow = self.factory.begin().await.expect("begin");
        let principal = uow.principals().find_by_id(id).await.expect("find principal");
        uow.rollback().await.expect("rollback");
        principal
    }

    pub async fn permission(&self, code: &str) -> Permission {
        let uow = self.factory.begin().await.expect("begin");
        let permission = uow.permissions().find_by_code(code).await.expect("find permission");
        uow.rollback().await.expect("rollback");
        permission.expect("seeded permission")
    }

    pub async fn permission_id(&self, code: &str) -> PermissionId {
        self.permission(code).await.id
    }
}
