//! 默认目录初始化
//!
//! 幂等：已存在的角色、权限按代码跳过。默认授权只作用于本次新建的角色，
//! 本次新建的权限会补授给最高角色。

use std::sync::Arc;

use bastion_errors::{AppError, AppResult};
use tracing::{info, instrument};

use crate::domain::credential::CredentialHasher;
use crate::domain::role::{Permission, Principal, Role, RoleId};
use crate::domain::unit_of_work::{UnitOfWork, UnitOfWorkFactory};

pub const APEX_ROLE_CODE: &str = "developer";
pub const DEFAULT_ROLE_CODE: &str = "user";

struct RoleSeed {
    code: &'static str,
    name: &'static str,
    description: &'static str,
    priority: i32,
    is_system: bool,
}

const DEFAULT_ROLES: &[RoleSeed] = &[
    RoleSeed {
        code: APEX_ROLE_CODE,
        name: "Developer",
        description: "Full control over the system and technical settings",
        priority: 1000,
        is_system: true,
    },
    RoleSeed {
        code: "admin",
        name: "Administrator",
        description: "Full administration of the system",
        priority: 100,
        is_system: false,
    },
    RoleSeed {
        code: "editor",
        name: "Editor",
        description: "Manages content: blogs, products, media",
        priority: 70,
        is_system: false,
    },
    RoleSeed {
        code: "moderator",
        name: "Moderator",
        description: "Moderates blogs and handles contacts",
        priority: 50,
        is_system: false,
    },
    RoleSeed {
        code: DEFAULT_ROLE_CODE,
        name: "User",
        description: "Basic read-only access",
        priority: 10,
        is_system: true,
    },
];

/// (代码, 名称, 分类)
const DEFAULT_PERMISSIONS: &[(&str, &str, &str)] = &[
    ("view_products", "View products", "products"),
    ("manage_products", "Manage products", "products"),
    ("manage_categories", "Manage categories", "products"),
    ("view_blogs", "View blogs", "blogs"),
    ("create_blog", "Create blogs", "blogs"),
    ("edit_own_blog", "Edit own blogs", "blogs"),
    ("edit_all_blogs", "Edit all blogs", "blogs"),
    ("delete_blog", "Delete blogs", "blogs"),
    ("publish_blog", "Publish blogs", "blogs"),
    ("view_media", "View media library", "media"),
    ("upload_media", "Upload media", "media"),
    ("edit_media", "Edit media", "media"),
    ("delete_media", "Delete media", "media"),
    ("manage_albums", "Manage albums", "media"),
    ("view_users", "View users", "users"),
    ("manage_users", "Manage users", "users"),
    ("assign_roles", "Assign roles", "users"),
    ("view_contacts", "View contacts", "contacts"),
    ("manage_contacts", "Manage contacts", "contacts"),
    ("view_projects", "View projects", "projects"),
    ("manage_projects", "Manage projects", "projects"),
    ("view_jobs", "View job postings", "jobs"),
    ("manage_jobs", "Manage job postings", "jobs"),
    ("manage_banners", "Manage banners", "system"),
    ("manage_faqs", "Manage FAQs", "system"),
    ("view_dashboard", "View dashboard", "system"),
    ("manage_settings", "Manage system settings", "system"),
    ("manage_roles", "Manage roles and permissions", "system"),
    ("view_quiz", "View quizzes", "quiz"),
    ("manage_quiz", "Manage quizzes", "quiz"),
    ("manage_features", "Toggle features", "system"),
];

const EDITOR_GRANTS: &[&str] = &[
    "view_dashboard",
    "view_products",
    "manage_products",
    "manage_categories",
    "view_blogs",
    "create_blog",
    "edit_all_blogs",
    "delete_blog",
    "publish_blog",
    "view_media",
    "upload_media",
    "edit_media",
    "manage_albums",
    "view_projects",
    "manage_projects",
    "view_contacts",
    "manage_faqs",
    "manage_banners",
];

const MODERATOR_GRANTS: &[&str] = &[
    "view_dashboard",
    "view_products",
    "view_blogs",
    "create_blog",
    "edit_own_blog",
    "view_media",
    "upload_media",
    "view_contacts",
    "manage_contacts",
    "view_projects",
];

const USER_GRANTS: &[&str] = &["view_dashboard"];

/// 默认授予角色的权限
fn default_grants(role_code: &str, permission_code: &str) -> bool {
    match role_code {
        APEX_ROLE_CODE => true,
        "admin" => permission_code != "manage_features",
        "editor" => EDITOR_GRANTS.contains(&permission_code),
        "moderator" => MODERATOR_GRANTS.contains(&permission_code),
        DEFAULT_ROLE_CODE => USER_GRANTS.contains(&permission_code),
        _ => false,
    }
}

/// 初始化统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub roles_created: usize,
    pub permissions_created: usize,
    pub grants_added: usize,
}

/// 默认目录初始化器
pub struct CatalogSeeder {
    uow_factory: Arc<dyn UnitOfWorkFactory>,
}

impl CatalogSeeder {
    pub fn new(uow_factory: Arc<dyn UnitOfWorkFactory>) -> Self {
        Self { uow_factory }
    }

    /// 写入默认角色、权限和授权
    #[instrument(skip(self))]
    pub async fn seed(&self) -> AppResult<SeedReport> {
        let uow = self.uow_factory.begin().await?;
        let mut report = SeedReport::default();

        let mut new_roles = Vec::new();
        for seed in DEFAULT_ROLES {
            if uow.roles().find_by_code(seed.code).await?.is_some() {
                continue;
            }
            let (code, name, description) = (
                seed.code.to_string(),
                seed.name.to_string(),
                Some(seed.description.to_string()),
            );
            let role = if seed.is_system {
                Role::system_role(code, name, description, seed.priority)
            } else {
                Role::new(code, name, description, seed.priority)
            };
            uow.roles().create(&role).await?;
            new_roles.push(role);
        }
        report.roles_created = new_roles.len();

        let mut new_permissions = Vec::new();
        for (code, name, category) in DEFAULT_PERMISSIONS {
            if uow.permissions().find_by_code(code).await?.is_some() {
                continue;
            }
            let permission =
                Permission::new(code.to_string(), name.to_string(), Some(category.to_string()));
            uow.permissions().create(&permission).await?;
            new_permissions.push(permission);
        }
        report.permissions_created = new_permissions.len();

        let permissions = uow.permissions().list_all().await?;
        for role in &new_roles {
            for permission in permissions.iter().filter(|p| p.is_active) {
                if default_grants(&role.code, &permission.code)
                    && uow.role_permissions().grant(&role.id, &permission.id).await?
                {
                    report.grants_added += 1;
                }
            }
        }

        if let Some(apex) = uow.roles().list_all().await?.into_iter().next() {
            for permission in &new_permissions {
                if uow.role_permissions().grant(&apex.id, &permission.id).await? {
                    report.grants_added += 1;
                }
            }
        }

        uow.commit().await?;

        info!(
            roles_created = report.roles_created,
            permissions_created = report.permissions_created,
            grants_added = report.grants_added,
            "Default catalog seeded"
        );
        Ok(report)
    }

    /// 没有任何主体持有最高角色时创建引导账号，返回是否创建
    #[instrument(skip(self, password, hasher))]
    pub async fn ensure_apex_principal(
        &self,
        username: &str,
        email: &str,
        password: &str,
        hasher: &dyn CredentialHasher,
    ) -> AppResult<bool> {
        let uow = self.uow_factory.begin().await?;
        let apex = apex_role(uow.as_ref()).await?;

        if uow.principals().count_by_role(&apex).await? > 0 {
            uow.rollback().await?;
            return Ok(false);
        }

        let email = bastion_common::normalize_identifier(email);
        if uow.principals().find_by_email(&email).await?.is_some()
            || uow.principals().find_by_username(username).await?.is_some()
        {
            uow.rollback().await?;
            return Err(AppError::conflict(
                "Bootstrap account conflicts with an existing principal",
            ));
        }

        let principal =
            Principal::new(username.to_string(), email, hasher.hash(password)?, Some(apex));
        uow.principals().create(&principal).await?;
        uow.commit().await?;

        info!(principal_id = %principal.id, "Bootstrap principal created");
        Ok(true)
    }
}

async fn apex_role(uow: &dyn UnitOfWork) -> AppResult<RoleId> {
    uow.roles()
        .list_all()
        .await?
        .into_iter()
        .next()
        .map(|r| r.id)
        .ok_or_else(|| AppError::internal("Catalog has no roles; run the seeder first"))
}
