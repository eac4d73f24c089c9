//! 登录入口：锁定守卫 + 凭据校验

use std::sync::Arc;

use bastion_common::normalize_identifier;
use bastion_config::GuardConfig;
use bastion_errors::AppResult;
use tracing::{info, instrument};

use crate::application::lockout::{AttemptOutcome, LockoutGuard};
use crate::domain::credential::CredentialHasher;
use crate::domain::role::Principal;
use crate::domain::unit_of_work::UnitOfWorkFactory;

/// 持有任一即进入仪表盘的权限
const DASHBOARD_PERMISSIONS: [&str; 3] = ["manage_users", "manage_products", "manage_categories"];

/// 登录结果
#[derive(Debug, Clone)]
pub struct LoginResult {
    pub outcome: AttemptOutcome,
    pub principal: Option<Principal>,
    /// 成功时的落地地址
    pub redirect_to: Option<String>,
}

/// 登录服务
pub struct LoginService {
    uow_factory: Arc<dyn UnitOfWorkFactory>,
    hasher: Arc<dyn CredentialHasher>,
    lockout: Arc<LockoutGuard>,
    config: GuardConfig,
}

impl LoginService {
    pub fn new(
        uow_factory: Arc<dyn UnitOfWorkFactory>,
        hasher: Arc<dyn CredentialHasher>,
        lockout: Arc<LockoutGuard>,
        config: GuardConfig,
    ) -> Self {
        Self {
            uow_factory,
            hasher,
            lockout,
            config,
        }
    }

    /// 登录
    ///
    /// 账号不存在、已停用或密码错误返回同一结果。
    #[instrument(skip(self, password, next), fields(email = %normalize_identifier(email)))]
    pub async fn login(
        &self,
        session_id: &str,
        email: &str,
        password: &str,
        next: Option<&str>,
    ) -> AppResult<LoginResult> {
        let result = self
            .lockout
            .attempt(session_id, email, || self.verify(email, password))
            .await?;

        let Some(principal) = result.value else {
            return Ok(LoginResult {
                outcome: result.outcome,
                principal: None,
                redirect_to: None,
            });
        };

        let redirect_to = match next.filter(|n| is_local_path(n)) {
            Some(next) => next.to_string(),
            None => self.landing_for(&principal).await?,
        };

        info!(principal_id = %principal.id, "Principal signed in");
        Ok(LoginResult {
            outcome: result.outcome,
            principal: Some(principal),
            redirect_to: Some(redirect_to),
        })
    }

    async fn verify(&self, email: &str, password: &str) -> AppResult<Option<Principal>> {
        let uow = self.uow_factory.begin().await?;
        let principal = uow
            .principals()
            .find_by_email(&normalize_identifier(email))
            .await?;
        uow.rollback().await?;

        Ok(principal
            .filter(|p| p.is_active)
            .filter(|p| self.hasher.verify(password, &p.password_hash)))
    }

    async fn landing_for(&self, principal: &Principal) -> AppResult<String> {
        let Some(role_id) = &principal.role_id else {
            return Ok(self.config.welcome_location.clone());
        };

        let uow = self.uow_factory.begin().await?;
        let mut dashboard = false;
        if uow.roles().find_by_id(role_id).await?.is_some_and(|r| r.is_active) {
            for code in DASHBOARD_PERMISSIONS {
                if uow.role_permissions().role_has_permission(role_id, code).await? {
                    dashboard = true;
                    break;
                }
            }
        }
        uow.rollback().await?;

        Ok(if dashboard {
            self.config.default_location.clone()
        } else {
            self.config.welcome_location.clone()
        })
    }
}

/// 仅接受站内路径，拒绝 `//host` 这类协议相对地址
pub fn is_local_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.starts_with("/\\")
}
