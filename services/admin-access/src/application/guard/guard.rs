//! 授权守卫

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use bastion_common::PrincipalId;
use bastion_config::GuardConfig;
use bastion_errors::{AppError, AppResult};
use metrics::{counter, histogram};
use tracing::{debug, instrument, warn};

use super::requirement::Requirement;
use crate::domain::role::Principal;
use crate::domain::unit_of_work::{UnitOfWork, UnitOfWorkFactory};

/// 一次调用的上下文
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    /// 已登录的主体
    pub principal_id: Option<PrincipalId>,
    /// 调用方请求的地址，未认证时作为登录后的返回地址
    pub requested_path: String,
}

impl CallContext {
    pub fn anonymous(requested_path: impl Into<String>) -> Self {
        Self {
            principal_id: None,
            requested_path: requested_path.into(),
        }
    }

    pub fn signed_in(principal_id: PrincipalId, requested_path: impl Into<String>) -> Self {
        Self {
            principal_id: Some(principal_id),
            requested_path: requested_path.into(),
        }
    }
}

/// 拒绝结果：错误以及调用方应被引导到的位置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denial {
    pub error: AppError,
    pub redirect_to: String,
}

/// 判定点：检查调用上下文中主体的角色是否满足权限需求
pub struct AccessGuard {
    uow_factory: Arc<dyn UnitOfWorkFactory>,
    config: GuardConfig,
}

impl AccessGuard {
    pub fn new(uow_factory: Arc<dyn UnitOfWorkFactory>, config: GuardConfig) -> Self {
        Self { uow_factory, config }
    }

    /// 判定是否放行，放行时返回当前主体
    #[instrument(skip(self, ctx), fields(path = %ctx.requested_path))]
    pub async fn authorize(
        &self,
        ctx: &CallContext,
        requirement: &Requirement,
    ) -> Result<Principal, Denial> {
        let started = Instant::now();
        let decision = self.decide(ctx, requirement).await;
        histogram!("authorization_check_duration_ms")
            .record(started.elapsed().as_secs_f64() * 1000.0);

        let label = match &decision {
            Ok(_) => "allow",
            Err(AppError::Unauthenticated(_)) => "unauthenticated",
            Err(AppError::Forbidden(_)) => "forbidden",
            Err(_) => "error",
        };
        counter!("authorization_checks_total", "decision" => label).increment(1);

        decision.map_err(|error| self.denial(ctx, error))
    }

    /// 判定通过后执行操作，操作结果原样返回
    pub async fn wrap<T, F, Fut>(
        &self,
        ctx: &CallContext,
        requirement: &Requirement,
        operation: F,
    ) -> Result<T, Denial>
    where
        F: FnOnce(Principal) -> Fut,
        Fut: Future<Output = T>,
    {
        let principal = self.authorize(ctx, requirement).await?;
        Ok(operation(principal).await)
    }

    async fn decide(&self, ctx: &CallContext, requirement: &Requirement) -> AppResult<Principal> {
        let Some(principal_id) = &ctx.principal_id else {
            return Err(AppError::unauthenticated("Sign in required"));
        };

        let uow = self.uow_factory.begin().await?;
        let outcome = evaluate(uow.as_ref(), principal_id, requirement).await;
        uow.rollback().await?;

        let Some((principal, satisfied)) = outcome? else {
            return Err(AppError::unauthenticated("Sign in required"));
        };
        if !satisfied {
            warn!(
                principal_id = %principal.id,
                required = ?requirement.codes(),
                "Permission requirement not met"
            );
            return Err(AppError::forbidden("You do not have permission to access this page"));
        }

        debug!(principal_id = %principal.id, "Authorization granted");
        Ok(principal)
    }

    fn denial(&self, ctx: &CallContext, error: AppError) -> Denial {
        let redirect_to = match &error {
            AppError::Unauthenticated(_) => format!(
                "{}?next={}",
                self.config.login_path,
                urlencoding::encode(&ctx.requested_path)
            ),
            _ => self.config.default_location.clone(),
        };
        Denial { error, redirect_to }
    }
}

/// 读取主体并求值需求；主体不存在或已停用时返回 `None`
///
/// 未绑定角色或角色已停用的主体不持有任何权限。
async fn evaluate(
    uow: &dyn UnitOfWork,
    principal_id: &PrincipalId,
    requirement: &Requirement,
) -> AppResult<Option<(Principal, bool)>> {
    let Some(principal) = uow
        .principals()
        .find_by_id(principal_id)
        .await?
        .filter(|p| p.is_active)
    else {
        return Ok(None);
    };

    let role = match &principal.role_id {
        Some(role_id) => uow.roles().find_by_id(role_id).await?.filter(|r| r.is_active),
        None => None,
    };

    let mut held = Vec::new();
    if let Some(role) = &role {
        for code in requirement.codes() {
            if uow.role_permissions().role_has_permission(&role.id, code).await? {
                held.push(code.as_str());
            }
        }
    }

    let satisfied = requirement.is_satisfied_by(|code| held.contains(&code));
    Ok(Some((principal, satisfied)))
}
