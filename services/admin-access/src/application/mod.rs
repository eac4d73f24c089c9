//! 应用层

pub mod catalog;
pub mod guard;
pub mod lockout;
pub mod login;
pub mod principal;
pub mod seed;

use bastion_common::PrincipalId;
use bastion_errors::{AppError, AppResult};
use tracing::warn;

use crate::domain::role::Principal;
use crate::domain::unit_of_work::UnitOfWork;
use crate::error::AccessError;

/// 在当前事务中读取执行操作的主体
///
/// 主体不存在或已停用时视为未认证。
pub(crate) async fn load_actor(
    uow: &dyn UnitOfWork,
    actor_id: &PrincipalId,
) -> AppResult<Principal> {
    match uow.principals().find_by_id(actor_id).await? {
        Some(actor) if actor.is_active => Ok(actor),
        _ => Err(AppError::unauthenticated("Principal is not signed in")),
    }
}

/// 委派拒绝：记录日志并返回 Forbidden
pub(crate) fn deny(actor_id: &PrincipalId, operation: &str, reason: &str) -> AppError {
    warn!(actor = %actor_id, operation, reason, "Delegation rejected");
    metrics::counter!("delegation_rejections_total", "operation" => operation.to_string())
        .increment(1);
    AccessError::Delegation(reason.to_string()).into()
}

/// 成功的目录变更计数
pub(crate) fn record_mutation(operation: &'static str) {
    metrics::counter!("catalog_mutations_total", "operation" => operation).increment(1);
}
