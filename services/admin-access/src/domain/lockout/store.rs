//! 锁定状态存储接口

use async_trait::async_trait;
use bastion_errors::AppResult;
use std::time::Duration;

use super::state::LockoutState;

/// 以键保存锁定状态，可由本地缓存、Redis 等实现
///
/// 状态允许丢失（重启、过期），丢失等同于 `Clear`。
#[async_trait]
pub trait LockoutStore: Send + Sync {
    async fn get(&self, key: &str) -> AppResult<Option<LockoutState>>;

    /// 保存状态，`ttl` 后自动过期
    async fn set(&self, key: &str, state: &LockoutState, ttl: Duration) -> AppResult<()>;

    /// 立即清除
    async fn expire(&self, key: &str) -> AppResult<()>;
}
