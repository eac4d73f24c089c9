//! Unit of Work 模式
//!
//! 提供跨多个 Repository 的事务协调能力，确保操作的原子性。
//! 未提交即丢弃的 Unit of Work 等同于回滚。

use async_trait::async_trait;
use bastion_errors::AppResult;

use crate::domain::role::{
    PermissionRepository, PrincipalRepository, RolePermissionRepository, RoleRepository,
};

/// Unit of Work trait
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// 获取角色 Repository
    fn roles(&self) -> &dyn RoleRepository;

    /// 获取权限 Repository
    fn permissions(&self) -> &dyn PermissionRepository;

    /// 获取角色权限 Repository
    fn role_permissions(&self) -> &dyn RolePermissionRepository;

    /// 获取主体 Repository
    fn principals(&self) -> &dyn PrincipalRepository;

    /// 提交事务
    async fn commit(self: Box<Self>) -> AppResult<()>;

    /// 回滚事务
    async fn rollback(self: Box<Self>) -> AppResult<()>;
}

/// Unit of Work 工厂 trait
#[async_trait]
pub trait UnitOfWorkFactory: Send + Sync {
    /// 开始新的事务
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>>;
}
