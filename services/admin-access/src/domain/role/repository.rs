//! 仓储接口

use async_trait::async_trait;
use bastion_common::PrincipalId;
use bastion_errors::AppResult;

use super::permission::{Permission, PermissionId};
use super::principal::Principal;
use super::role::{Role, RoleId};

/// 角色仓储接口
#[async_trait]
pub trait RoleRepository: Send + Sync {
    /// 创建角色
    async fn create(&self, role: &Role) -> AppResult<()>;

    /// 更新角色
    async fn update(&self, role: &Role) -> AppResult<()>;

    /// 删除角色（同时删除其授权）
    async fn delete(&self, id: &RoleId) -> AppResult<()>;

    /// 根据 ID 查找角色
    async fn find_by_id(&self, id: &RoleId) -> AppResult<Option<Role>>;

    /// 根据代码查找角色
    async fn find_by_code(&self, code: &str) -> AppResult<Option<Role>>;

    /// 列出所有角色，按 priority 降序
    async fn list_all(&self) -> AppResult<Vec<Role>>;
}

/// 权限仓储接口
#[async_trait]
pub trait PermissionRepository: Send + Sync {
    /// 创建权限
    async fn create(&self, permission: &Permission) -> AppResult<()>;

    /// 更新权限
    async fn update(&self, permission: &Permission) -> AppResult<()>;

    /// 删除权限
    async fn delete(&self, id: &PermissionId) -> AppResult<()>;

    /// 根据 ID 查找权限
    async fn find_by_id(&self, id: &PermissionId) -> AppResult<Option<Permission>>;

    /// 根据代码查找权限
    async fn find_by_code(&self, code: &str) -> AppResult<Option<Permission>>;

    /// 列出所有权限，按分类、代码排序
    async fn list_all(&self) -> AppResult<Vec<Permission>>;
}

/// 角色权限关联仓储接口
#[async_trait]
pub trait RolePermissionRepository: Send + Sync {
    /// 授权；已存在时不做任何事，返回是否新增
    async fn grant(&self, role_id: &RoleId, permission_id: &PermissionId) -> AppResult<bool>;

    /// 撤销授权，返回是否存在
    async fn revoke(&self, role_id: &RoleId, permission_id: &PermissionId) -> AppResult<bool>;

    /// 获取角色被授予的所有权限
    async fn permissions_of(&self, role_id: &RoleId) -> AppResult<Vec<Permission>>;

    /// 列出全部授权
    async fn list_all(&self) -> AppResult<Vec<(RoleId, PermissionId)>>;

    /// 持有该权限的角色数
    async fn count_roles_with(&self, permission_id: &PermissionId) -> AppResult<i64>;

    /// 角色是否被授予了某个启用的权限
    async fn role_has_permission(&self, role_id: &RoleId, code: &str) -> AppResult<bool>;
}

/// 主体仓储接口
#[async_trait]
pub trait PrincipalRepository: Send + Sync {
    async fn create(&self, principal: &Principal) -> AppResult<()>;

    async fn update(&self, principal: &Principal) -> AppResult<()>;

    async fn delete(&self, id: &PrincipalId) -> AppResult<()>;

    async fn find_by_id(&self, id: &PrincipalId) -> AppResult<Option<Principal>>;

    /// 按规范化后的 email 查找
    async fn find_by_email(&self, email: &str) -> AppResult<Option<Principal>>;

    async fn find_by_username(&self, username: &str) -> AppResult<Option<Principal>>;

    async fn list_all(&self) -> AppResult<Vec<Principal>>;

    /// 绑定到该角色的主体数
    async fn count_by_role(&self, role_id: &RoleId) -> AppResult<i64>;
}
