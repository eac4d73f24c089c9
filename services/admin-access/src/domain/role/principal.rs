//! 主体（后台登录账号）

use bastion_common::{AuditInfo, PrincipalId};
use serde::{Deserialize, Serialize};

use super::role::RoleId;

/// 后台登录账号
///
/// 最多绑定一个角色；`password_hash` 为不透明的凭据材料。
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub username: String,
    /// 登录标识，已规范化（去空白、小写）
    pub email: String,
    pub password_hash: String,
    pub role_id: Option<RoleId>,
    pub is_active: bool,
    pub audit_info: AuditInfo,
}

impl Principal {
    pub fn new(
        username: String,
        email: String,
        password_hash: String,
        role_id: Option<RoleId>,
    ) -> Self {
        Self {
            id: PrincipalId::new(),
            username,
            email,
            password_hash,
            role_id,
            is_active: true,
            audit_info: AuditInfo::default(),
        }
    }
}

impl std::fmt::Debug for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Principal")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password_hash", &"[REDACTED]")
            .field("role_id", &self.role_id)
            .field("is_active", &self.is_active)
            .finish()
    }
}
