//! 角色实体

use bastion_common::{AuditInfo, PrincipalId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 角色代码最大长度
pub const ROLE_CODE_MAX_LEN: usize = 50;

/// 角色 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleId(pub Uuid);

impl RoleId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for RoleId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RoleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RoleId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// 角色实体
///
/// `priority` 越大权限越高；未分配角色的主体视为 priority 0，因此角色的 priority 必须为正。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub priority: i32,
    pub is_system: bool,
    pub is_active: bool,
    pub audit_info: AuditInfo,
}

impl Role {
    pub fn new(code: String, name: String, description: Option<String>, priority: i32) -> Self {
        Self {
            id: RoleId::new(),
            code,
            name,
            description,
            priority,
            is_system: false,
            is_active: true,
            audit_info: AuditInfo::default(),
        }
    }

    /// 创建系统角色（不可改代码、不可删除）
    pub fn system_role(
        code: String,
        name: String,
        description: Option<String>,
        priority: i32,
    ) -> Self {
        let mut role = Self::new(code, name, description, priority);
        role.is_system = true;
        role
    }

    pub fn created_by(mut self, actor: PrincipalId) -> Self {
        self.audit_info = AuditInfo::new(Some(actor));
        self
    }

    /// 激活角色
    pub fn activate(&mut self) {
        self.is_active = true;
    }

    /// 停用角色
    pub fn deactivate(&mut self) {
        self.is_active = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_role() {
        let role = Role::new(
            "editor".to_string(),
            "Editor".to_string(),
            Some("Content editing".to_string()),
            70,
        );

        assert_eq!(role.code, "editor");
        assert_eq!(role.priority, 70);
        assert!(!role.is_system);
        assert!(role.is_active);
    }

    #[test]
    fn test_system_role() {
        let role = Role::system_role("developer".to_string(), "Developer".to_string(), None, 1000);
        assert!(role.is_system);
    }

    #[test]
    fn test_activate_deactivate() {
        let mut role = Role::new("test".to_string(), "Test".to_string(), None, 5);

        role.deactivate();
        assert!(!role.is_active);

        role.activate();
        assert!(role.is_active);
    }

    #[test]
    fn test_role_id_parse() {
        let id = RoleId::new();
        let parsed: RoleId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }
}
