//! 目录快照

use std::collections::{HashMap, HashSet};

use bastion_errors::AppResult;

use crate::domain::role::{Permission, PermissionId, Role, RoleId};
use crate::domain::unit_of_work::UnitOfWork;

/// 某一时刻的角色、权限和授权
///
/// 角色按 priority 降序（同 priority 按代码）排列，第一个即为最高角色。
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    roles: Vec<Role>,
    permissions: HashMap<PermissionId, Permission>,
    grants: HashMap<RoleId, HashSet<PermissionId>>,
}

impl CatalogSnapshot {
    pub fn new(
        mut roles: Vec<Role>,
        permissions: Vec<Permission>,
        grants: impl IntoIterator<Item = (RoleId, PermissionId)>,
    ) -> Self {
        roles.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.code.cmp(&b.code)));

        let mut grant_map: HashMap<RoleId, HashSet<PermissionId>> = HashMap::new();
        for (role_id, permission_id) in grants {
            grant_map.entry(role_id).or_default().insert(permission_id);
        }

        Self {
            roles,
            permissions: permissions.into_iter().map(|p| (p.id, p)).collect(),
            grants: grant_map,
        }
    }

    /// 在当前事务中读取完整快照
    pub async fn load(uow: &dyn UnitOfWork) -> AppResult<Self> {
        let roles = uow.roles().list_all().await?;
        let permissions = uow.permissions().list_all().await?;
        let grants = uow.role_permissions().list_all().await?;
        Ok(Self::new(roles, permissions, grants))
    }

    /// 按 priority 降序的全部角色
    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn role(&self, id: &RoleId) -> Option<&Role> {
        self.roles.iter().find(|r| &r.id == id)
    }

    pub fn permission(&self, id: &PermissionId) -> Option<&Permission> {
        self.permissions.get(id)
    }

    /// 最高角色
    pub fn apex(&self) -> Option<&Role> {
        self.roles.first()
    }

    /// 除最高角色外的最大 priority
    pub fn second_tier_priority(&self) -> Option<i32> {
        self.roles.get(1).map(|r| r.priority)
    }

    pub fn is_granted(&self, role_id: &RoleId, permission_id: &PermissionId) -> bool {
        self.grants
            .get(role_id)
            .is_some_and(|set| set.contains(permission_id))
    }

    /// 角色被授予的权限，按代码排序
    pub fn permissions_of(&self, role_id: &RoleId) -> Vec<&Permission> {
        let mut granted: Vec<&Permission> = self
            .grants
            .get(role_id)
            .map(|ids| ids.iter().filter_map(|id| self.permissions.get(id)).collect())
            .unwrap_or_default();
        granted.sort_by(|a, b| a.code.cmp(&b.code));
        granted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles_sorted_and_apex() {
        let user = Role::new("user".into(), "User".into(), None, 10);
        let dev = Role::new("developer".into(), "Developer".into(), None, 1000);
        let admin = Role::new("admin".into(), "Admin".into(), None, 100);
        let snapshot = CatalogSnapshot::new(vec![user, dev.clone(), admin], vec![], vec![]);

        let codes: Vec<_> = snapshot.roles().iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, vec!["developer", "admin", "user"]);
        assert_eq!(snapshot.apex().map(|r| r.id), Some(dev.id));
        assert_eq!(snapshot.second_tier_priority(), Some(100));
    }

    #[test]
    fn test_permissions_of() {
        let role = Role::new("editor".into(), "Editor".into(), None, 70);
        let a = Permission::new("view_blogs".into(), "View blogs".into(), Some("blogs".into()));
        let b = Permission::new("create_blog".into(), "Create blog".into(), Some("blogs".into()));
        let snapshot = CatalogSnapshot::new(
            vec![role.clone()],
            vec![a.clone(), b.clone()],
            vec![(role.id, a.id), (role.id, b.id), (role.id, a.id)],
        );

        let codes: Vec<_> = snapshot
            .permissions_of(&role.id)
            .iter()
            .map(|p| p.code.as_str())
            .collect();
        assert_eq!(codes, vec!["create_blog", "view_blogs"]);
        assert!(snapshot.is_granted(&role.id, &a.id));
        assert!(snapshot.permissions_of(&RoleId::new()).is_empty());
    }
}
