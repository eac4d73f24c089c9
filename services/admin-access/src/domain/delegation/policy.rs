//! 委派判定
//!
//! 所有函数无副作用。未绑定角色的主体 priority 视为 0。

use bastion_errors::{AppError, AppResult};

use super::snapshot::CatalogSnapshot;
use crate::domain::role::{Permission, PermissionId, Principal, Role};

/// 委派策略
pub struct DelegationPolicy<'a> {
    snapshot: &'a CatalogSnapshot,
}

impl<'a> DelegationPolicy<'a> {
    pub fn new(snapshot: &'a CatalogSnapshot) -> Self {
        Self { snapshot }
    }

    /// 是否为最高角色
    pub fn is_apex(&self, role: &Role) -> bool {
        self.snapshot.apex().is_some_and(|apex| apex.id == role.id)
    }

    /// 主体绑定的角色
    pub fn role_of(&self, principal: &Principal) -> Option<&'a Role> {
        principal
            .role_id
            .as_ref()
            .and_then(|id| self.snapshot.role(id))
    }

    fn holds_apex(&self, principal: &Principal) -> bool {
        self.role_of(principal).is_some_and(|r| self.is_apex(r))
    }

    /// actor 能否管理 target 角色
    pub fn can_manage_role(&self, actor: &Role, target: &Role) -> bool {
        self.is_apex(actor) || (!self.is_apex(target) && actor.priority > target.priority)
    }

    /// actor 可管理的角色，按 priority 降序
    ///
    /// 最高角色对非最高角色的 actor 不可见。
    pub fn manageable_roles(&self, actor: Option<&Role>) -> Vec<&'a Role> {
        let Some(actor) = actor else {
            return Vec::new();
        };

        if self.is_apex(actor) {
            return self.snapshot.roles().iter().collect();
        }

        self.snapshot
            .roles()
            .iter()
            .filter(|r| !self.is_apex(r) && r.priority < actor.priority)
            .collect()
    }

    /// 分配给主体时可选的角色
    pub fn assignable_role_choices(&self, actor: Option<&Role>) -> Vec<&'a Role> {
        self.manageable_roles(actor)
    }

    /// actor 能否管理 target 主体
    pub fn can_manage_principal(&self, actor: &Principal, target: &Principal) -> bool {
        let Some(actor_role) = self.role_of(actor) else {
            return false;
        };

        if self.holds_apex(target) {
            return self.is_apex(actor_role);
        }

        match self.role_of(target) {
            Some(target_role) => self.can_manage_role(actor_role, target_role),
            None => true,
        }
    }

    /// actor 能否看到 target 主体
    pub fn can_see_principal(&self, actor: &Principal, target: &Principal) -> bool {
        let Some(actor_role) = self.role_of(actor) else {
            return false;
        };

        if self.is_apex(actor_role) {
            return true;
        }

        match self.role_of(target) {
            Some(target_role) => {
                !self.is_apex(target_role) && target_role.priority < actor_role.priority
            }
            None => true,
        }
    }

    /// actor 能看到的主体
    pub fn visible_principals<'p>(
        &self,
        actor: &Principal,
        principals: &'p [Principal],
    ) -> Vec<&'p Principal> {
        principals
            .iter()
            .filter(|p| self.can_see_principal(actor, p))
            .collect()
    }

    /// actor 可以授予他人的权限：其自身角色被授予且仍启用的权限
    pub fn assignable_permissions(&self, actor: Option<&Role>) -> Vec<&'a Permission> {
        actor
            .map(|role| self.snapshot.permissions_of(&role.id))
            .unwrap_or_default()
            .into_iter()
            .filter(|p| p.is_active)
            .collect()
    }

    pub fn is_assignable(&self, actor: Option<&Role>, permission_id: &PermissionId) -> bool {
        actor.is_some_and(|role| self.snapshot.is_granted(&role.id, permission_id))
            && self
                .snapshot
                .permission(permission_id)
                .is_some_and(|p| p.is_active)
    }

    /// 只有最高角色和紧随其后的一级角色可以增删权限条目
    pub fn can_edit_permission_catalog(&self, actor: Option<&Role>) -> bool {
        let Some(actor) = actor else {
            return false;
        };

        self.is_apex(actor)
            || self
                .snapshot
                .second_tier_priority()
                .is_some_and(|p| actor.priority == p)
    }

    /// 主体修改自身角色时不得提升 priority
    pub fn check_self_role_change(
        &self,
        current: Option<&Role>,
        requested: Option<&Role>,
    ) -> AppResult<()> {
        let current_priority = current.map_or(0, |r| r.priority);
        let requested_priority = requested.map_or(0, |r| r.priority);

        if requested_priority > current_priority {
            return Err(AppError::forbidden(
                "Cannot assign yourself a role above your current role",
            ));
        }
        Ok(())
    }
}
