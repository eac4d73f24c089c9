//! 目录服务
//!
//! 所有变更在同一事务中读取委派快照、校验并写入；任何错误都会回滚。

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use bastion_common::PrincipalId;
use bastion_errors::{AppError, AppResult};
use tracing::{info, instrument};

use super::commands::*;
use crate::application::{deny, load_actor, record_mutation};
use crate::domain::delegation::{CatalogSnapshot, DelegationPolicy};
use crate::domain::role::{Permission, PermissionId, Role, RoleId, normalize_category};
use crate::domain::unit_of_work::UnitOfWorkFactory;
use crate::error::AccessError;

/// 角色/权限/授权的管理与查询
pub struct CatalogService {
    uow_factory: Arc<dyn UnitOfWorkFactory>,
}

impl CatalogService {
    pub fn new(uow_factory: Arc<dyn UnitOfWorkFactory>) -> Self {
        Self { uow_factory }
    }

    // ------------------------------------------------------------------
    // 角色
    // ------------------------------------------------------------------

    /// 创建角色
    #[instrument(skip(self, cmd), fields(code = %cmd.code))]
    pub async fn create_role(
        &self,
        actor_id: &PrincipalId,
        cmd: CreateRoleCommand,
    ) -> AppResult<Role> {
        cmd.validate()?;

        let uow = self.uow_factory.begin().await?;
        let actor = load_actor(uow.as_ref(), actor_id).await?;
        let snapshot = CatalogSnapshot::load(uow.as_ref()).await?;
        let policy = DelegationPolicy::new(&snapshot);

        let Some(actor_role) = policy.role_of(&actor) else {
            return Err(deny(actor_id, "create_role", "No role assigned"));
        };

        if policy.is_apex(actor_role) {
            if cmd.priority >= actor_role.priority {
                return Err(AppError::validation(
                    "Only the highest role may hold the highest priority",
                ));
            }
        } else if cmd.priority >= actor_role.priority {
            return Err(deny(
                actor_id,
                "create_role",
                "Cannot create a role at or above your own priority",
            ));
        }

        if uow.roles().find_by_code(&cmd.code).await?.is_some() {
            return Err(AccessError::RoleAlreadyExists(cmd.code).into());
        }

        let role = Role::new(cmd.code, cmd.name.trim().to_string(), cmd.description, cmd.priority)
            .created_by(*actor_id);
        uow.roles().create(&role).await?;
        uow.commit().await?;

        record_mutation("create_role");
        info!(actor = %actor_id, role_id = %role.id, priority = role.priority, "Role created");
        Ok(role)
    }

    /// 更新角色
    #[instrument(skip(self, cmd), fields(role_id = %cmd.role_id))]
    pub async fn update_role(
        &self,
        actor_id: &PrincipalId,
        cmd: UpdateRoleCommand,
    ) -> AppResult<Role> {
        cmd.validate()?;

        let uow = self.uow_factory.begin().await?;
        let actor = load_actor(uow.as_ref(), actor_id).await?;
        let snapshot = CatalogSnapshot::load(uow.as_ref()).await?;
        let policy = DelegationPolicy::new(&snapshot);

        let target = snapshot
            .role(&cmd.role_id)
            .ok_or(AccessError::RoleNotFound)?;
        let Some(actor_role) = policy.role_of(&actor) else {
            return Err(deny(actor_id, "update_role", "No role assigned"));
        };
        if !policy.can_manage_role(actor_role, target) {
            return Err(deny(actor_id, "update_role", "Cannot manage this role"));
        }

        let mut role = target.clone();

        if let Some(code) = cmd.code.filter(|c| *c != role.code) {
            if role.is_system {
                return Err(AccessError::SystemRoleProtected(role.code).into());
            }
            if uow.roles().find_by_code(&code).await?.is_some() {
                return Err(AccessError::RoleAlreadyExists(code).into());
            }
            role.code = code;
        }

        if let Some(priority) = cmd.priority.filter(|p| *p != role.priority) {
            if policy.is_apex(target) {
                // 最高角色必须保持唯一的最高 priority
                if snapshot.second_tier_priority().is_some_and(|p| priority <= p) {
                    return Err(AppError::validation(
                        "The highest role must keep a priority above every other role",
                    ));
                }
            } else {
                let apex_priority = snapshot.apex().map_or(i32::MAX, |r| r.priority);
                if priority >= apex_priority {
                    return Err(AppError::validation(
                        "Only the highest role may hold the highest priority",
                    ));
                }
                if !policy.is_apex(actor_role) && priority >= actor_role.priority {
                    return Err(deny(
                        actor_id,
                        "update_role",
                        "Cannot raise a role to or above your own priority",
                    ));
                }
            }
            role.priority = priority;
        }

        if let Some(is_active) = cmd.is_active {
            if !is_active && role.is_system {
                return Err(AccessError::SystemRoleProtected(role.code).into());
            }
            if is_active {
                role.activate();
            } else {
                role.deactivate();
            }
        }

        if let Some(name) = cmd.name {
            role.name = name.trim().to_string();
        }
        if let Some(description) = cmd.description {
            role.description = description;
        }

        role.audit_info.update(Some(*actor_id));
        uow.roles().update(&role).await?;
        uow.commit().await?;

        record_mutation("update_role");
        info!(actor = %actor_id, role_id = %role.id, "Role updated");
        Ok(role)
    }

    /// 删除角色，仍有主体绑定时失败
    #[instrument(skip(self))]
    pub async fn delete_role(&self, actor_id: &PrincipalId, role_id: &RoleId) -> AppResult<()> {
        let uow = self.uow_factory.begin().await?;
        let actor = load_actor(uow.as_ref(), actor_id).await?;
        let snapshot = CatalogSnapshot::load(uow.as_ref()).await?;
        let policy = DelegationPolicy::new(&snapshot);

        let target = snapshot.role(role_id).ok_or(AccessError::RoleNotFound)?;
        if target.is_system {
            return Err(AccessError::SystemRoleProtected(target.code.clone()).into());
        }
        let Some(actor_role) = policy.role_of(&actor) else {
            return Err(deny(actor_id, "delete_role", "No role assigned"));
        };
        if !policy.can_manage_role(actor_role, target) {
            return Err(deny(actor_id, "delete_role", "Cannot manage this role"));
        }

        // 在删除所在的事务中重新确认未被引用
        let assigned = uow.principals().count_by_role(role_id).await?;
        if assigned > 0 {
            return Err(AccessError::RoleInUse(assigned).into());
        }

        uow.roles().delete(role_id).await?;
        uow.commit().await?;

        record_mutation("delete_role");
        info!(actor = %actor_id, role_id = %role_id, "Role deleted");
        Ok(())
    }

    // ------------------------------------------------------------------
    // 权限条目
    // ------------------------------------------------------------------

    /// 创建权限
    #[instrument(skip(self, cmd), fields(code = %cmd.code))]
    pub async fn create_permission(
        &self,
        actor_id: &PrincipalId,
        cmd: CreatePermissionCommand,
    ) -> AppResult<Permission> {
        cmd.validate()?;

        let uow = self.uow_factory.begin().await?;
        let actor = load_actor(uow.as_ref(), actor_id).await?;
        let snapshot = CatalogSnapshot::load(uow.as_ref()).await?;
        let policy = DelegationPolicy::new(&snapshot);

        if !policy.can_edit_permission_catalog(policy.role_of(&actor)) {
            return Err(deny(
                actor_id,
                "create_permission",
                "Only the two highest roles may edit the permission catalog",
            ));
        }

        if uow.permissions().find_by_code(&cmd.code).await?.is_some() {
            return Err(AccessError::PermissionAlreadyExists(cmd.code).into());
        }

        let mut permission = Permission::new(cmd.code, cmd.name.trim().to_string(), cmd.category);
        permission.description = cmd.description;
        uow.permissions().create(&permission).await?;
        uow.commit().await?;

        record_mutation("create_permission");
        info!(actor = %actor_id, permission = %permission.code, "Permission created");
        Ok(permission)
    }

    /// 更新权限（代码不可修改）
    #[instrument(skip(self, cmd), fields(permission_id = %cmd.permission_id))]
    pub async fn update_permission(
        &self,
        actor_id: &PrincipalId,
        cmd: UpdatePermissionCommand,
    ) -> AppResult<Permission> {
        cmd.validate()?;

        let uow = self.uow_factory.begin().await?;
        let actor = load_actor(uow.as_ref(), actor_id).await?;
        let snapshot = CatalogSnapshot::load(uow.as_ref()).await?;
        let policy = DelegationPolicy::new(&snapshot);

        if !policy.can_edit_permission_catalog(policy.role_of(&actor)) {
            return Err(deny(
                actor_id,
                "update_permission",
                "Only the two highest roles may edit the permission catalog",
            ));
        }

        let mut permission = snapshot
            .permission(&cmd.permission_id)
            .cloned()
            .ok_or(AccessError::PermissionNotFound)?;

        if let Some(name) = cmd.name {
            permission.name = name.trim().to_string();
        }
        if let Some(description) = cmd.description {
            permission.description = description;
        }
        if let Some(category) = cmd.category {
            permission.category = normalize_category(Some(category));
        }
        if let Some(is_active) = cmd.is_active {
            permission.is_active = is_active;
        }

        uow.permissions().update(&permission).await?;
        uow.commit().await?;

        record_mutation("update_permission");
        info!(actor = %actor_id, permission = %permission.code, "Permission updated");
        Ok(permission)
    }

    /// 删除权限，仍被任何角色持有时失败
    #[instrument(skip(self))]
    pub async fn delete_permission(
        &self,
        actor_id: &PrincipalId,
        permission_id: &PermissionId,
    ) -> AppResult<()> {
        let uow = self.uow_factory.begin().await?;
        let actor = load_actor(uow.as_ref(), actor_id).await?;
        let snapshot = CatalogSnapshot::load(uow.as_ref()).await?;
        let policy = DelegationPolicy::new(&snapshot);

        if !policy.can_edit_permission_catalog(policy.role_of(&actor)) {
            return Err(deny(
                actor_id,
                "delete_permission",
                "Only the two highest roles may edit the permission catalog",
            ));
        }

        if snapshot.permission(permission_id).is_none() {
            return Err(AccessError::PermissionNotFound.into());
        }

        let holders = uow.role_permissions().count_roles_with(permission_id).await?;
        if holders > 0 {
            return Err(AccessError::PermissionInUse(holders).into());
        }

        uow.permissions().delete(permission_id).await?;
        uow.commit().await?;

        record_mutation("delete_permission");
        info!(actor = %actor_id, permission_id = %permission_id, "Permission deleted");
        Ok(())
    }

    // ------------------------------------------------------------------
    // 授权
    // ------------------------------------------------------------------

    /// 授予权限，重复授予不做任何事；返回是否新增
    #[instrument(skip(self))]
    pub async fn grant_permission(
        &self,
        actor_id: &PrincipalId,
        role_id: &RoleId,
        permission_id: &PermissionId,
    ) -> AppResult<bool> {
        self.change_grant(actor_id, role_id, permission_id, true).await
    }

    /// 撤销权限；返回是否存在
    #[instrument(skip(self))]
    pub async fn revoke_permission(
        &self,
        actor_id: &PrincipalId,
        role_id: &RoleId,
        permission_id: &PermissionId,
    ) -> AppResult<bool> {
        self.change_grant(actor_id, role_id, permission_id, false).await
    }

    async fn change_grant(
        &self,
        actor_id: &PrincipalId,
        role_id: &RoleId,
        permission_id: &PermissionId,
        grant: bool,
    ) -> AppResult<bool> {
        let operation = if grant { "grant_permission" } else { "revoke_permission" };

        let uow = self.uow_factory.begin().await?;
        let actor = load_actor(uow.as_ref(), actor_id).await?;
        let snapshot = CatalogSnapshot::load(uow.as_ref()).await?;
        let policy = DelegationPolicy::new(&snapshot);

        let target = snapshot.role(role_id).ok_or(AccessError::RoleNotFound)?;
        let permission = snapshot
            .permission(permission_id)
            .ok_or(AccessError::PermissionNotFound)?;

        let actor_role = policy.role_of(&actor);
        match actor_role {
            Some(r) if policy.can_manage_role(r, target) => {}
            _ => return Err(deny(actor_id, operation, "Cannot manage this role")),
        }
        if !policy.is_assignable(actor_role, permission_id) {
            return Err(deny(
                actor_id,
                operation,
                "Cannot delegate a permission outside your own grants",
            ));
        }

        let changed = if grant {
            uow.role_permissions().grant(role_id, permission_id).await?
        } else {
            uow.role_permissions().revoke(role_id, permission_id).await?
        };
        uow.commit().await?;

        if changed {
            record_mutation(operation);
            info!(
                actor = %actor_id,
                role_id = %role_id,
                permission = %permission.code,
                granted = grant,
                "Grant changed"
            );
        }
        Ok(changed)
    }

    /// 批量设置角色的授权
    ///
    /// `selection` 必须全部位于 actor 自身的授权内；actor 看不到的授权保持不变。
    #[instrument(skip(self, selection))]
    pub async fn set_role_permissions(
        &self,
        actor_id: &PrincipalId,
        role_id: &RoleId,
        selection: &[PermissionId],
    ) -> AppResult<Vec<Permission>> {
        let uow = self.uow_factory.begin().await?;
        let actor = load_actor(uow.as_ref(), actor_id).await?;
        let snapshot = CatalogSnapshot::load(uow.as_ref()).await?;
        let policy = DelegationPolicy::new(&snapshot);

        let target = snapshot.role(role_id).ok_or(AccessError::RoleNotFound)?;
        let actor_role = policy.role_of(&actor);
        match actor_role {
            Some(r) if policy.can_manage_role(r, target) => {}
            _ => return Err(deny(actor_id, "set_role_permissions", "Cannot manage this role")),
        }

        let selected: HashSet<PermissionId> = selection.iter().copied().collect();
        for id in &selected {
            if snapshot.permission(id).is_none() {
                return Err(AccessError::PermissionNotFound.into());
            }
            if !policy.is_assignable(actor_role, id) {
                return Err(deny(
                    actor_id,
                    "set_role_permissions",
                    "Cannot delegate a permission outside your own grants",
                ));
            }
        }

        let mut added = 0usize;
        let mut removed = 0usize;
        for permission in policy.assignable_permissions(actor_role) {
            let held = snapshot.is_granted(role_id, &permission.id);
            let wanted = selected.contains(&permission.id);
            if wanted && !held {
                uow.role_permissions().grant(role_id, &permission.id).await?;
                added += 1;
            } else if !wanted && held {
                uow.role_permissions().revoke(role_id, &permission.id).await?;
                removed += 1;
            }
        }

        let granted = uow.role_permissions().permissions_of(role_id).await?;
        uow.commit().await?;

        record_mutation("set_role_permissions");
        info!(actor = %actor_id, role_id = %role_id, added, removed, "Role permissions replaced");
        Ok(granted)
    }

    // ------------------------------------------------------------------
    // 查询
    // ------------------------------------------------------------------

    /// 角色是否拥有某个权限；停用的角色不拥有任何权限
    pub async fn has_permission(&self, role_id: &RoleId, code: &str) -> AppResult<bool> {
        let uow = self.uow_factory.begin().await?;
        let result = match uow.roles().find_by_id(role_id).await? {
            Some(role) if role.is_active => {
                uow.role_permissions().role_has_permission(role_id, code).await?
            }
            _ => false,
        };
        uow.rollback().await?;
        Ok(result)
    }

    /// 全部角色，按 priority 降序
    pub async fn roles_by_priority_desc(&self) -> AppResult<Vec<Role>> {
        let uow = self.uow_factory.begin().await?;
        let roles = uow.roles().list_all().await?;
        uow.rollback().await?;
        Ok(roles)
    }

    /// 按分类分组的权限
    pub async fn permissions_by_category(&self) -> AppResult<BTreeMap<String, Vec<Permission>>> {
        let uow = self.uow_factory.begin().await?;
        let permissions = uow.permissions().list_all().await?;
        uow.rollback().await?;

        let mut grouped: BTreeMap<String, Vec<Permission>> = BTreeMap::new();
        for permission in permissions {
            grouped
                .entry(permission.category.clone())
                .or_default()
                .push(permission);
        }
        Ok(grouped)
    }

    pub async fn role_by_id(&self, role_id: &RoleId) -> AppResult<Role> {
        let uow = self.uow_factory.begin().await?;
        let role = uow.roles().find_by_id(role_id).await?;
        uow.rollback().await?;
        role.ok_or_else(|| AccessError::RoleNotFound.into())
    }

    pub async fn role_by_code(&self, code: &str) -> AppResult<Role> {
        let uow = self.uow_factory.begin().await?;
        let role = uow.roles().find_by_code(code).await?;
        uow.rollback().await?;
        role.ok_or_else(|| AccessError::RoleNotFound.into())
    }

    /// 角色被授予的权限，按代码排序
    pub async fn granted_permissions(&self, role_id: &RoleId) -> AppResult<Vec<Permission>> {
        let uow = self.uow_factory.begin().await?;
        if uow.roles().find_by_id(role_id).await?.is_none() {
            return Err(AccessError::RoleNotFound.into());
        }
        let permissions = uow.role_permissions().permissions_of(role_id).await?;
        uow.rollback().await?;
        Ok(permissions)
    }

    /// 绑定到角色的主体数
    pub async fn principal_count(&self, role_id: &RoleId) -> AppResult<i64> {
        let uow = self.uow_factory.begin().await?;
        let count = uow.principals().count_by_role(role_id).await?;
        uow.rollback().await?;
        Ok(count)
    }

    /// 持有权限的角色数
    pub async fn role_count(&self, permission_id: &PermissionId) -> AppResult<i64> {
        let uow = self.uow_factory.begin().await?;
        let count = uow.role_permissions().count_roles_with(permission_id).await?;
        uow.rollback().await?;
        Ok(count)
    }

    /// actor 可管理的角色
    pub async fn manageable_roles(&self, actor_id: &PrincipalId) -> AppResult<Vec<Role>> {
        let uow = self.uow_factory.begin().await?;
        let actor = load_actor(uow.as_ref(), actor_id).await?;
        let snapshot = CatalogSnapshot::load(uow.as_ref()).await?;
        uow.rollback().await?;

        let policy = DelegationPolicy::new(&snapshot);
        Ok(policy
            .manageable_roles(policy.role_of(&actor))
            .into_iter()
            .cloned()
            .collect())
    }

    /// actor 可以授予他人的权限
    pub async fn assignable_permissions(
        &self,
        actor_id: &PrincipalId,
    ) -> AppResult<Vec<Permission>> {
        let uow = self.uow_factory.begin().await?;
        let actor = load_actor(uow.as_ref(), actor_id).await?;
        let snapshot = CatalogSnapshot::load(uow.as_ref()).await?;
        uow.rollback().await?;

        let policy = DelegationPolicy::new(&snapshot);
        Ok(policy
            .assignable_permissions(policy.role_of(&actor))
            .into_iter()
            .cloned()
            .collect())
    }
}
