//! 主体管理服务

use std::sync::Arc;

use bastion_common::{AuditInfo, PrincipalId, normalize_identifier};
use bastion_errors::AppResult;
use tracing::{info, instrument};

use super::commands::*;
use crate::application::{deny, load_actor, record_mutation};
use crate::domain::credential::CredentialHasher;
use crate::domain::delegation::{CatalogSnapshot, DelegationPolicy};
use crate::domain::role::{Principal, Role, RoleId};
use crate::domain::unit_of_work::{UnitOfWork, UnitOfWorkFactory};
use crate::error::AccessError;

/// 后台账号管理，所有操作受委派策略约束
pub struct PrincipalService {
    uow_factory: Arc<dyn UnitOfWorkFactory>,
    hasher: Arc<dyn CredentialHasher>,
}

impl PrincipalService {
    pub fn new(uow_factory: Arc<dyn UnitOfWorkFactory>, hasher: Arc<dyn CredentialHasher>) -> Self {
        Self { uow_factory, hasher }
    }

    /// 创建主体
    #[instrument(skip(self, cmd), fields(username = %cmd.username))]
    pub async fn create_principal(
        &self,
        actor_id: &PrincipalId,
        cmd: CreatePrincipalCommand,
    ) -> AppResult<Principal> {
        cmd.validate()?;

        let uow = self.uow_factory.begin().await?;
        let actor = load_actor(uow.as_ref(), actor_id).await?;
        let snapshot = CatalogSnapshot::load(uow.as_ref()).await?;
        let policy = DelegationPolicy::new(&snapshot);

        let Some(actor_role) = policy.role_of(&actor) else {
            return Err(deny(actor_id, "create_principal", "No role assigned"));
        };

        if let Some(role_id) = &cmd.role_id {
            let role = snapshot.role(role_id).ok_or(AccessError::RoleNotFound)?;
            if !is_choice(&policy, actor_role, role) {
                return Err(deny(actor_id, "create_principal", "Cannot assign this role"));
            }
        }

        let username = cmd.username.trim().to_string();
        let email = normalize_identifier(&cmd.email);
        ensure_unique(uow.as_ref(), None, &username, &email).await?;

        let password_hash = self.hasher.hash(&cmd.password)?;
        let mut principal = Principal::new(username, email, password_hash, cmd.role_id);
        principal.audit_info = AuditInfo::new(Some(*actor_id));

        uow.principals().create(&principal).await?;
        uow.commit().await?;

        record_mutation("create_principal");
        info!(actor = %actor_id, principal_id = %principal.id, "Principal created");
        Ok(principal)
    }

    /// 更新主体
    ///
    /// 修改自身时无需管理权限，但不能把自己的角色提升到更高 priority。
    #[instrument(skip(self, cmd), fields(principal_id = %cmd.principal_id))]
    pub async fn update_principal(
        &self,
        actor_id: &PrincipalId,
        cmd: UpdatePrincipalCommand,
    ) -> AppResult<Principal> {
        cmd.validate()?;

        let uow = self.uow_factory.begin().await?;
        let actor = load_actor(uow.as_ref(), actor_id).await?;
        let snapshot = CatalogSnapshot::load(uow.as_ref()).await?;
        let policy = DelegationPolicy::new(&snapshot);

        let mut target = uow
            .principals()
            .find_by_id(&cmd.principal_id)
            .await?
            .ok_or(AccessError::PrincipalNotFound)?;
        let editing_self = target.id == actor.id;

        if !editing_self && !policy.can_manage_principal(&actor, &target) {
            return Err(deny(actor_id, "update_principal", "Cannot manage this principal"));
        }

        if let Some(requested) = cmd.role_id.filter(|r| *r != target.role_id) {
            let requested_role = match requested {
                Some(id) => Some(snapshot.role(&id).ok_or(AccessError::RoleNotFound)?),
                None => None,
            };

            if editing_self {
                let current = policy.role_of(&target);
                if let Err(e) = policy.check_self_role_change(current, requested_role) {
                    tracing::warn!(actor = %actor_id, "Self escalation rejected");
                    return Err(e);
                }
            }

            if let Some(role) = requested_role {
                let allowed = policy
                    .role_of(&actor)
                    .is_some_and(|actor_role| is_choice(&policy, actor_role, role));
                if !allowed {
                    return Err(deny(actor_id, "update_principal", "Cannot assign this role"));
                }
            }

            target.role_id = requested;
        }

        let username = cmd.username.map(|u| u.trim().to_string());
        let email = cmd.email.map(|e| normalize_identifier(&e));
        if username.is_some() || email.is_some() {
            let username = username.unwrap_or_else(|| target.username.clone());
            let email = email.unwrap_or_else(|| target.email.clone());
            ensure_unique(uow.as_ref(), Some(&target.id), &username, &email).await?;
            target.username = username;
            target.email = email;
        }

        if let Some(password) = cmd.password.filter(|p| !p.is_empty()) {
            target.password_hash = self.hasher.hash(&password)?;
        }
        if let Some(is_active) = cmd.is_active {
            target.is_active = is_active;
        }

        target.audit_info.update(Some(*actor_id));
        uow.principals().update(&target).await?;
        uow.commit().await?;

        record_mutation("update_principal");
        info!(actor = %actor_id, principal_id = %target.id, "Principal updated");
        Ok(target)
    }

    /// 删除主体：不能删除自己，也不能删除最高角色的主体
    #[instrument(skip(self))]
    pub async fn delete_principal(
        &self,
        actor_id: &PrincipalId,
        principal_id: &PrincipalId,
    ) -> AppResult<()> {
        if actor_id == principal_id {
            return Err(deny(actor_id, "delete_principal", "Cannot delete yourself"));
        }

        let uow = self.uow_factory.begin().await?;
        let actor = load_actor(uow.as_ref(), actor_id).await?;
        let snapshot = CatalogSnapshot::load(uow.as_ref()).await?;
        let policy = DelegationPolicy::new(&snapshot);

        let target = uow
            .principals()
            .find_by_id(principal_id)
            .await?
            .ok_or(AccessError::PrincipalNotFound)?;

        if policy.role_of(&target).is_some_and(|r| policy.is_apex(r)) {
            return Err(deny(
                actor_id,
                "delete_principal",
                "Principals holding the highest role cannot be deleted",
            ));
        }
        if !policy.can_manage_principal(&actor, &target) {
            return Err(deny(actor_id, "delete_principal", "Cannot manage this principal"));
        }

        uow.principals().delete(principal_id).await?;
        uow.commit().await?;

        record_mutation("delete_principal");
        info!(actor = %actor_id, principal_id = %principal_id, "Principal deleted");
        Ok(())
    }

    /// actor 可见的主体，可按角色代码过滤
    ///
    /// actor 看不到的角色作为过滤条件时被忽略。
    pub async fn visible_principals(
        &self,
        actor_id: &PrincipalId,
        role_filter: Option<&str>,
    ) -> AppResult<Vec<Principal>> {
        let uow = self.uow_factory.begin().await?;
        let actor = load_actor(uow.as_ref(), actor_id).await?;
        let snapshot = CatalogSnapshot::load(uow.as_ref()).await?;
        let principals = uow.principals().list_all().await?;
        uow.rollback().await?;

        let policy = DelegationPolicy::new(&snapshot);
        let visible_roles: Vec<RoleId> = policy
            .manageable_roles(policy.role_of(&actor))
            .iter()
            .map(|r| r.id)
            .collect();
        let filter_role = role_filter
            .and_then(|code| snapshot.roles().iter().find(|r| r.code == code))
            .map(|r| r.id)
            .filter(|id| visible_roles.contains(id));

        Ok(policy
            .visible_principals(&actor, &principals)
            .into_iter()
            .filter(|p| filter_role.is_none() || p.role_id == filter_role)
            .cloned()
            .collect())
    }

    /// 读取单个主体；actor 不可见时视为不存在
    pub async fn principal(
        &self,
        actor_id: &PrincipalId,
        principal_id: &PrincipalId,
    ) -> AppResult<Principal> {
        let uow = self.uow_factory.begin().await?;
        let actor = load_actor(uow.as_ref(), actor_id).await?;
        let snapshot = CatalogSnapshot::load(uow.as_ref()).await?;
        let target = uow.principals().find_by_id(principal_id).await?;
        uow.rollback().await?;

        let policy = DelegationPolicy::new(&snapshot);
        match target {
            Some(t) if t.id == actor.id || policy.can_see_principal(&actor, &t) => Ok(t),
            _ => Err(AccessError::PrincipalNotFound.into()),
        }
    }
}

fn is_choice(policy: &DelegationPolicy<'_>, actor_role: &Role, role: &Role) -> bool {
    policy
        .assignable_role_choices(Some(actor_role))
        .iter()
        .any(|r| r.id == role.id)
}

async fn ensure_unique(
    uow: &dyn UnitOfWork,
    current: Option<&PrincipalId>,
    username: &str,
    email: &str,
) -> AppResult<()> {
    let by_username = uow.principals().find_by_username(username).await?;
    let by_email = uow.principals().find_by_email(email).await?;
    let taken = [by_username, by_email]
        .into_iter()
        .flatten()
        .any(|p| Some(&p.id) != current);
    if taken {
        return Err(AccessError::PrincipalAlreadyExists.into());
    }
    Ok(())
}
