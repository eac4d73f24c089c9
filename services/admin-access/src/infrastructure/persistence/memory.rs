//! 内存实现
//!
//! 用于测试和单进程部署。事务串行执行：`begin` 持有全局锁并复制一份状态，
//! `commit` 原子地写回，丢弃即回滚。唯一约束和删除限制与数据库一致。

use async_trait::async_trait;
use bastion_common::PrincipalId;
use bastion_errors::{AppError, AppResult};
use bastion_ports::SettingsPort;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::domain::role::{
    Permission, PermissionId, PermissionRepository, Principal, PrincipalRepository, Role, RoleId,
    RolePermissionRepository, RoleRepository,
};
use crate::domain::unit_of_work::{UnitOfWork, UnitOfWorkFactory};

#[derive(Debug, Clone, Default)]
struct CatalogState {
    roles: HashMap<RoleId, Role>,
    permissions: HashMap<PermissionId, Permission>,
    grants: BTreeSet<(RoleId, PermissionId)>,
    principals: HashMap<PrincipalId, Principal>,
}

/// 内存 Unit of Work 工厂
#[derive(Clone, Default)]
pub struct InMemoryUnitOfWorkFactory {
    state: Arc<AsyncMutex<CatalogState>>,
}

impl InMemoryUnitOfWorkFactory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UnitOfWorkFactory for InMemoryUnitOfWorkFactory {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        let committed = self.state.clone().lock_owned().await;
        let working = Arc::new(Mutex::new(committed.clone()));

        Ok(Box::new(InMemoryUnitOfWork {
            committed,
            repos: MemoryRepositories { working },
        }))
    }
}

struct InMemoryUnitOfWork {
    committed: OwnedMutexGuard<CatalogState>,
    repos: MemoryRepositories,
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    fn roles(&self) -> &dyn RoleRepository {
        &self.repos
    }

    fn permissions(&self) -> &dyn PermissionRepository {
        &self.repos
    }

    fn role_permissions(&self) -> &dyn RolePermissionRepository {
        &self.repos
    }

    fn principals(&self) -> &dyn PrincipalRepository {
        &self.repos
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let mut this = *self;
        let working = this.repos.working.lock().clone();
        *this.committed = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        Ok(())
    }
}

struct MemoryRepositories {
    working: Arc<Mutex<CatalogState>>,
}

fn duplicate(what: &str) -> AppError {
    AppError::conflict(format!("Duplicate {} violates unique constraint", what))
}

#[async_trait]
impl RoleRepository for MemoryRepositories {
    async fn create(&self, role: &Role) -> AppResult<()> {
        let mut state = self.working.lock();
        if state.roles.values().any(|r| r.code == role.code) {
            return Err(duplicate("role code"));
        }
        state.roles.insert(role.id, role.clone());
        Ok(())
    }

    async fn update(&self, role: &Role) -> AppResult<()> {
        let mut state = self.working.lock();
        if state
            .roles
            .values()
            .any(|r| r.id != role.id && r.code == role.code)
        {
            return Err(duplicate("role code"));
        }
        if let Some(existing) = state.roles.get_mut(&role.id) {
            *existing = role.clone();
        }
        Ok(())
    }

    async fn delete(&self, id: &RoleId) -> AppResult<()> {
        let mut state = self.working.lock();
        if state.principals.values().any(|p| p.role_id == Some(*id)) {
            return Err(AppError::conflict("Record is still referenced"));
        }
        state.grants.retain(|(role_id, _)| role_id != id);
        state.roles.remove(id);
        Ok(())
    }

    async fn find_by_id(&self, id: &RoleId) -> AppResult<Option<Role>> {
        Ok(self.working.lock().roles.get(id).cloned())
    }

    async fn find_by_code(&self, code: &str) -> AppResult<Option<Role>> {
        Ok(self
            .working
            .lock()
            .roles
            .values()
            .find(|r| r.code == code)
            .cloned())
    }

    async fn list_all(&self) -> AppResult<Vec<Role>> {
        let mut roles: Vec<Role> = self.working.lock().roles.values().cloned().collect();
        roles.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.code.cmp(&b.code)));
        Ok(roles)
    }
}

#[async_trait]
impl PermissionRepository for MemoryRepositories {
    async fn create(&self, permission: &Permission) -> AppResult<()> {
        let mut state = self.working.lock();
        if state.permissions.values().any(|p| p.code == permission.code) {
            return Err(duplicate("permission code"));
        }
        state.permissions.insert(permission.id, permission.clone());
        Ok(())
    }

    async fn update(&self, permission: &Permission) -> AppResult<()> {
        let mut state = self.working.lock();
        if let Some(existing) = state.permissions.get_mut(&permission.id) {
            *existing = permission.clone();
        }
        Ok(())
    }

    async fn delete(&self, id: &PermissionId) -> AppResult<()> {
        let mut state = self.working.lock();
        if state.grants.iter().any(|(_, p)| p == id) {
            return Err(AppError::conflict("Record is still referenced"));
        }
        state.permissions.remove(id);
        Ok(())
    }

    async fn find_by_id(&self, id: &PermissionId) -> AppResult<Option<Permission>> {
        Ok(self.working.lock().permissions.get(id).cloned())
    }

    async fn find_by_code(&self, code: &str) -> AppResult<Option<Permission>> {
        Ok(self
            .working
            .lock()
            .permissions
            .values()
            .find(|p| p.code == code)
            .cloned())
    }

    async fn list_all(&self) -> AppResult<Vec<Permission>> {
        let mut permissions: Vec<Permission> =
            self.working.lock().permissions.values().cloned().collect();
        permissions.sort_by(|a, b| a.category.cmp(&b.category).then_with(|| a.code.cmp(&b.code)));
        Ok(permissions)
    }
}

#[async_trait]
impl RolePermissionRepository for MemoryRepositories {
    async fn grant(&self, role_id: &RoleId, permission_id: &PermissionId) -> AppResult<bool> {
        let mut state = self.working.lock();
        if !state.roles.contains_key(role_id) || !state.permissions.contains_key(permission_id) {
            return Err(AppError::conflict("Grant references a missing record"));
        }
        Ok(state.grants.insert((*role_id, *permission_id)))
    }

    async fn revoke(&self, role_id: &RoleId, permission_id: &PermissionId) -> AppResult<bool> {
        Ok(self.working.lock().grants.remove(&(*role_id, *permission_id)))
    }

    async fn permissions_of(&self, role_id: &RoleId) -> AppResult<Vec<Permission>> {
        let state = self.working.lock();
        let mut permissions: Vec<Permission> = state
            .grants
            .iter()
            .filter(|(r, _)| r == role_id)
            .filter_map(|(_, p)| state.permissions.get(p).cloned())
            .collect();
        permissions.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(permissions)
    }

    async fn list_all(&self) -> AppResult<Vec<(RoleId, PermissionId)>> {
        Ok(self.working.lock().grants.iter().copied().collect())
    }

    async fn count_roles_with(&self, permission_id: &PermissionId) -> AppResult<i64> {
        let state = self.working.lock();
        Ok(state.grants.iter().filter(|(_, p)| p == permission_id).count() as i64)
    }

    async fn role_has_permission(&self, role_id: &RoleId, code: &str) -> AppResult<bool> {
        let state = self.working.lock();
        Ok(state
            .grants
            .iter()
            .filter(|(r, _)| r == role_id)
            .filter_map(|(_, p)| state.permissions.get(p))
            .any(|p| p.is_active && p.code == code))
    }
}

impl CatalogState {
    fn principal_conflicts(&self, principal: &Principal) -> bool {
        self.principals.values().any(|p| {
            p.id != principal.id && (p.username == principal.username || p.email == principal.email)
        })
    }

    fn check_role_reference(&self, principal: &Principal) -> AppResult<()> {
        match principal.role_id {
            Some(role_id) if !self.roles.contains_key(&role_id) => {
                Err(AppError::conflict("Principal references a missing role"))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl PrincipalRepository for MemoryRepositories {
    async fn create(&self, principal: &Principal) -> AppResult<()> {
        let mut state = self.working.lock();
        if state.principal_conflicts(principal) {
            return Err(duplicate("username or email"));
        }
        state.check_role_reference(principal)?;
        state.principals.insert(principal.id, principal.clone());
        Ok(())
    }

    async fn update(&self, principal: &Principal) -> AppResult<()> {
        let mut state = self.working.lock();
        if state.principal_conflicts(principal) {
            return Err(duplicate("username or email"));
        }
        state.check_role_reference(principal)?;
        if let Some(existing) = state.principals.get_mut(&principal.id) {
            *existing = principal.clone();
        }
        Ok(())
    }

    async fn delete(&self, id: &PrincipalId) -> AppResult<()> {
        self.working.lock().principals.remove(id);
        Ok(())
    }

    async fn find_by_id(&self, id: &PrincipalId) -> AppResult<Option<Principal>> {
        Ok(self.working.lock().principals.get(id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<Principal>> {
        Ok(self
            .working
            .lock()
            .principals
            .values()
            .find(|p| p.email == email)
            .cloned())
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<Principal>> {
        Ok(self
            .working
            .lock()
            .principals
            .values()
            .find(|p| p.username == username)
            .cloned())
    }

    async fn list_all(&self) -> AppResult<Vec<Principal>> {
        let mut principals: Vec<Principal> =
            self.working.lock().principals.values().cloned().collect();
        principals.sort_by(|a, b| b.audit_info.created_at.cmp(&a.audit_info.created_at));
        Ok(principals)
    }

    async fn count_by_role(&self, role_id: &RoleId) -> AppResult<i64> {
        let state = self.working.lock();
        Ok(state
            .principals
            .values()
            .filter(|p| p.role_id == Some(*role_id))
            .count() as i64)
    }
}

/// 内存设置存储
#[derive(Default)]
pub struct InMemorySettings {
    values: RwLock<HashMap<String, String>>,
}

impl InMemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(self, key: &str, value: &str) -> Self {
        self.values.write().insert(key.to_string(), value.to_string());
        self
    }
}

#[async_trait]
impl SettingsPort for InMemorySettings {
    async fn get_setting(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.values.read().get(key).cloned())
    }

    async fn put_setting(&self, key: &str, value: &str) -> AppResult<()> {
        self.values.write().insert(key.to_string(), value.to_string());
        Ok(())
    }
}
