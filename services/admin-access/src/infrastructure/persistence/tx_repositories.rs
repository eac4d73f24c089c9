//! 事务内的仓储实现
//!
//! 所有仓储共享同一个事务，由 Unit of Work 提交或回滚。

use async_trait::async_trait;
use bastion_common::{AuditInfo, PrincipalId};
use bastion_errors::{AppError, AppResult};
use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::error_mapper::map_sqlx_error;
use crate::domain::role::{
    Permission, PermissionId, PermissionRepository, Principal, PrincipalRepository, Role, RoleId,
    RolePermissionRepository, RoleRepository,
};

/// 共享事务
pub type SharedTx = Arc<Mutex<Option<Transaction<'static, Postgres>>>>;

macro_rules! define_tx_repo {
    ($name:ident) => {
        pub struct $name {
            tx: SharedTx,
        }

        impl $name {
            pub fn new(tx: SharedTx) -> Self {
                Self { tx }
            }
        }
    };
}

/// 取出事务的可变引用，事务已被消费时报错
macro_rules! active_tx {
    ($guard:ident) => {
        $guard
            .as_mut()
            .ok_or_else(|| AppError::internal("Transaction consumed"))?
    };
}

define_tx_repo!(TxRoleRepository);
define_tx_repo!(TxPermissionRepository);
define_tx_repo!(TxRolePermissionRepository);
define_tx_repo!(TxPrincipalRepository);

const ROLE_COLUMNS: &str = "id, code, name, description, priority, is_system, is_active, \
                            created_at, created_by, updated_at, updated_by";

const PERMISSION_COLUMNS: &str = "id, code, name, description, category, is_active, created_at";

const PRINCIPAL_COLUMNS: &str = "id, username, email, password_hash, role_id, is_active, \
                                 created_at, created_by, updated_at, updated_by";

#[derive(sqlx::FromRow)]
struct RoleRow {
    id: Uuid,
    code: String,
    name: String,
    description: Option<String>,
    priority: i32,
    is_system: bool,
    is_active: bool,
    created_at: DateTime<Utc>,
    created_by: Option<Uuid>,
    updated_at: DateTime<Utc>,
    updated_by: Option<Uuid>,
}

impl From<RoleRow> for Role {
    fn from(row: RoleRow) -> Self {
        Role {
            id: RoleId::from_uuid(row.id),
            code: row.code,
            name: row.name,
            description: row.description,
            priority: row.priority,
            is_system: row.is_system,
            is_active: row.is_active,
            audit_info: AuditInfo {
                created_at: row.created_at,
                created_by: row.created_by.map(PrincipalId::from_uuid),
                updated_at: row.updated_at,
                updated_by: row.updated_by.map(PrincipalId::from_uuid),
            },
        }
    }
}

#[derive(sqlx::FromRow)]
struct PermissionRow {
    id: Uuid,
    code: String,
    name: String,
    description: Option<String>,
    category: String,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<PermissionRow> for Permission {
    fn from(row: PermissionRow) -> Self {
        Permission {
            id: PermissionId::from_uuid(row.id),
            code: row.code,
            name: row.name,
            description: row.description,
            category: row.category,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PrincipalRow {
    id: Uuid,
    username: String,
    email: String,
    password_hash: String,
    role_id: Option<Uuid>,
    is_active: bool,
    created_at: DateTime<Utc>,
    created_by: Option<Uuid>,
    updated_at: DateTime<Utc>,
    updated_by: Option<Uuid>,
}

impl From<PrincipalRow> for Principal {
    fn from(row: PrincipalRow) -> Self {
        Principal {
            id: PrincipalId::from_uuid(row.id),
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            role_id: row.role_id.map(RoleId::from_uuid),
            is_active: row.is_active,
            audit_info: AuditInfo {
                created_at: row.created_at,
                created_by: row.created_by.map(PrincipalId::from_uuid),
                updated_at: row.updated_at,
                updated_by: row.updated_by.map(PrincipalId::from_uuid),
            },
        }
    }
}

#[async_trait]
impl RoleRepository for TxRoleRepository {
    async fn create(&self, role: &Role) -> AppResult<()> {
        let mut guard = self.tx.lock().await;
        let tx = active_tx!(guard);

        sqlx::query(
            r#"
            INSERT INTO roles (id, code, name, description, priority, is_system, is_active,
                               created_at, created_by, updated_at, updated_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(role.id.0)
        .bind(&role.code)
        .bind(&role.name)
        .bind(&role.description)
        .bind(role.priority)
        .bind(role.is_system)
        .bind(role.is_active)
        .bind(role.audit_info.created_at)
        .bind(role.audit_info.created_by.map(|u| u.0))
        .bind(role.audit_info.updated_at)
        .bind(role.audit_info.updated_by.map(|u| u.0))
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn update(&self, role: &Role) -> AppResult<()> {
        let mut guard = self.tx.lock().await;
        let tx = active_tx!(guard);

        sqlx::query(
            r#"
            UPDATE roles
            SET code = $2, name = $3, description = $4, priority = $5, is_active = $6,
                updated_at = $7, updated_by = $8
            WHERE id = $1
            "#,
        )
        .bind(role.id.0)
        .bind(&role.code)
        .bind(&role.name)
        .bind(&role.description)
        .bind(role.priority)
        .bind(role.is_active)
        .bind(role.audit_info.updated_at)
        .bind(role.audit_info.updated_by.map(|u| u.0))
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn delete(&self, id: &RoleId) -> AppResult<()> {
        let mut guard = self.tx.lock().await;
        let tx = active_tx!(guard);

        sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id.0)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn find_by_id(&self, id: &RoleId) -> AppResult<Option<Role>> {
        let mut guard = self.tx.lock().await;
        let tx = active_tx!(guard);

        let row = sqlx::query_as::<_, RoleRow>(&format!(
            "SELECT {} FROM roles WHERE id = $1",
            ROLE_COLUMNS
        ))
        .bind(id.0)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Role::from))
    }

    async fn find_by_code(&self, code: &str) -> AppResult<Option<Role>> {
        let mut guard = self.tx.lock().await;
        let tx = active_tx!(guard);

        let row = sqlx::query_as::<_, RoleRow>(&format!(
            "SELECT {} FROM roles WHERE code = $1",
            ROLE_COLUMNS
        ))
        .bind(code)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Role::from))
    }

    async fn list_all(&self) -> AppResult<Vec<Role>> {
        let mut guard = self.tx.lock().await;
        let tx = active_tx!(guard);

        let rows = sqlx::query_as::<_, RoleRow>(&format!(
            "SELECT {} FROM roles ORDER BY priority DESC, code ASC",
            ROLE_COLUMNS
        ))
        .fetch_all(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(Role::from).collect())
    }
}

#[async_trait]
impl PermissionRepository for TxPermissionRepository {
    async fn create(&self, permission: &Permission) -> AppResult<()> {
        let mut guard = self.tx.lock().await;
        let tx = active_tx!(guard);

        sqlx::query(
            r#"
            INSERT INTO permissions (id, code, name, description, category, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(permission.id.0)
        .bind(&permission.code)
        .bind(&permission.name)
        .bind(&permission.description)
        .bind(&permission.category)
        .bind(permission.is_active)
        .bind(permission.created_at)
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn update(&self, permission: &Permission) -> AppResult<()> {
        let mut guard = self.tx.lock().await;
        let tx = active_tx!(guard);

        sqlx::query(
            r#"
            UPDATE permissions
            SET name = $2, description = $3, category = $4, is_active = $5
            WHERE id = $1
            "#,
        )
        .bind(permission.id.0)
        .bind(&permission.name)
        .bind(&permission.description)
        .bind(&permission.category)
        .bind(permission.is_active)
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn delete(&self, id: &PermissionId) -> AppResult<()> {
        let mut guard = self.tx.lock().await;
        let tx = active_tx!(guard);

        sqlx::query("DELETE FROM permissions WHERE id = $1")
            .bind(id.0)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn find_by_id(&self, id: &PermissionId) -> AppResult<Option<Permission>> {
        let mut guard = self.tx.lock().await;
        let tx = active_tx!(guard);

        let row = sqlx::query_as::<_, PermissionRow>(&format!(
            "SELECT {} FROM permissions WHERE id = $1",
            PERMISSION_COLUMNS
        ))
        .bind(id.0)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Permission::from))
    }

    async fn find_by_code(&self, code: &str) -> AppResult<Option<Permission>> {
        let mut guard = self.tx.lock().await;
        let tx = active_tx!(guard);

        let row = sqlx::query_as::<_, PermissionRow>(&format!(
            "SELECT {} FROM permissions WHERE code = $1",
            PERMISSION_COLUMNS
        ))
        .bind(code)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Permission::from))
    }

    async fn list_all(&self) -> AppResult<Vec<Permission>> {
        let mut guard = self.tx.lock().await;
        let tx = active_tx!(guard);

        let rows = sqlx::query_as::<_, PermissionRow>(&format!(
            "SELECT {} FROM permissions ORDER BY category ASC, code ASC",
            PERMISSION_COLUMNS
        ))
        .fetch_all(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(Permission::from).collect())
    }
}

#[async_trait]
impl RolePermissionRepository for TxRolePermissionRepository {
    async fn grant(&self, role_id: &RoleId, permission_id: &PermissionId) -> AppResult<bool> {
        let mut guard = self.tx.lock().await;
        let tx = active_tx!(guard);

        let result = sqlx::query(
            r#"
            INSERT INTO role_permissions (role_id, permission_id, granted_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (role_id, permission_id) DO NOTHING
            "#,
        )
        .bind(role_id.0)
        .bind(permission_id.0)
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn revoke(&self, role_id: &RoleId, permission_id: &PermissionId) -> AppResult<bool> {
        let mut guard = self.tx.lock().await;
        let tx = active_tx!(guard);

        let result =
            sqlx::query("DELETE FROM role_permissions WHERE role_id = $1 AND permission_id = $2")
                .bind(role_id.0)
                .bind(permission_id.0)
                .execute(&mut **tx)
                .await
                .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn permissions_of(&self, role_id: &RoleId) -> AppResult<Vec<Permission>> {
        let mut guard = self.tx.lock().await;
        let tx = active_tx!(guard);

        let rows = sqlx::query_as::<_, PermissionRow>(
            r#"
            SELECT p.id, p.code, p.name, p.description, p.category, p.is_active, p.created_at
            FROM permissions p
            INNER JOIN role_permissions rp ON p.id = rp.permission_id
            WHERE rp.role_id = $1
            ORDER BY p.code ASC
            "#,
        )
        .bind(role_id.0)
        .fetch_all(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(Permission::from).collect())
    }

    async fn list_all(&self) -> AppResult<Vec<(RoleId, PermissionId)>> {
        let mut guard = self.tx.lock().await;
        let tx = active_tx!(guard);

        let rows: Vec<(Uuid, Uuid)> =
            sqlx::query_as("SELECT role_id, permission_id FROM role_permissions")
                .fetch_all(&mut **tx)
                .await
                .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|(r, p)| (RoleId::from_uuid(r), PermissionId::from_uuid(p)))
            .collect())
    }

    async fn count_roles_with(&self, permission_id: &PermissionId) -> AppResult<i64> {
        let mut guard = self.tx.lock().await;
        let tx = active_tx!(guard);

        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM role_permissions WHERE permission_id = $1")
                .bind(permission_id.0)
                .fetch_one(&mut **tx)
                .await
                .map_err(map_sqlx_error)?;

        Ok(count)
    }

    async fn role_has_permission(&self, role_id: &RoleId, code: &str) -> AppResult<bool> {
        let mut guard = self.tx.lock().await;
        let tx = active_tx!(guard);

        let (exists,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM role_permissions rp
                INNER JOIN permissions p ON p.id = rp.permission_id
                WHERE rp.role_id = $1 AND p.code = $2 AND p.is_active
            )
            "#,
        )
        .bind(role_id.0)
        .bind(code)
        .fetch_one(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(exists)
    }
}

#[async_trait]
impl PrincipalRepository for TxPrincipalRepository {
    async fn create(&self, principal: &Principal) -> AppResult<()> {
        let mut guard = self.tx.lock().await;
        let tx = active_tx!(guard);

        sqlx::query(
            r#"
            INSERT INTO principals (id, username, email, password_hash, role_id, is_active,
                                    created_at, created_by, updated_at, updated_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(principal.id.0)
        .bind(&principal.username)
        .bind(&principal.email)
        .bind(&principal.password_hash)
        .bind(principal.role_id.map(|r| r.0))
        .bind(principal.is_active)
        .bind(principal.audit_info.created_at)
        .bind(principal.audit_info.created_by.map(|u| u.0))
        .bind(principal.audit_info.updated_at)
        .bind(principal.audit_info.updated_by.map(|u| u.0))
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn update(&self, principal: &Principal) -> AppResult<()> {
        let mut guard = self.tx.lock().await;
        let tx = active_tx!(guard);

        sqlx::query(
            r#"
            UPDATE principals
            SET username = $2, email = $3, password_hash = $4, role_id = $5, is_active = $6,
                updated_at = $7, updated_by = $8
            WHERE id = $1
            "#,
        )
        .bind(principal.id.0)
        .bind(&principal.username)
        .bind(&principal.email)
        .bind(&principal.password_hash)
        .bind(principal.role_id.map(|r| r.0))
        .bind(principal.is_active)
        .bind(principal.audit_info.updated_at)
        .bind(principal.audit_info.updated_by.map(|u| u.0))
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn delete(&self, id: &PrincipalId) -> AppResult<()> {
        let mut guard = self.tx.lock().await;
        let tx = active_tx!(guard);

        sqlx::query("DELETE FROM principals WHERE id = $1")
            .bind(id.0)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn find_by_id(&self, id: &PrincipalId) -> AppResult<Option<Principal>> {
        let mut guard = self.tx.lock().await;
        let tx = active_tx!(guard);

        let row = sqlx::query_as::<_, PrincipalRow>(&format!(
            "SELECT {} FROM principals WHERE id = $1",
            PRINCIPAL_COLUMNS
        ))
        .bind(id.0)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Principal::from))
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<Principal>> {
        let mut guard = self.tx.lock().await;
        let tx = active_tx!(guard);

        let row = sqlx::query_as::<_, PrincipalRow>(&format!(
            "SELECT {} FROM principals WHERE email = $1",
            PRINCIPAL_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Principal::from))
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<Principal>> {
        let mut guard = self.tx.lock().await;
        let tx = active_tx!(guard);

        let row = sqlx::query_as::<_, PrincipalRow>(&format!(
            "SELECT {} FROM principals WHERE username = $1",
            PRINCIPAL_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(Principal::from))
    }

    async fn list_all(&self) -> AppResult<Vec<Principal>> {
        let mut guard = self.tx.lock().await;
        let tx = active_tx!(guard);

        let rows = sqlx::query_as::<_, PrincipalRow>(&format!(
            "SELECT {} FROM principals ORDER BY created_at DESC",
            PRINCIPAL_COLUMNS
        ))
        .fetch_all(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(Principal::from).collect())
    }

    async fn count_by_role(&self, role_id: &RoleId) -> AppResult<i64> {
        let mut guard = self.tx.lock().await;
        let tx = active_tx!(guard);

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM principals WHERE role_id = $1")
            .bind(role_id.0)
            .fetch_one(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;

        Ok(count)
    }
}
