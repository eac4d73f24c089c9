//! 数据库结构

use bastion_adapter_postgres::Migration;

const CREATE_ROLES: &str = r#"
CREATE TABLE IF NOT EXISTS roles (
    id UUID PRIMARY KEY,
    code VARCHAR(50) NOT NULL UNIQUE,
    name VARCHAR(100) NOT NULL,
    description TEXT,
    priority INTEGER NOT NULL CHECK (priority > 0),
    is_system BOOLEAN NOT NULL DEFAULT FALSE,
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    created_at TIMESTAMPTZ NOT NULL,
    created_by UUID,
    updated_at TIMESTAMPTZ NOT NULL,
    updated_by UUID
);
CREATE INDEX IF NOT EXISTS idx_roles_priority ON roles (priority DESC);
"#;

const CREATE_PERMISSIONS: &str = r#"
CREATE TABLE IF NOT EXISTS permissions (
    id UUID PRIMARY KEY,
    code VARCHAR(100) NOT NULL UNIQUE,
    name VARCHAR(100) NOT NULL,
    description TEXT,
    category VARCHAR(50) NOT NULL,
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    created_at TIMESTAMPTZ NOT NULL
);
"#;

const CREATE_ROLE_PERMISSIONS: &str = r#"
CREATE TABLE IF NOT EXISTS role_permissions (
    role_id UUID NOT NULL REFERENCES roles (id) ON DELETE CASCADE,
    permission_id UUID NOT NULL REFERENCES permissions (id) ON DELETE RESTRICT,
    granted_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (role_id, permission_id)
);
CREATE INDEX IF NOT EXISTS idx_role_permissions_permission ON role_permissions (permission_id);
"#;

const CREATE_PRINCIPALS: &str = r#"
CREATE TABLE IF NOT EXISTS principals (
    id UUID PRIMARY KEY,
    username VARCHAR(80) NOT NULL UNIQUE,
    email VARCHAR(120) NOT NULL UNIQUE,
    password_hash VARCHAR(255) NOT NULL,
    role_id UUID REFERENCES roles (id) ON DELETE RESTRICT,
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    created_at TIMESTAMPTZ NOT NULL,
    created_by UUID,
    updated_at TIMESTAMPTZ NOT NULL,
    updated_by UUID
);
CREATE INDEX IF NOT EXISTS idx_principals_role ON principals (role_id);
"#;

const CREATE_SETTINGS: &str = r#"
CREATE TABLE IF NOT EXISTS settings (
    key VARCHAR(100) PRIMARY KEY,
    value TEXT NOT NULL,
    grp VARCHAR(50) NOT NULL DEFAULT 'general',
    description TEXT,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
"#;

/// 全部迁移，按版本号递增
pub fn migrations() -> Vec<Migration> {
    vec![
        Migration::new(1, "create_roles", CREATE_ROLES),
        Migration::new(2, "create_permissions", CREATE_PERMISSIONS),
        Migration::new(3, "create_role_permissions", CREATE_ROLE_PERMISSIONS),
        Migration::new(4, "create_principals", CREATE_PRINCIPALS),
        Migration::new(5, "create_settings", CREATE_SETTINGS),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_versions_are_unique_and_ordered() {
        let versions: Vec<i64> = migrations().iter().map(|m| m.version).collect();
        let mut sorted = versions.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(versions, sorted);
    }

    #[test]
    fn test_grant_table_restricts_permission_delete() {
        assert!(CREATE_ROLE_PERMISSIONS.contains("PRIMARY KEY (role_id, permission_id)"));
        assert!(CREATE_ROLE_PERMISSIONS.contains("REFERENCES permissions (id) ON DELETE RESTRICT"));
    }
}
