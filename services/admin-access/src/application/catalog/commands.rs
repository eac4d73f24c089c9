//! 目录命令定义

use bastion_errors::{AppError, AppResult};

use crate::domain::role::{
    PERMISSION_CODE_MAX_LEN, PermissionId, ROLE_CODE_MAX_LEN, RoleId, validate_code,
    validate_display_name,
};

const NAME_MAX_LEN: usize = 100;
const DESCRIPTION_MAX_LEN: usize = 1000;

fn validate_description(description: Option<&str>) -> AppResult<()> {
    if description.is_some_and(|d| d.chars().count() > DESCRIPTION_MAX_LEN) {
        return Err(AppError::validation(format!(
            "Description cannot exceed {} characters",
            DESCRIPTION_MAX_LEN
        )));
    }
    Ok(())
}

fn validate_priority(priority: i32) -> AppResult<()> {
    if priority <= 0 {
        return Err(AppError::validation("Role priority must be greater than 0"));
    }
    Ok(())
}

/// 创建角色命令
#[derive(Debug, Clone)]
pub struct CreateRoleCommand {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub priority: i32,
}

impl CreateRoleCommand {
    pub fn validate(&self) -> AppResult<()> {
        validate_code("Role", &self.code, ROLE_CODE_MAX_LEN)?;
        validate_display_name("Role", &self.name, NAME_MAX_LEN)?;
        validate_description(self.description.as_deref())?;
        validate_priority(self.priority)
    }
}

/// 更新角色命令，`None` 表示不修改
#[derive(Debug, Clone, Default)]
pub struct UpdateRoleCommand {
    pub role_id: RoleId,
    pub code: Option<String>,
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub priority: Option<i32>,
    pub is_active: Option<bool>,
}

impl UpdateRoleCommand {
    pub fn new(role_id: RoleId) -> Self {
        Self {
            role_id,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if let Some(code) = &self.code {
            validate_code("Role", code, ROLE_CODE_MAX_LEN)?;
        }
        if let Some(name) = &self.name {
            validate_display_name("Role", name, NAME_MAX_LEN)?;
        }
        if let Some(description) = &self.description {
            validate_description(description.as_deref())?;
        }
        if let Some(priority) = self.priority {
            validate_priority(priority)?;
        }
        Ok(())
    }
}

/// 创建权限命令
#[derive(Debug, Clone)]
pub struct CreatePermissionCommand {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
}

impl CreatePermissionCommand {
    pub fn validate(&self) -> AppResult<()> {
        validate_code("Permission", &self.code, PERMISSION_CODE_MAX_LEN)?;
        validate_display_name("Permission", &self.name, NAME_MAX_LEN)?;
        validate_description(self.description.as_deref())
    }
}

/// 更新权限命令
#[derive(Debug, Clone, Default)]
pub struct UpdatePermissionCommand {
    pub permission_id: PermissionId,
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub category: Option<String>,
    pub is_active: Option<bool>,
}

impl UpdatePermissionCommand {
    pub fn new(permission_id: PermissionId) -> Self {
        Self {
            permission_id,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if let Some(name) = &self.name {
            validate_display_name("Permission", name, NAME_MAX_LEN)?;
        }
        if let Some(description) = &self.description {
            validate_description(description.as_deref())?;
        }
        Ok(())
    }
}
