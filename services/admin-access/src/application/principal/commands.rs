//! 主体命令定义

use bastion_common::{PrincipalId, normalize_identifier};
use bastion_errors::{AppError, AppResult};

use crate::domain::credential::MIN_PASSWORD_LEN;
use crate::domain::role::RoleId;

const USERNAME_MIN_LEN: usize = 3;
const USERNAME_MAX_LEN: usize = 80;
const EMAIL_MAX_LEN: usize = 120;

fn validate_username(username: &str) -> AppResult<()> {
    let len = username.trim().chars().count();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
        return Err(AppError::validation(format!(
            "Username must be {} to {} characters",
            USERNAME_MIN_LEN, USERNAME_MAX_LEN
        )));
    }
    Ok(())
}

fn validate_email(email: &str) -> AppResult<()> {
    let email = normalize_identifier(email);
    let valid = email.chars().count() <= EMAIL_MAX_LEN
        && email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid {
        return Err(AppError::validation("Invalid email address"));
    }
    Ok(())
}

fn validate_password(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// 创建主体命令
#[derive(Clone)]
pub struct CreatePrincipalCommand {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role_id: Option<RoleId>,
}

impl CreatePrincipalCommand {
    pub fn validate(&self) -> AppResult<()> {
        validate_username(&self.username)?;
        validate_email(&self.email)?;
        validate_password(&self.password)
    }
}

/// 更新主体命令，`None` 表示不修改
#[derive(Clone, Default)]
pub struct UpdatePrincipalCommand {
    pub principal_id: PrincipalId,
    pub username: Option<String>,
    pub email: Option<String>,
    /// 留空则不修改密码
    pub password: Option<String>,
    pub role_id: Option<Option<RoleId>>,
    pub is_active: Option<bool>,
}

impl UpdatePrincipalCommand {
    pub fn new(principal_id: PrincipalId) -> Self {
        Self {
            principal_id,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if let Some(username) = &self.username {
            validate_username(username)?;
        }
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        if let Some(password) = self.password.as_deref().filter(|p| !p.is_empty()) {
            validate_password(password)?;
        }
        Ok(())
    }
}
