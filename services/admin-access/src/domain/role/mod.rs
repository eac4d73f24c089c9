//! 角色、权限与主体

mod permission;
mod principal;
mod repository;
mod role;

pub use permission::*;
pub use principal::*;
pub use repository::*;
pub use role::*;

use bastion_errors::{AppError, AppResult};

/// 校验角色/权限代码：非空、不超过 `max_len`、仅允许字母数字和 `_` `-`
pub fn validate_code(kind: &str, code: &str, max_len: usize) -> AppResult<()> {
    if code.is_empty() {
        return Err(AppError::validation(format!("{} code must not be empty", kind)));
    }
    if code.chars().count() > max_len {
        return Err(AppError::validation(format!(
            "{} code must be at most {} characters",
            kind, max_len
        )));
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(AppError::validation(format!(
            "{} code may only contain letters, digits, '_' and '-'",
            kind
        )));
    }
    Ok(())
}

/// 校验显示名称
pub fn validate_display_name(kind: &str, name: &str, max_len: usize) -> AppResult<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.chars().count() > max_len {
        return Err(AppError::validation(format!(
            "{} name must be 1 to {} characters",
            kind, max_len
        )));
    }
    Ok(())
}
