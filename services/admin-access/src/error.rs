use bastion_errors::AppError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("Role not found")]
    RoleNotFound,
    #[error("Permission not found")]
    PermissionNotFound,
    #[error("Principal not found")]
    PrincipalNotFound,
    #[error("Role code '{0}' already exists")]
    RoleAlreadyExists(String),
    #[error("Permission code '{0}' already exists")]
    PermissionAlreadyExists(String),
    #[error("Username or email already in use")]
    PrincipalAlreadyExists,
    #[error("Role is still assigned to {0} principal(s)")]
    RoleInUse(i64),
    #[error("Permission is still granted to {0} role(s)")]
    PermissionInUse(i64),
    #[error("System role '{0}' cannot be renamed, deactivated or deleted")]
    SystemRoleProtected(String),
    #[error("{0}")]
    Delegation(String),
}

impl From<AccessError> for AppError {
    fn from(error: AccessError) -> Self {
        match error {
            AccessError::RoleNotFound
            | AccessError::PermissionNotFound
            | AccessError::PrincipalNotFound => AppError::NotFound(error.to_string()),
            AccessError::RoleAlreadyExists(_)
            | AccessError::PermissionAlreadyExists(_)
            | AccessError::PrincipalAlreadyExists
            | AccessError::RoleInUse(_)
            | AccessError::PermissionInUse(_) => AppError::Conflict(error.to_string()),
            AccessError::SystemRoleProtected(_) | AccessError::Delegation(_) => {
                AppError::Forbidden(error.to_string())
            }
        }
    }
}
