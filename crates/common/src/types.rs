//! 通用类型定义

use chrono::{DateTime, Utc};
use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 主体（登录账号）ID
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, From,
)]
#[display("{_0}")]
pub struct PrincipalId(pub Uuid);

impl PrincipalId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for PrincipalId {
    fn default() -> Self {
        Self::new()
    }
}

/// 审计信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditInfo {
    pub created_at: DateTime<Utc>,
    pub created_by: Option<PrincipalId>,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Option<PrincipalId>,
}

impl AuditInfo {
    pub fn new(principal_id: Option<PrincipalId>) -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            created_by: principal_id,
            updated_at: now,
            updated_by: principal_id,
        }
    }

    pub fn update(&mut self, principal_id: Option<PrincipalId>) {
        self.updated_at = Utc::now();
        self.updated_by = principal_id;
    }
}

impl Default for AuditInfo {
    fn default() -> Self {
        Self::new(None)
    }
}
