//! 通用工具函数

use uuid::Uuid;

/// 生成新的 UUID v7（时间有序）
pub fn new_id() -> Uuid {
    Uuid::now_v7()
}

/// 规范化登录标识（去除首尾空白并转小写）
pub fn normalize_identifier(identifier: &str) -> String {
    identifier.trim().to_lowercase()
}
