//! 运行时设置 trait 定义

use async_trait::async_trait;
use bastion_errors::AppResult;

/// 键值设置存储
///
/// 值以字符串保存，由调用方负责解析。
#[async_trait]
pub trait SettingsPort: Send + Sync {
    /// 读取设置，不存在时返回 None
    async fn get_setting(&self, key: &str) -> AppResult<Option<String>>;

    /// 写入设置（覆盖已有值）
    async fn put_setting(&self, key: &str, value: &str) -> AppResult<()>;
}
