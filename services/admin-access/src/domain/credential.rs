//! 凭据哈希接口

use bastion_errors::AppResult;

/// 明文密码最小长度
pub const MIN_PASSWORD_LEN: usize = 6;

/// 密码哈希与校验
pub trait CredentialHasher: Send + Sync {
    fn hash(&self, plain: &str) -> AppResult<String>;

    /// 哈希格式无法解析时返回 false
    fn verify(&self, plain: &str, hash: &str) -> bool;
}
