//! bastion-config - 配置加载库

use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use secrecy::Secret;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(#[from] Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        Self::Load(Box::new(e))
    }
}

/// 数据库配置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    // 开发环境: 10, 生产环境: 50
    match std::env::var("APP_ENV").as_deref() {
        Ok("production") => 50,
        _ => 10,
    }
}

/// Redis 配置
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: Secret<String>,
}

/// 遥测配置
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// 登录锁定状态的作用域
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockoutScope {
    /// 按会话 + 标识计数（丢弃会话即可重置计数）
    #[default]
    Session,
    /// 仅按标识计数，跨会话共享
    Identifier,
}

/// 登录锁定配置
#[derive(Debug, Clone, Deserialize)]
pub struct LockoutConfig {
    /// 设置项缺失或无效时使用的失败次数上限
    #[serde(default = "default_attempt_limit")]
    pub default_attempt_limit: u32,
    /// 锁定时长（分钟）
    #[serde(default = "default_lockout_minutes")]
    pub lockout_minutes: i64,
    /// 失败计数的保留窗口（分钟）
    #[serde(default = "default_failure_window_minutes")]
    pub failure_window_minutes: i64,
    #[serde(default)]
    pub scope: LockoutScope,
    /// 未配置 Redis 时本地锁定缓存的条目上限，超出后按 TinyLFU 淘汰
    #[serde(default = "default_lockout_cache_capacity")]
    pub cache_capacity: u64,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            default_attempt_limit: default_attempt_limit(),
            lockout_minutes: default_lockout_minutes(),
            failure_window_minutes: default_failure_window_minutes(),
            scope: LockoutScope::default(),
            cache_capacity: default_lockout_cache_capacity(),
        }
    }
}

fn default_attempt_limit() -> u32 {
    5
}

fn default_lockout_minutes() -> i64 {
    30
}

fn default_failure_window_minutes() -> i64 {
    15
}

fn default_lockout_cache_capacity() -> u64 {
    100_000
}

/// 访问守卫的跳转地址
#[derive(Debug, Clone, Deserialize)]
pub struct GuardConfig {
    #[serde(default = "default_login_path")]
    pub login_path: String,
    #[serde(default = "default_location")]
    pub default_location: String,
    /// 没有管理类权限的主体登录后的落地页
    #[serde(default = "default_welcome_location")]
    pub welcome_location: String,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            login_path: default_login_path(),
            default_location: default_location(),
            welcome_location: default_welcome_location(),
        }
    }
}

fn default_login_path() -> String {
    "/admin/login".to_string()
}

fn default_location() -> String {
    "/admin/dashboard".to_string()
}

fn default_welcome_location() -> String {
    "/admin/welcome".to_string()
}

/// 初始数据配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedConfig {
    /// 首个最高权限账号（可选）
    pub apex_email: Option<String>,
    pub apex_username: Option<String>,
    pub apex_password: Option<Secret<String>>,
}

/// 应用配置
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app_name: String,
    pub app_env: String,
    pub database: DatabaseConfig,
    pub redis: Option<RedisConfig>,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub lockout: LockoutConfig,
    #[serde(default)]
    pub guard: GuardConfig,
    #[serde(default)]
    pub seed: SeedConfig,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let figment = Figment::new()
            .merge(Toml::file(format!("{}/default.toml", config_dir)))
            .merge(Toml::file(format!("{}/{}.toml", config_dir, env)))
            .merge(Env::prefixed("APP_").split("__"));

        Self::from_figment(figment)
    }

    /// 从已组装的 Figment 提取配置
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        Ok(figment.extract()?)
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.app_env == "production"
    }

    /// 是否为开发环境
    pub fn is_development(&self) -> bool {
        self.app_env == "development"
    }
}
