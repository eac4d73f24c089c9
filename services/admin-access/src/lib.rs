//! Admin Access - 后台授权核心
//!
//! 角色/权限目录、委派策略、授权判定点与登录锁定。

pub mod app;
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;

pub use app::AdminAccess;
