//! 角色与权限目录

mod commands;
mod service;

pub use commands::*;
pub use service::*;
