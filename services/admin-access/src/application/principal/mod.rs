//! 主体管理

mod commands;
mod service;

pub use commands::*;
pub use service::*;
