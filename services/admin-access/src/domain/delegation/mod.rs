//! 委派策略
//!
//! 基于目录快照的纯判定函数：谁可以管理谁、谁能看到谁、谁能分配哪些权限。

mod policy;
mod snapshot;

pub use policy::*;
pub use snapshot::*;
