//! 登录锁定守卫

mod guard;

pub use guard::*;
