//! 登录锁定

mod state;
mod store;

pub use state::*;
pub use store::*;
