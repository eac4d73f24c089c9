//! 授权判定点
//!
//! 以普通函数组合包装受保护的操作：先判定，再执行。

mod guard;
mod requirement;

pub use guard::*;
pub use requirement::*;
