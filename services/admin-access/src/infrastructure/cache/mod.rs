//! 缓存实现

mod backend;
mod local_cache;
mod lockout_store;

pub use backend::connect_cache;
pub use local_cache::LocalCache;
pub use lockout_store::CacheLockoutStore;
