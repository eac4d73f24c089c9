//! 锁定状态缓存后端选择

use std::sync::Arc;

use bastion_adapter_redis::{RedisCache, create_connection_manager};
use bastion_config::RedisConfig;
use bastion_ports::CachePort;
use secrecy::ExposeSecret;
use tracing::{info, warn};

use super::local_cache::LocalCache;

/// 配置了 Redis 且可连接时使用 Redis，否则退回容量为 `local_capacity` 的本地缓存
///
/// 本地缓存满时按 TinyLFU 淘汰，被淘汰的锁定状态等同于 `Clear`。
pub async fn connect_cache(
    redis: Option<&RedisConfig>,
    prefix: &str,
    local_capacity: u64,
) -> Arc<dyn CachePort> {
    let Some(redis) = redis else {
        info!(capacity = local_capacity, "Using local lockout cache");
        return Arc::new(LocalCache::new(local_capacity));
    };

    match create_connection_manager(redis.url.expose_secret()).await {
        Ok(conn) => {
            info!("Using Redis lockout cache");
            Arc::new(RedisCache::new(conn, prefix.to_string()))
        }
        Err(e) => {
            warn!(
                error = %e,
                capacity = local_capacity,
                "Redis unavailable, lockout state falls back to the local cache"
            );
            Arc::new(LocalCache::new(local_capacity))
        }
    }
}
