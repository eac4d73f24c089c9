//! 进程内缓存 (moka)

use async_trait::async_trait;
use bastion_errors::AppResult;
use bastion_ports::CachePort;
use moka::Expiry;
use moka::future::Cache as MokaCache;
use std::time::{Duration, Instant};

#[derive(Clone)]
struct CachedValue {
    value: String,
    ttl: Option<Duration>,
}

/// 按条目 TTL 过期
struct EntryExpiry;

impl Expiry<String, CachedValue> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CachedValue,
        _created_at: Instant,
    ) -> Option<Duration> {
        value.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CachedValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.ttl
    }
}

/// 基于 moka 的本地缓存
///
/// 未配置 Redis 时作为锁定状态的存储；数据随进程重启丢失。
pub struct LocalCache {
    cache: MokaCache<String, CachedValue>,
}

impl LocalCache {
    pub fn new(max_capacity: u64) -> Self {
        let cache = MokaCache::builder()
            .max_capacity(max_capacity)
            .expire_after(EntryExpiry)
            .build();
        Self { cache }
    }
}

impl Default for LocalCache {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl CachePort for LocalCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.cache.get(key).await.map(|v| v.value))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> AppResult<()> {
        self.cache
            .insert(
                key.to_string(),
                CachedValue {
                    value: value.to_string(),
                    ttl,
                },
            )
            .await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        Ok(self.cache.get(key).await.is_some())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> AppResult<()> {
        if let Some(mut entry) = self.cache.get(key).await {
            entry.ttl = Some(ttl);
            self.cache.insert(key.to_string(), entry).await;
        }
        Ok(())
    }
}
