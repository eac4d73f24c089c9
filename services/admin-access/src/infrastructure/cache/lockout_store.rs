//! 基于 CachePort 的锁定状态存储

use async_trait::async_trait;
use bastion_errors::{AppError, AppResult};
use bastion_ports::CachePort;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::lockout::{LockoutState, LockoutStore};

/// 将锁定状态以 JSON 保存在任意缓存中
pub struct CacheLockoutStore {
    cache: Arc<dyn CachePort>,
    prefix: String,
}

impl CacheLockoutStore {
    pub fn new(cache: Arc<dyn CachePort>) -> Self {
        Self {
            cache,
            prefix: "lockout".to_string(),
        }
    }

    fn key(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }
}

#[async_trait]
impl LockoutStore for CacheLockoutStore {
    async fn get(&self, key: &str) -> AppResult<Option<LockoutState>> {
        let Some(raw) = self.cache.get(&self.key(key)).await? else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(state) => Ok(Some(state)),
            Err(e) => {
                // 无法解析的旧数据视为不存在
                tracing::warn!(key = %key, error = %e, "Discarding unreadable lockout state");
                self.cache.delete(&self.key(key)).await?;
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, state: &LockoutState, ttl: Duration) -> AppResult<()> {
        let raw = serde_json::to_string(state)
            .map_err(|e| AppError::internal(format!("JSON serialization error: {}", e)))?;
        self.cache.set(&self.key(key), &raw, Some(ttl)).await
    }

    async fn expire(&self, key: &str) -> AppResult<()> {
        self.cache.delete(&self.key(key)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::cache::LocalCache;
    use chrono::Utc;

    #[tokio::test]
    async fn test_roundtrip_and_expire() {
        let cache: Arc<dyn CachePort> = Arc::new(LocalCache::default());
        let store = CacheLockoutStore::new(cache.clone());
        let state = LockoutState {
            failed_attempts: 2,
            lockout_until: Some(Utc::now()),
        };

        store.set("s1:alice@example.com", &state, Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get("s1:alice@example.com").await.unwrap(), Some(state));
        assert!(cache.exists("lockout:s1:alice@example.com").await.unwrap());

        store.expire("s1:alice@example.com").await.unwrap();
        assert!(store.get("s1:alice@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_garbage_is_discarded() {
        let cache: Arc<dyn CachePort> = Arc::new(LocalCache::default());
        cache.set("lockout:k", "not json", None).await.unwrap();

        let store = CacheLockoutStore::new(cache.clone());
        assert!(store.get("k").await.unwrap().is_none());
        assert!(!cache.exists("lockout:k").await.unwrap());
    }
}
