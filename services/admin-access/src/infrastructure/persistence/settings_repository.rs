//! 运行时设置（settings 表）

use async_trait::async_trait;
use bastion_errors::AppResult;
use bastion_ports::SettingsPort;
use sqlx::PgPool;

use super::error_mapper::map_sqlx_error;

/// 基于 PostgreSQL 的设置存储
///
/// 每次读取都查询数据库，不做缓存。
pub struct PostgresSettingsRepository {
    pool: PgPool,
}

impl PostgresSettingsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 仅在键不存在时写入默认值
    pub async fn ensure_default(
        &self,
        key: &str,
        value: &str,
        group: &str,
        description: &str,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO settings (key, value, grp, description, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (key) DO NOTHING
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(group)
        .bind(description)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl SettingsPort for PostgresSettingsRepository {
    async fn get_setting(&self, key: &str) -> AppResult<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(|(v,)| v))
    }

    async fn put_setting(&self, key: &str, value: &str) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }
}
