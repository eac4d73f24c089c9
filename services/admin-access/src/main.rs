//! Admin Access 启动入口
//!
//! 加载配置、迁移数据库、初始化默认目录，然后报告目录规模。

use std::sync::Arc;

use admin_access::AdminAccess;
use admin_access::domain::lockout::LockoutStore;
use admin_access::infrastructure::cache::{CacheLockoutStore, connect_cache};
use admin_access::infrastructure::persistence::{
    PostgresSettingsRepository, PostgresUnitOfWorkFactory, migrations,
};
use admin_access::infrastructure::security::Argon2Hasher;
use anyhow::Context;
use bastion_adapter_postgres::{MigrationManager, PostgresConfig, check_connection, create_pool};
use bastion_config::{AppConfig, LockoutScope};
use bastion_telemetry::{HealthStatus, init_metrics, init_tracing};
use secrecy::ExposeSecret;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_dir = std::env::var("APP_CONFIG_DIR").unwrap_or_else(|_| "config".to_string());
    let config = AppConfig::load(&config_dir).context("failed to load configuration")?;

    init_tracing(&config.telemetry.log_level, config.telemetry.json)?;
    let _metrics = init_metrics()?;

    info!(
        app_name = %config.app_name,
        app_env = %config.app_env,
        "Starting admin access"
    );

    let pool = create_pool(
        &PostgresConfig::new(config.database.url.expose_secret().clone())
            .with_max_connections(config.database.max_connections),
    )
    .await?;

    let mut health = HealthStatus::new();
    let db_check = check_connection(&pool).await;
    health.add_check("database", db_check.is_ok(), db_check.err().map(|e| e.to_string()));

    if !health.healthy {
        let failing: Vec<&str> = health.failing().collect();
        anyhow::bail!("dependency checks failed: {}", failing.join(", "));
    }

    let report = MigrationManager::new(pool.clone())
        .migrate(&migrations())
        .await?;
    info!(applied = ?report.applied, skipped = report.skipped.len(), "Migrations complete");

    let settings = Arc::new(PostgresSettingsRepository::new(pool.clone()));
    settings
        .ensure_default(
            "login_attempt_limit",
            &config.lockout.default_attempt_limit.to_string(),
            "security",
            "Failed sign-in attempts allowed before the identifier is locked",
        )
        .await?;

    if config.lockout.scope == LockoutScope::Session {
        warn!(
            "Lockout counters are scoped per session; clients that drop their session reset them"
        );
    }

    let cache = connect_cache(
        config.redis.as_ref(),
        &config.app_name,
        config.lockout.cache_capacity,
    )
    .await;
    let lockout_store: Arc<dyn LockoutStore> = Arc::new(CacheLockoutStore::new(cache));
    let hasher = Arc::new(Argon2Hasher::default());
    let access = AdminAccess::new(
        &config,
        Arc::new(PostgresUnitOfWorkFactory::new(pool.clone())),
        settings,
        lockout_store,
        hasher.clone(),
    );

    access.seeder.seed().await?;

    let seed = &config.seed;
    if let (Some(email), Some(password)) = (&seed.apex_email, &seed.apex_password) {
        let username = seed.apex_username.as_deref().unwrap_or("developer");
        let created = access
            .seeder
            .ensure_apex_principal(username, email, password.expose_secret(), hasher.as_ref())
            .await?;
        if created {
            info!(email = %email, "Bootstrap principal ready");
        }
    }

    let roles = access.catalog.roles_by_priority_desc().await?;
    let permissions = access.catalog.permissions_by_category().await?;
    info!(
        roles = roles.len(),
        permission_categories = permissions.len(),
        permissions = permissions.values().map(Vec::len).sum::<usize>(),
        "Catalog ready"
    );

    pool.close().await;
    info!("Admin access stopped");
    Ok(())
}
