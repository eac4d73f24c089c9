//! 登录锁定集成测试

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use admin_access::application::lockout::{AttemptStatus, LOGIN_ATTEMPT_LIMIT_KEY, LockoutGuard};
use admin_access::domain::lockout::LockoutPhase;
use admin_access::infrastructure::cache::{CacheLockoutStore, LocalCache};
use admin_access::infrastructure::persistence::InMemorySettings;
use bastion_config::{LockoutConfig, LockoutScope};
use bastion_errors::{AppError, AppResult};
use bastion_ports::SettingsPort;
use chrono::{Duration, TimeZone, Utc};

const SESSION: &str = "session-a";
const EMAIL: &str = "alice@example.com";

fn guard_with(settings: Arc<InMemorySettings>, scope: LockoutScope) -> LockoutGuard {
    let config = LockoutConfig {
        scope,
        ..LockoutConfig::default()
    };
    LockoutGuard::new(
        Arc::new(CacheLockoutStore::new(Arc::new(LocalCache::default()))),
        settings,
        config,
    )
}

fn guard() -> LockoutGuard {
    guard_with(Arc::new(InMemorySettings::new()), LockoutScope::Session)
}

async fn wrong() -> AppResult<Option<()>> {
    Ok(None)
}

async fn right() -> AppResult<Option<()>> {
    Ok(Some(()))
}

#[tokio::test]
async fn test_lockout_sequence_with_default_limit() {
    let guard = guard();
    let start = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();

    for (i, expected) in [4u32, 3, 2, 1].into_iter().enumerate() {
        let now = start + Duration::seconds(i as i64);
        let result = guard.attempt_at(now, SESSION, EMAIL, wrong).await.unwrap();
        assert_eq!(result.outcome.status, AttemptStatus::Rejected);
        assert_eq!(result.outcome.remaining_attempts, Some(expected));
        assert_eq!(result.outcome.final_attempt, expected == 1);
    }

    let fifth = start + Duration::seconds(4);
    let locked = guard.attempt_at(fifth, SESSION, EMAIL, wrong).await.unwrap();
    assert_eq!(locked.outcome.status, AttemptStatus::Locked);
    assert_eq!(locked.outcome.remaining_seconds, Some(30 * 60));

    let status = guard.status_at(fifth, SESSION, EMAIL).await.unwrap();
    assert!(status.locked);
    assert_eq!(status.lockout_until, Some(fifth + Duration::minutes(30)));

    let sixth = guard
        .attempt_at(fifth + Duration::minutes(10), SESSION, EMAIL, right)
        .await
        .unwrap();
    assert_eq!(sixth.outcome.status, AttemptStatus::Locked);
    assert_eq!(sixth.outcome.remaining_seconds, Some(20 * 60));
    assert!(sixth.outcome.message.contains("20:00"));
    assert!(sixth.value.is_none());

    let seventh = guard
        .attempt_at(fifth + Duration::minutes(25), SESSION, EMAIL, wrong)
        .await
        .unwrap();
    assert_eq!(seventh.outcome.remaining_seconds, Some(5 * 60));

    let after = fifth + Duration::minutes(30);
    let success = guard.attempt_at(after, SESSION, EMAIL, right).await.unwrap();
    assert_eq!(success.outcome.status, AttemptStatus::Success);
    assert!(success.value.is_some());

    let status = guard.status_at(after, SESSION, EMAIL).await.unwrap();
    assert!(!status.locked);
    assert_eq!(status.failed_attempts, 0);
    assert_eq!(status.remaining_attempts, 5);
}

#[tokio::test]
async fn test_status_reports_phase() {
    let guard = guard();
    let now = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();

    let status = guard.status_at(now, SESSION, EMAIL).await.unwrap();
    assert_eq!(status.phase, LockoutPhase::Clear);

    for _ in 0..3 {
        guard.attempt_at(now, SESSION, EMAIL, wrong).await.unwrap();
    }
    let status = guard.status_at(now, SESSION, EMAIL).await.unwrap();
    assert_eq!(status.phase, LockoutPhase::Clear);
    assert_eq!(status.remaining_attempts, 2);

    guard.attempt_at(now, SESSION, EMAIL, wrong).await.unwrap();
    let status = guard.status_at(now, SESSION, EMAIL).await.unwrap();
    assert_eq!(status.phase, LockoutPhase::Warning);

    guard.attempt_at(now, SESSION, EMAIL, wrong).await.unwrap();
    let status = guard.status_at(now, SESSION, EMAIL).await.unwrap();
    assert_eq!(status.phase, LockoutPhase::Locked);
    assert!(status.locked);

    let later = now + Duration::minutes(30);
    let status = guard.status_at(later, SESSION, EMAIL).await.unwrap();
    assert_eq!(status.phase, LockoutPhase::Clear);
    assert_eq!(status.failed_attempts, 0);
}

#[tokio::test]
async fn test_credential_not_checked_while_locked() {
    let guard = guard();
    let now = Utc::now();
    for _ in 0..5 {
        guard.attempt_at(now, SESSION, EMAIL, wrong).await.unwrap();
    }

    let calls = AtomicUsize::new(0);
    let result = guard
        .attempt_at(now + Duration::seconds(1), SESSION, EMAIL, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(()))
        })
        .await
        .unwrap();

    assert_eq!(result.outcome.status, AttemptStatus::Locked);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    let status = guard.status_at(now, SESSION, EMAIL).await.unwrap();
    assert_eq!(status.failed_attempts, 5);
}

#[tokio::test]
async fn test_expired_lock_resets_before_verifying() {
    let guard = guard();
    let now = Utc::now();
    for _ in 0..5 {
        guard.attempt_at(now, SESSION, EMAIL, wrong).await.unwrap();
    }

    let later = now + Duration::minutes(31);
    let result = guard.attempt_at(later, SESSION, EMAIL, wrong).await.unwrap();
    assert_eq!(result.outcome.status, AttemptStatus::Rejected);
    assert_eq!(result.outcome.remaining_attempts, Some(4));
}

#[tokio::test]
async fn test_success_resets_counter() {
    let guard = guard();
    let now = Utc::now();
    for _ in 0..3 {
        guard.attempt_at(now, SESSION, EMAIL, wrong).await.unwrap();
    }
    guard.attempt_at(now, SESSION, EMAIL, right).await.unwrap();

    let result = guard.attempt_at(now, SESSION, EMAIL, wrong).await.unwrap();
    assert_eq!(result.outcome.remaining_attempts, Some(4));
}

#[tokio::test]
async fn test_limit_is_read_on_every_attempt() {
    let settings = Arc::new(InMemorySettings::new().with_value(LOGIN_ATTEMPT_LIMIT_KEY, "3"));
    let guard = guard_with(settings.clone(), LockoutScope::Session);
    let now = Utc::now();

    let first = guard.attempt_at(now, SESSION, EMAIL, wrong).await.unwrap();
    assert_eq!(first.outcome.remaining_attempts, Some(2));

    settings.put_setting(LOGIN_ATTEMPT_LIMIT_KEY, "2").await.unwrap();
    let second = guard.attempt_at(now, SESSION, EMAIL, wrong).await.unwrap();
    assert_eq!(second.outcome.status, AttemptStatus::Locked);
}

#[tokio::test]
async fn test_invalid_limit_falls_back_to_default() {
    for raw in ["abc", "0", "-3", ""] {
        let settings = Arc::new(InMemorySettings::new().with_value(LOGIN_ATTEMPT_LIMIT_KEY, raw));
        let guard = guard_with(settings, LockoutScope::Session);
        assert_eq!(guard.attempt_limit().await, 5, "value {:?}", raw);
    }
}

#[tokio::test]
async fn test_session_scope_tracks_sessions_independently() {
    let guard = guard();
    let now = Utc::now();
    for _ in 0..5 {
        guard.attempt_at(now, "session-a", EMAIL, wrong).await.unwrap();
    }

    let other = guard.attempt_at(now, "session-b", EMAIL, wrong).await.unwrap();
    assert_eq!(other.outcome.status, AttemptStatus::Rejected);
    assert_eq!(other.outcome.remaining_attempts, Some(4));
}

#[tokio::test]
async fn test_identifier_scope_shares_state_across_sessions() {
    let guard = guard_with(Arc::new(InMemorySettings::new()), LockoutScope::Identifier);
    let now = Utc::now();
    for _ in 0..5 {
        guard.attempt_at(now, "session-a", EMAIL, wrong).await.unwrap();
    }

    let other = guard
        .attempt_at(now, "session-b", "  Alice@Example.com", right)
        .await
        .unwrap();
    assert_eq!(other.outcome.status, AttemptStatus::Locked);
}

#[tokio::test]
async fn test_verification_error_leaves_state_untouched() {
    let guard = guard();
    let now = Utc::now();
    guard.attempt_at(now, SESSION, EMAIL, wrong).await.unwrap();

    let err = guard
        .attempt_at(now, SESSION, EMAIL, || async {
            Err::<Option<()>, _>(AppError::database("connection reset"))
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Database(_)));

    let status = guard.status_at(now, SESSION, EMAIL).await.unwrap();
    assert_eq!(status.failed_attempts, 1);
}
