//! 登录锁定守卫
//!
//! 每次尝试：读取上限 → 检查锁定 → 校验凭据 → 更新状态。

use std::sync::Arc;
use std::time::Duration as StdDuration;

use bastion_common::normalize_identifier;
use bastion_config::{LockoutConfig, LockoutScope};
use bastion_errors::{AppError, AppResult, GENERIC_CREDENTIAL_MESSAGE};
use bastion_ports::SettingsPort;
use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use tracing::{debug, instrument, warn};

use crate::domain::lockout::{LockoutPhase, LockoutStore, format_remaining};

/// 登录尝试上限的设置键
pub const LOGIN_ATTEMPT_LIMIT_KEY: &str = "login_attempt_limit";

const FALLBACK_ATTEMPT_LIMIT: u32 = 5;

/// 尝试结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptStatus {
    Success,
    Rejected,
    Locked,
}

impl AttemptStatus {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Rejected => "rejected",
            Self::Locked => "locked",
        }
    }
}

/// 一次尝试的对外结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptOutcome {
    pub status: AttemptStatus,
    pub message: String,
    /// 被拒绝后剩余的尝试次数
    pub remaining_attempts: Option<u32>,
    /// 锁定剩余秒数
    pub remaining_seconds: Option<i64>,
    /// 下一次失败将触发锁定
    pub final_attempt: bool,
}

impl AttemptOutcome {
    fn success() -> Self {
        Self {
            status: AttemptStatus::Success,
            message: String::new(),
            remaining_attempts: None,
            remaining_seconds: None,
            final_attempt: false,
        }
    }

    fn rejected(remaining: u32, lockout_minutes: i64) -> Self {
        let final_attempt = remaining == 1;
        let message = if final_attempt {
            format!(
                "{}. This is your final attempt before the account is locked for {} minutes.",
                GENERIC_CREDENTIAL_MESSAGE, lockout_minutes
            )
        } else {
            format!("{}. {} attempts remaining.", GENERIC_CREDENTIAL_MESSAGE, remaining)
        };
        Self {
            status: AttemptStatus::Rejected,
            message,
            remaining_attempts: Some(remaining),
            remaining_seconds: None,
            final_attempt,
        }
    }

    fn locked(remaining_seconds: i64) -> Self {
        Self {
            status: AttemptStatus::Locked,
            message: format!(
                "Too many failed attempts. Try again in {}.",
                format_remaining(remaining_seconds)
            ),
            remaining_attempts: Some(0),
            remaining_seconds: Some(remaining_seconds),
            final_attempt: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == AttemptStatus::Success
    }

    /// 失败结果对应的错误
    pub fn to_error(&self) -> Option<AppError> {
        match self.status {
            AttemptStatus::Success => None,
            AttemptStatus::Rejected => Some(AppError::InvalidCredential),
            AttemptStatus::Locked => Some(AppError::locked(self.message.clone())),
        }
    }
}

/// 尝试结果，成功时携带校验函数返回的值
#[derive(Debug, Clone)]
pub struct AttemptResult<T> {
    pub outcome: AttemptOutcome,
    pub value: Option<T>,
}

/// 只读的锁定状态查询结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockoutStatus {
    pub phase: LockoutPhase,
    pub locked: bool,
    pub failed_attempts: u32,
    pub remaining_attempts: u32,
    pub remaining_seconds: Option<i64>,
    pub lockout_until: Option<DateTime<Utc>>,
}

/// 登录锁定守卫
pub struct LockoutGuard {
    store: Arc<dyn LockoutStore>,
    settings: Arc<dyn SettingsPort>,
    config: LockoutConfig,
}

impl LockoutGuard {
    pub fn new(
        store: Arc<dyn LockoutStore>,
        settings: Arc<dyn SettingsPort>,
        config: LockoutConfig,
    ) -> Self {
        Self {
            store,
            settings,
            config,
        }
    }

    /// 以当前时间进行一次尝试
    pub async fn attempt<T, F, Fut>(
        &self,
        session_id: &str,
        identifier: &str,
        verify: F,
    ) -> AppResult<AttemptResult<T>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = AppResult<Option<T>>>,
    {
        self.attempt_at(Utc::now(), session_id, identifier, verify).await
    }

    /// 在给定时间进行一次尝试
    ///
    /// `verify` 返回 `Ok(None)` 表示凭据错误；返回错误时状态不变。
    /// 处于锁定期内时不会调用 `verify`。
    #[instrument(skip(self, verify), fields(identifier = %normalize_identifier(identifier)))]
    pub async fn attempt_at<T, F, Fut>(
        &self,
        now: DateTime<Utc>,
        session_id: &str,
        identifier: &str,
        verify: F,
    ) -> AppResult<AttemptResult<T>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = AppResult<Option<T>>>,
    {
        let limit = self.attempt_limit().await;
        let key = self.key(session_id, identifier);
        let mut state = self.store.get(&key).await?.unwrap_or_default();

        if let Some(remaining) = state.remaining_seconds(now) {
            debug!(remaining_seconds = remaining, "Attempt while locked");
            return Ok(self.finish(AttemptOutcome::locked(remaining), None));
        }
        if state.lock_expired_at(now) {
            state.reset();
        }

        match verify().await? {
            Some(value) => {
                self.store.expire(&key).await?;
                Ok(self.finish(AttemptOutcome::success(), Some(value)))
            }
            None => {
                let lock_for = Duration::minutes(self.config.lockout_minutes);
                if state.register_failure(now, limit, lock_for) {
                    warn!(
                        failed_attempts = state.failed_attempts,
                        lockout_minutes = self.config.lockout_minutes,
                        "Identifier locked after repeated failures"
                    );
                    self.store
                        .set(&key, &state, minutes(self.config.lockout_minutes))
                        .await?;
                    let remaining = state.remaining_seconds(now).unwrap_or_default();
                    return Ok(self.finish(AttemptOutcome::locked(remaining), None));
                }

                self.store
                    .set(&key, &state, minutes(self.config.failure_window_minutes))
                    .await?;
                let outcome = AttemptOutcome::rejected(
                    state.remaining_attempts(limit),
                    self.config.lockout_minutes,
                );
                Ok(self.finish(outcome, None))
            }
        }
    }

    /// 查询锁定状态，不修改状态
    pub async fn status(&self, session_id: &str, identifier: &str) -> AppResult<LockoutStatus> {
        self.status_at(Utc::now(), session_id, identifier).await
    }

    pub async fn status_at(
        &self,
        now: DateTime<Utc>,
        session_id: &str,
        identifier: &str,
    ) -> AppResult<LockoutStatus> {
        let limit = self.attempt_limit().await;
        let mut state = self
            .store
            .get(&self.key(session_id, identifier))
            .await?
            .unwrap_or_default();
        if state.lock_expired_at(now) {
            state.reset();
        }

        Ok(LockoutStatus {
            phase: state.phase(now, limit),
            locked: state.is_locked_at(now),
            failed_attempts: state.failed_attempts,
            remaining_attempts: state.remaining_attempts(limit),
            remaining_seconds: state.remaining_seconds(now),
            lockout_until: state.lockout_until,
        })
    }

    /// 当前生效的尝试上限，每次调用都重新读取
    pub async fn attempt_limit(&self) -> u32 {
        let fallback = match self.config.default_attempt_limit {
            0 => FALLBACK_ATTEMPT_LIMIT,
            n => n,
        };

        match self.settings.get_setting(LOGIN_ATTEMPT_LIMIT_KEY).await {
            Ok(Some(raw)) => match raw.trim().parse::<u32>() {
                Ok(limit) if limit > 0 => limit,
                _ => {
                    warn!(value = %raw, "Invalid login attempt limit, using default");
                    fallback
                }
            },
            Ok(None) => fallback,
            Err(e) => {
                warn!(error = %e, "Failed to read login attempt limit, using default");
                fallback
            }
        }
    }

    fn key(&self, session_id: &str, identifier: &str) -> String {
        let identifier = normalize_identifier(identifier);
        match self.config.scope {
            LockoutScope::Session => format!("{}:{}", session_id, identifier),
            LockoutScope::Identifier => identifier,
        }
    }

    fn finish<T>(&self, outcome: AttemptOutcome, value: Option<T>) -> AttemptResult<T> {
        counter!("login_attempts_total", "outcome" => outcome.status.as_str()).increment(1);
        AttemptResult { outcome, value }
    }
}

fn minutes(m: i64) -> StdDuration {
    StdDuration::from_secs(m.max(1).unsigned_abs() * 60)
}
