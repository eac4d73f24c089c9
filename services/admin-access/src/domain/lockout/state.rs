//! 锁定状态机
//!
//! `Clear → Warning → Locked → Clear`，时间由调用方传入。

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// 单个登录标识的失败计数
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockoutState {
    pub failed_attempts: u32,
    pub lockout_until: Option<DateTime<Utc>>,
}

/// 状态机阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockoutPhase {
    Clear,
    /// 下一次失败将触发锁定
    Warning,
    Locked,
}

impl LockoutState {
    pub fn phase(&self, now: DateTime<Utc>, limit: u32) -> LockoutPhase {
        if self.is_locked_at(now) {
            LockoutPhase::Locked
        } else if self.lockout_until.is_none()
            && self.failed_attempts > 0
            && self.failed_attempts + 1 >= limit
        {
            LockoutPhase::Warning
        } else {
            LockoutPhase::Clear
        }
    }

    pub fn is_locked_at(&self, now: DateTime<Utc>) -> bool {
        self.lockout_until.is_some_and(|until| now < until)
    }

    /// 锁定已过期（需要重置后再继续）
    pub fn lock_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.lockout_until.is_some_and(|until| now >= until)
    }

    /// 剩余锁定秒数，向上取整
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> Option<i64> {
        let until = self.lockout_until?;
        if now >= until {
            return None;
        }
        let millis = (until - now).num_milliseconds();
        Some((millis + 999) / 1000)
    }

    /// 记录一次失败，达到上限时进入锁定并返回 true
    pub fn register_failure(&mut self, now: DateTime<Utc>, limit: u32, lock_for: Duration) -> bool {
        self.failed_attempts = self.failed_attempts.saturating_add(1);
        if self.failed_attempts >= limit {
            self.lockout_until = Some(now + lock_for);
            true
        } else {
            false
        }
    }

    /// 剩余可尝试次数
    pub fn remaining_attempts(&self, limit: u32) -> u32 {
        limit.saturating_sub(self.failed_attempts)
    }

    pub fn reset(&mut self) {
        self.failed_attempts = 0;
        self.lockout_until = None;
    }
}

/// 以 `m:ss` 格式化剩余秒数
pub fn format_remaining(seconds: i64) -> String {
    let seconds = seconds.max(0);
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failures_lead_to_lock() {
        let now = Utc::now();
        let mut state = LockoutState::default();
        assert_eq!(state.phase(now, 5), LockoutPhase::Clear);

        for _ in 0..3 {
            assert!(!state.register_failure(now, 5, Duration::minutes(30)));
        }
        assert_eq!(state.phase(now, 5), LockoutPhase::Clear);

        assert!(!state.register_failure(now, 5, Duration::minutes(30)));
        assert_eq!(state.phase(now, 5), LockoutPhase::Warning);
        assert_eq!(state.remaining_attempts(5), 1);

        assert!(state.register_failure(now, 5, Duration::minutes(30)));
        assert_eq!(state.phase(now, 5), LockoutPhase::Locked);
        assert_eq!(state.remaining_seconds(now), Some(30 * 60));
    }

    #[test]
    fn test_lock_expiry() {
        let now = Utc::now();
        let state = LockoutState {
            failed_attempts: 5,
            lockout_until: Some(now + Duration::seconds(10)),
        };

        assert!(state.is_locked_at(now));
        assert!(!state.lock_expired_at(now));
        let later = now + Duration::seconds(10);
        assert!(!state.is_locked_at(later));
        assert!(state.lock_expired_at(later));
        assert_eq!(state.remaining_seconds(later), None);
    }

    #[test]
    fn test_remaining_rounds_up() {
        let now = Utc::now();
        let state = LockoutState {
            failed_attempts: 5,
            lockout_until: Some(now + Duration::milliseconds(1500)),
        };
        assert_eq!(state.remaining_seconds(now), Some(2));
    }

    #[test]
    fn test_format_remaining() {
        assert_eq!(format_remaining(1800), "30:00");
        assert_eq!(format_remaining(61), "1:01");
        assert_eq!(format_remaining(-3), "0:00");
    }

    #[test]
    fn test_reset() {
        let mut state = LockoutState {
            failed_attempts: 3,
            lockout_until: Some(Utc::now()),
        };
        state.reset();
        assert_eq!(state, LockoutState::default());
    }
}
