//! Failed-PIN attempt counting with exponential backoff

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::LockoutConfig;
use crate::error::{Error, Result};

/// Snapshot of the process-wide attempt counter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockoutState {
    pub failure_count: u32,
    pub last_failure_at: Option<DateTime<Utc>>,
}

/// Shared between the PIN and biometric unlock paths; every update happens
/// under one lock so racing attempts never lose an increment.
#[derive(Debug, Default)]
pub struct LockoutPolicy {
    config: LockoutConfig,
    state: Mutex<LockoutState>,
}

impl LockoutPolicy {
    pub fn new(config: LockoutConfig) -> Self {
        Self {
            config,
            state: Mutex::new(LockoutState::default()),
        }
    }

    /// Fail with `LockedOut` while a backoff window is open
    pub fn check(&self) -> Result<()> {
        self.check_at(Utc::now())
    }

    pub fn check_at(&self, now: DateTime<Utc>) -> Result<()> {
        let state = self.state.lock();
        let Some(last) = state.last_failure_at else {
            return Ok(());
        };
        let delay = self.delay_for(state.failure_count);
        if delay == 0 {
            return Ok(());
        }

        let elapsed = (now - last).num_seconds().max(0) as u64;
        if elapsed < delay {
            return Err(Error::LockedOut {
                retry_after_secs: delay - elapsed,
            });
        }
        Ok(())
    }

    /// Count a failed attempt and return the new total
    pub fn record_failure(&self) -> u32 {
        self.record_failure_at(Utc::now())
    }

    pub fn record_failure_at(&self, now: DateTime<Utc>) -> u32 {
        let mut state = self.state.lock();
        state.failure_count = state.failure_count.saturating_add(1);
        state.last_failure_at = Some(now);

        let delay = self.delay_for(state.failure_count);
        if delay > 0 {
            warn!(failures = state.failure_count, delay_secs = delay, "PIN lockout engaged");
        }
        state.failure_count
    }

    pub fn record_success(&self) {
        *self.state.lock() = LockoutState::default();
    }

    pub fn state(&self) -> LockoutState {
        self.state.lock().clone()
    }

    /// Backoff in seconds after `failures` consecutive misses
    fn delay_for(&self, failures: u32) -> u64 {
        if failures < self.config.max_attempts {
            return 0;
        }
        let exponent = failures - self.config.max_attempts;
        let factor = 1u64.checked_shl(exponent).unwrap_or(u64::MAX);
        self.config
            .base_delay_secs
            .saturating_mul(factor)
            .min(self.config.max_delay_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;

    fn policy() -> LockoutPolicy {
        LockoutPolicy::new(LockoutConfig {
            max_attempts: 3,
            base_delay_secs: 10,
            max_delay_secs: 25,
        })
    }

    #[test]
    fn test_no_lockout_below_threshold() {
        let policy = policy();
        let now = Utc::now();
        policy.record_failure_at(now);
        policy.record_failure_at(now);
        assert!(policy.check_at(now).is_ok());
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = policy();
        let now = Utc::now();
        for _ in 0..3 {
            policy.record_failure_at(now);
        }
        match policy.check_at(now + Duration::seconds(4)) {
            Err(Error::LockedOut { retry_after_secs }) => assert_eq!(retry_after_secs, 6),
            other => panic!("expected lockout, got {:?}", other),
        }
        assert!(policy.check_at(now + Duration::seconds(10)).is_ok());

        policy.record_failure_at(now);
        assert!(matches!(
            policy.check_at(now + Duration::seconds(15)),
            Err(Error::LockedOut { retry_after_secs: 5 })
        ));

        policy.record_failure_at(now);
        assert!(matches!(
            policy.check_at(now),
            Err(Error::LockedOut { retry_after_secs: 25 })
        ));
    }

    #[test]
    fn test_success_resets() {
        let policy = policy();
        for _ in 0..5 {
            policy.record_failure();
        }
        assert!(policy.check().is_err());
        policy.record_success();
        assert_eq!(policy.state(), LockoutState::default());
        assert!(policy.check().is_ok());
    }

    #[test]
    fn test_concurrent_failures_are_counted() {
        let policy = Arc::new(LockoutPolicy::new(LockoutConfig::default()));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let policy = policy.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        policy.record_failure();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(policy.state().failure_count, 200);
    }
}
