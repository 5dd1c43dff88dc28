use std::time::Duration;

use chrono::{DateTime, Local, TimeDelta};

use crate::config::ArchiverConfig;

/// Exponential backoff for failed archival attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base: Duration,
    pub max: Duration,
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn from_config(config: &ArchiverConfig) -> Self {
        Self {
            base: config.base_backoff(),
            max: config.max_backoff(),
            max_attempts: config.retry.max_attempts,
        }
    }

    /// Delay after the `attempt`-th consecutive failure (1-based):
    /// `base * 2^(attempt - 1)`, capped at `max`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base
            .checked_mul(1u32 << exponent)
            .map_or(self.max, |d| d.min(self.max))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureOutcome {
    RetryAt {
        attempt: u32,
        at: DateTime<Local>,
    },
    /// The budget was just spent. Attempts continue every `max` delay.
    DeadLettered {
        attempts: u32,
        retry_at: DateTime<Local>,
    },
    /// Another failed attempt on an entry that was already dead-lettered.
    StillFailing {
        attempts: u32,
        retry_at: DateTime<Local>,
    },
}

fn after(now: DateTime<Local>, delay: Duration) -> DateTime<Local> {
    let delay = TimeDelta::from_std(delay).unwrap_or(TimeDelta::MAX);
    now.checked_add_signed(delay).unwrap_or(now)
}

/// Per-file retry bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct RetryState {
    attempts: u32,
    next_attempt_at: Option<DateTime<Local>>,
    last_error: Option<String>,
    dead_lettered: bool,
}

impl RetryState {
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_dead_lettered(&self) -> bool {
        self.dead_lettered
    }

    pub fn next_attempt_at(&self) -> Option<DateTime<Local>> {
        self.next_attempt_at
    }

    /// Whether an attempt may run at `now`.
    pub fn is_ready(&self, now: DateTime<Local>) -> bool {
        self.next_attempt_at.map_or(true, |at| now >= at)
    }

    /// Forgets past failures so the next attempt runs immediately.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn record_failure(
        &mut self,
        policy: &RetryPolicy,
        now: DateTime<Local>,
        error: String,
    ) -> FailureOutcome {
        self.attempts += 1;
        self.last_error = Some(error);

        if self.attempts >= policy.max_attempts {
            let retry_at = after(now, policy.max);
            self.next_attempt_at = Some(retry_at);
            let attempts = self.attempts;
            if std::mem::replace(&mut self.dead_lettered, true) {
                return FailureOutcome::StillFailing { attempts, retry_at };
            }
            return FailureOutcome::DeadLettered { attempts, retry_at };
        }

        let at = after(now, policy.delay_after(self.attempts));
        self.next_attempt_at = Some(at);
        FailureOutcome::RetryAt {
            attempt: self.attempts,
            at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            base: Duration::from_secs(2),
            max: Duration::from_secs(300),
            max_attempts: 10,
        }
    }

    fn at(secs: i64) -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap() + TimeDelta::seconds(secs)
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let p = policy();
        assert_eq!(p.delay_after(1), Duration::from_secs(2));
        assert_eq!(p.delay_after(2), Duration::from_secs(4));
        assert_eq!(p.delay_after(3), Duration::from_secs(8));
        assert_eq!(p.delay_after(8), Duration::from_secs(256));
        assert_eq!(p.delay_after(9), Duration::from_secs(300));
        assert_eq!(p.delay_after(40), Duration::from_secs(300));
    }

    #[test]
    fn test_policy_from_config_uses_poll_interval() {
        let config = ArchiverConfig::new("/a", "/b", "/c", "/d");
        let p = RetryPolicy::from_config(&config);
        assert_eq!(p.base, Duration::from_secs(2));
        assert_eq!(p.max_attempts, 10);
    }

    #[test]
    fn test_first_failure_retries_one_base_later() {
        let mut state = RetryState::default();
        assert!(state.is_ready(at(0)));

        let outcome = state.record_failure(&policy(), at(0), "boom".to_string());
        assert_eq!(
            outcome,
            FailureOutcome::RetryAt {
                attempt: 1,
                at: at(2)
            }
        );
        assert!(!state.is_ready(at(1)));
        assert!(state.is_ready(at(2)));
        assert_eq!(state.last_error(), Some("boom"));
    }

    #[test]
    fn test_dead_letter_after_budget_keeps_retrying() {
        let p = RetryPolicy {
            max_attempts: 3,
            ..policy()
        };
        let mut state = RetryState::default();
        state.record_failure(&p, at(0), "e1".to_string());
        state.record_failure(&p, at(2), "e2".to_string());
        let outcome = state.record_failure(&p, at(6), "e3".to_string());

        assert_eq!(
            outcome,
            FailureOutcome::DeadLettered {
                attempts: 3,
                retry_at: at(306)
            }
        );
        assert!(state.is_dead_lettered());
        assert!(!state.is_ready(at(305)));
        assert!(state.is_ready(at(306)));

        let outcome = state.record_failure(&p, at(306), "e4".to_string());
        assert_eq!(
            outcome,
            FailureOutcome::StillFailing {
                attempts: 4,
                retry_at: at(606)
            }
        );
        assert_eq!(state.last_error(), Some("e4"));
    }

    #[test]
    fn test_reset_clears_dead_letter() {
        let p = RetryPolicy {
            max_attempts: 1,
            ..policy()
        };
        let mut state = RetryState::default();
        state.record_failure(&p, at(0), "e1".to_string());
        assert!(state.is_dead_lettered());

        state.reset();
        assert!(!state.is_dead_lettered());
        assert_eq!(state.attempts(), 0);
        assert!(state.is_ready(at(0)));
    }
}
