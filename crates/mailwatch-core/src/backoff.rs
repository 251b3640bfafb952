//! Reconnect budget: bounded automatic reconnection with exponential
//! backoff. The budget resets on every successful open; exhaustion is a
//! terminal condition requiring explicit re-enable.

use std::time::Duration;

/// Base delay for the first retry.
pub const BASE_DELAY_MS: u64 = 1000;

/// Upper bound on any single retry delay.
pub const CAP_DELAY_MS: u64 = 30_000;

/// Retries allowed before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Backoff delay for the 0-indexed attempt `n`: `min(base * 2^n, cap)`.
pub fn backoff_delay(attempt: u32) -> Duration {
    let ms = BASE_DELAY_MS
        .saturating_mul(2u64.saturating_pow(attempt))
        .min(CAP_DELAY_MS);
    Duration::from_millis(ms)
}

/// Tracks consecutive failed connection attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectBudget {
    attempt: u32,
    max_attempts: u32,
}

impl ReconnectBudget {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempt: 0,
            max_attempts,
        }
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Record a failed attempt. Returns the delay to wait before the next
    /// try, or `None` when the budget is exhausted. The counter increments
    /// before the next try is scheduled, so the n-th failure (1-indexed)
    /// yields the delay for 0-indexed attempt `n - 1`.
    pub fn register_failure(&mut self) -> Option<Duration> {
        self.attempt = self.attempt.saturating_add(1);
        if self.attempt >= self.max_attempts {
            None
        } else {
            Some(backoff_delay(self.attempt - 1))
        }
    }

    /// Reset on successful open, regardless of prior failures.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }
}

impl Default for ReconnectBudget {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_until_cap() {
        assert_eq!(backoff_delay(0), Duration::from_millis(1000));
        assert_eq!(backoff_delay(1), Duration::from_millis(2000));
        assert_eq!(backoff_delay(2), Duration::from_millis(4000));
        assert_eq!(backoff_delay(3), Duration::from_millis(8000));
        assert_eq!(backoff_delay(4), Duration::from_millis(16000));
        assert_eq!(backoff_delay(5), Duration::from_millis(30000));
        assert_eq!(backoff_delay(10), Duration::from_millis(30000));
    }

    #[test]
    fn delay_is_min_of_doubling_and_cap() {
        for n in 0..16 {
            let expected = (1000u64 * 2u64.saturating_pow(n)).min(30000);
            assert_eq!(backoff_delay(n), Duration::from_millis(expected));
        }
    }

    // Consecutive failures walk the ladder 1000, 2000, 4000, 8000 ms;
    // the fifth failure exhausts the default budget.
    #[test]
    fn five_failures_exhaust_default_budget() {
        let mut budget = ReconnectBudget::default();
        assert_eq!(
            budget.register_failure(),
            Some(Duration::from_millis(1000))
        );
        assert_eq!(
            budget.register_failure(),
            Some(Duration::from_millis(2000))
        );
        assert_eq!(
            budget.register_failure(),
            Some(Duration::from_millis(4000))
        );
        assert_eq!(
            budget.register_failure(),
            Some(Duration::from_millis(8000))
        );
        assert_eq!(budget.register_failure(), None);
        assert!(budget.exhausted());
    }

    #[test]
    fn reset_clears_attempts_after_any_number_of_failures() {
        let mut budget = ReconnectBudget::default();
        budget.register_failure();
        budget.register_failure();
        budget.register_failure();
        assert_eq!(budget.attempt(), 3);
        budget.reset();
        assert_eq!(budget.attempt(), 0);
        assert!(!budget.exhausted());
        // Fresh budget goes through the full ladder again.
        assert_eq!(
            budget.register_failure(),
            Some(Duration::from_millis(1000))
        );
    }

    #[test]
    fn exhausted_budget_stays_exhausted_until_reset() {
        let mut budget = ReconnectBudget::new(2);
        assert_eq!(
            budget.register_failure(),
            Some(Duration::from_millis(1000))
        );
        assert_eq!(budget.register_failure(), None);
        assert!(budget.exhausted());
        assert_eq!(budget.register_failure(), None);
        budget.reset();
        assert!(!budget.exhausted());
    }
}
