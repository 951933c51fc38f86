//! Outer retry schedule for webhook delivery.

use std::time::Duration;

/// Bounded retry with an explicit backoff schedule.
///
/// The `n`th backoff entry is waited after the `n`th failed attempt. When the
/// attempts outnumber the schedule, the last entry repeats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub backoff: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: [10, 30, 60, 300, 900]
                .into_iter()
                .map(Duration::from_secs)
                .collect(),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Vec<Duration>) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Retry without waiting between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Vec::new())
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_after_attempt(&self, attempt: u32) -> Duration {
        let index = (attempt.max(1) - 1) as usize;
        self.backoff
            .get(index)
            .or_else(|| self.backoff.last())
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    /// Whether another attempt may follow the given attempt (1-based).
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.delay_after_attempt(1), Duration::from_secs(10));
        assert_eq!(policy.delay_after_attempt(2), Duration::from_secs(30));
        assert_eq!(policy.delay_after_attempt(3), Duration::from_secs(60));
        assert_eq!(policy.delay_after_attempt(4), Duration::from_secs(300));
        assert_eq!(policy.delay_after_attempt(5), Duration::from_secs(900));
    }

    #[test]
    fn test_last_entry_repeats() {
        let policy = RetryPolicy::new(8, vec![Duration::from_secs(1), Duration::from_secs(2)]);
        assert_eq!(policy.delay_after_attempt(2), Duration::from_secs(2));
        assert_eq!(policy.delay_after_attempt(7), Duration::from_secs(2));
    }

    #[test]
    fn test_should_retry() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(4));
        assert!(!policy.should_retry(5));

        let policy = RetryPolicy::immediate(0);
        assert_eq!(policy.max_attempts, 1);
        assert!(!policy.should_retry(1));
        assert_eq!(policy.delay_after_attempt(1), Duration::ZERO);
    }
}
