use std::time::Duration;

/// Bounded exponential backoff for publishing a single record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total publish attempts per delivery cycle, including the first.
    pub max_attempts: u32,

    /// Wait after the first failed attempt.
    pub initial_backoff: Duration,

    /// Multiplier applied to the wait after each further failure.
    pub factor: f64,

    /// Upper bound for a single wait.
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts,
            initial_backoff,
            ..Self::default()
        }
    }

    /// A policy that publishes once and never waits.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn with_factor(mut self, factor: f64) -> Self {
        self.factor = factor;
        self
    }

    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    /// Attempts actually made; a zero setting still publishes once.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Wait after `failed_attempt` (1-based) failed, or `None` when it was
    /// the last attempt.
    pub fn backoff_after(&self, failed_attempt: u32) -> Option<Duration> {
        if failed_attempt >= self.attempts() {
            return None;
        }
        let exponent = i32::try_from(failed_attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let scale = self.factor.max(1.0).powi(exponent);
        let secs = self.initial_backoff.as_secs_f64() * scale;
        let wait = Duration::try_from_secs_f64(secs).unwrap_or(self.max_backoff);
        Some(wait.min(self.max_backoff))
    }
}

impl Default for RetryPolicy {
    /// Three attempts, waiting 1s then 2s.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            factor: 2.0,
            max_backoff: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_doubles_from_one_second() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_after(1), Some(Duration::from_secs(1)));
        assert_eq!(policy.backoff_after(2), Some(Duration::from_secs(2)));
        assert_eq!(policy.backoff_after(3), None);
    }

    #[test]
    fn backoff_is_capped() {
        let policy = RetryPolicy::new(10, Duration::from_secs(1))
            .with_max_backoff(Duration::from_secs(5));
        assert_eq!(policy.backoff_after(3), Some(Duration::from_secs(4)));
        assert_eq!(policy.backoff_after(4), Some(Duration::from_secs(5)));
        assert_eq!(policy.backoff_after(9), Some(Duration::from_secs(5)));
    }

    #[test]
    fn factor_below_one_keeps_constant_wait() {
        let policy = RetryPolicy::new(4, Duration::from_millis(100)).with_factor(0.5);
        assert_eq!(policy.backoff_after(3), Some(Duration::from_millis(100)));
    }

    #[test]
    fn zero_attempts_still_publishes_once() {
        let policy = RetryPolicy::new(0, Duration::from_secs(1));
        assert_eq!(policy.attempts(), 1);
        assert_eq!(policy.backoff_after(1), None);
        assert_eq!(RetryPolicy::no_retry().backoff_after(1), None);
    }
}
