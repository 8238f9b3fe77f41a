//! Exponential reconnect delay.

use std::time::Duration;

/// Yields `min(base * 2^attempt, max)` and counts attempts until [`reset`].
///
/// [`reset`]: Backoff::reset
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    attempt: u32,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max, attempt: 0 }
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Delay before the next reconnect, advancing the attempt counter.
    pub fn next_delay(&mut self) -> Duration {
        let factor = 2u32.checked_pow(self.attempt).unwrap_or(u32::MAX);
        let delay = self.base.checked_mul(factor).unwrap_or(self.max).min(self.max);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    /// Called once a connection opens.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_delays_double_until_capped() {
        // Arrange
        let mut backoff = Backoff::new(secs(1), secs(30));

        // Act
        let delays: Vec<Duration> = (0..7).map(|_| backoff.next_delay()).collect();

        // Assert
        assert_eq!(
            delays,
            vec![secs(1), secs(2), secs(4), secs(8), secs(16), secs(30), secs(30)]
        );
    }

    #[test]
    fn test_reset_restarts_from_base() {
        let mut backoff = Backoff::new(secs(1), secs(30));
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
        assert_eq!(backoff.next_delay(), secs(1));
    }

    #[test]
    fn test_huge_attempt_count_does_not_overflow() {
        let mut backoff = Backoff::new(secs(1), secs(30));
        for _ in 0..100 {
            backoff.next_delay();
        }
        assert_eq!(backoff.next_delay(), secs(30));
    }
}
