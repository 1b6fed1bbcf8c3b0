//! Bounded exponential backoff for steps that must eventually succeed.

use std::time::Duration;

/// Retry schedule: `initial * multiplier^n`, capped at `max_delay`,
/// for at most `max_attempts` attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Delay after the first failed attempt.
    pub initial_delay: Duration,
    /// Growth factor between consecutive delays (>= 1.0).
    pub multiplier: f64,
    /// Upper bound for a single delay.
    pub max_delay: Duration,
    /// Total attempts, including the first.
    pub max_attempts: u32,
}

impl RetryPolicy {
    /// Delay to wait after `failed_attempts` consecutive failures.
    ///
    /// Returns `None` once the attempt budget is spent.
    pub fn delay_after(&self, failed_attempts: u32) -> Option<Duration> {
        if failed_attempts == 0 || failed_attempts >= self.max_attempts {
            return None;
        }
        let exponent = i32::try_from(failed_attempts - 1).unwrap_or(i32::MAX);
        let factor = self.multiplier.max(1.0).powi(exponent);
        let secs = self.initial_delay.as_secs_f64() * factor;
        let capped = secs.min(self.max_delay.as_secs_f64());
        Some(Duration::from_secs_f64(capped))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            initial_delay: Duration::from_secs(5),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            max_attempts: 6,
        }
    }

    #[test]
    fn test_delays_grow_then_cap() {
        let p = policy();
        assert_eq!(p.delay_after(1), Some(Duration::from_secs(5)));
        assert_eq!(p.delay_after(2), Some(Duration::from_secs(10)));
        assert_eq!(p.delay_after(3), Some(Duration::from_secs(20)));
        assert_eq!(p.delay_after(4), Some(Duration::from_secs(30)));
        assert_eq!(p.delay_after(5), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_budget_is_bounded() {
        let p = policy();
        assert_eq!(p.delay_after(0), None);
        assert_eq!(p.delay_after(6), None);
        assert_eq!(p.delay_after(100), None);
    }

    #[test]
    fn test_multiplier_below_one_is_flat() {
        let p = RetryPolicy {
            multiplier: 0.5,
            ..policy()
        };
        assert_eq!(p.delay_after(3), Some(Duration::from_secs(5)));
    }
}
