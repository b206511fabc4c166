//! Exponential retry delays with optional jitter.

use std::time::Duration;

use rand::Rng;

/// Smallest and largest jitter multipliers (the upper bound is exclusive).
pub const JITTER_RANGE: (f64, f64) = (0.5, 1.5);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    base_delay: Duration,
}

impl BackoffPolicy {
    pub fn new(base_delay: Duration) -> Self {
        Self { base_delay }
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Delay before the retry that follows zero-based `attempt`.
    pub fn delay(&self, attempt: u32, jitter: bool) -> Duration {
        self.delay_with(attempt, jitter, &mut rand::thread_rng())
    }

    /// Same as [`delay`](Self::delay) with a caller-supplied random source.
    pub fn delay_with<R: Rng>(&self, attempt: u32, jitter: bool, rng: &mut R) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let mut secs = self.base_delay.as_secs_f64() * 2f64.powi(exponent);
        if jitter {
            secs *= rng.gen_range(JITTER_RANGE.0..JITTER_RANGE.1);
        }
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_delay_doubles_per_attempt() {
        let policy = BackoffPolicy::new(Duration::from_secs(2));
        for attempt in 0..10 {
            let expected = Duration::from_secs(2 * (1u64 << attempt));
            assert_eq!(policy.delay(attempt, false), expected, "attempt {attempt}");
        }
    }

    #[test]
    fn fractional_base_is_exact_without_jitter() {
        let policy = BackoffPolicy::new(Duration::from_millis(250));
        assert_eq!(policy.delay(0, false), Duration::from_millis(250));
        assert_eq!(policy.delay(3, false), Duration::from_secs(2));
    }

    #[test]
    fn jittered_delay_stays_in_bounds() {
        let policy = BackoffPolicy::new(Duration::from_secs(1));
        for attempt in 0..6 {
            let nominal = policy.delay(attempt, false).as_secs_f64();
            for _ in 0..200 {
                let got = policy.delay(attempt, true).as_secs_f64();
                assert!(got >= nominal * 0.5, "{got} below bound for attempt {attempt}");
                assert!(got < nominal * 1.5, "{got} above bound for attempt {attempt}");
            }
        }
    }

    #[test]
    fn huge_attempt_saturates() {
        let policy = BackoffPolicy::new(Duration::from_secs(1));
        assert_eq!(policy.delay(u32::MAX, false), Duration::MAX);
    }
}
