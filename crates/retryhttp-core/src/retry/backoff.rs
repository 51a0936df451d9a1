//! Wait time between attempts.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Computes how long to wait after attempt `attempt` (0 = initial try) failed.
pub trait Backoff: Send + Sync {
    fn delay(&self, min: Duration, max: Duration, attempt: u32) -> Duration;
}

impl<F> Backoff for F
where
    F: Fn(Duration, Duration, u32) -> Duration + Send + Sync,
{
    fn delay(&self, min: Duration, max: Duration, attempt: u32) -> Duration {
        self(min, max, attempt)
    }
}

/// `min * 2^attempt`, capped at `max`. Overflow also yields `max`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExponentialBackoff;

impl Backoff for ExponentialBackoff {
    fn delay(&self, min: Duration, max: Duration, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| min.checked_mul(factor))
            .map_or(max, |d| d.min(max))
    }
}

/// Uniform random wait in `[min, max]`, multiplied by the attempt count.
///
/// Spreads out clients that failed at the same moment so they do not all
/// come back at once. With `max <= min` there is nothing to randomise and the
/// result is `min * (attempt + 1)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearJitterBackoff;

impl Backoff for LinearJitterBackoff {
    fn delay(&self, min: Duration, max: Duration, attempt: u32) -> Duration {
        let scale = attempt.saturating_add(1);
        if max <= min {
            return min.saturating_mul(scale);
        }
        let jittered = rand::thread_rng().gen_range(min..=max);
        jittered.saturating_mul(scale)
    }
}

/// Built-in backoff selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    #[default]
    Exponential,
    LinearJitter,
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN: Duration = Duration::from_millis(100);
    const MAX: Duration = Duration::from_secs(5);

    #[test]
    fn exponential_doubles_from_min() {
        let b = ExponentialBackoff;
        assert_eq!(b.delay(MIN, MAX, 0), Duration::from_millis(100));
        assert_eq!(b.delay(MIN, MAX, 1), Duration::from_millis(200));
        assert_eq!(b.delay(MIN, MAX, 3), Duration::from_millis(800));
    }

    #[test]
    fn exponential_is_monotonic_and_bounded() {
        let b = ExponentialBackoff;
        let mut prev = Duration::ZERO;
        for attempt in 0..200 {
            let d = b.delay(MIN, MAX, attempt);
            assert!(d >= prev, "attempt {attempt}: {d:?} < {prev:?}");
            assert!(d >= MIN && d <= MAX, "attempt {attempt}: {d:?} out of bounds");
            prev = d;
        }
    }

    #[test]
    fn exponential_overflow_clamps_to_max() {
        let b = ExponentialBackoff;
        let huge = Duration::from_secs(u64::MAX / 2);
        assert_eq!(b.delay(huge, Duration::MAX, 4), Duration::MAX);
        assert_eq!(b.delay(MIN, MAX, u32::MAX), MAX);
    }

    #[test]
    fn linear_jitter_stays_in_scaled_range() {
        let b = LinearJitterBackoff;
        for attempt in 0..5u32 {
            let scale = attempt + 1;
            for _ in 0..50 {
                let d = b.delay(MIN, MAX, attempt);
                assert!(d >= MIN * scale && d <= MAX * scale, "{d:?}");
            }
        }
    }

    #[test]
    fn linear_jitter_degenerate_range() {
        let b = LinearJitterBackoff;
        assert_eq!(b.delay(MIN, MIN, 2), Duration::from_millis(300));
    }

    #[test]
    fn closures_are_backoffs() {
        let fixed = |_min: Duration, _max: Duration, _attempt: u32| Duration::from_millis(7);
        assert_eq!(fixed.delay(MIN, MAX, 9), Duration::from_millis(7));
    }

    #[test]
    fn backoff_kind_from_toml_name() {
        #[derive(Deserialize)]
        struct Wrap {
            backoff: BackoffKind,
        }
        let w: Wrap = toml::from_str("backoff = \"linear_jitter\"").unwrap();
        assert_eq!(w.backoff, BackoffKind::LinearJitter);
    }
}
