use rand::Rng;
use reportomat_types::defaults::{
    BACKOFF_BASE_MS, BACKOFF_JITTER_FRACTION, BACKOFF_MULTIPLIER,
};

/// An injected source of randomness, per §9, so backoff jitter is
/// deterministic under test.
pub trait Jitter: Send + Sync {
    /// Returns a value in `[-1.0, 1.0]` used to perturb a backoff delay.
    fn unit(&self) -> f64;
}

#[derive(Clone, Copy, Default)]
pub struct SystemJitter;

impl Jitter for SystemJitter {
    fn unit(&self) -> f64 {
        rand::thread_rng().gen_range(-1.0..=1.0)
    }
}

#[cfg(any(test, feature = "testing"))]
pub struct FixedJitter(pub f64);

#[cfg(any(test, feature = "testing"))]
impl Jitter for FixedJitter {
    fn unit(&self) -> f64 {
        self.0
    }
}

/// Exponential backoff with jitter, per §4.5: base 30s, multiplier 4,
/// jitter band ±20%. `attempt` is 1-indexed (the first retry after a
/// failed attempt 1 uses `attempt=1`).
pub fn backoff_ms(attempt: u32, jitter: &dyn Jitter) -> i64 {
    let exponent = attempt.saturating_sub(1);
    let base = (BACKOFF_BASE_MS as f64)
        * (BACKOFF_MULTIPLIER as f64).powi(exponent as i32);
    let perturbed = base * (1.0 + jitter.unit() * BACKOFF_JITTER_FRACTION);
    perturbed.max(0.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_sequence_matches_default_schedule() {
        let no_jitter = FixedJitter(0.0);
        assert_eq!(backoff_ms(1, &no_jitter), 30_000);
        assert_eq!(backoff_ms(2, &no_jitter), 120_000);
        assert_eq!(backoff_ms(3, &no_jitter), 480_000);
    }

    #[test]
    fn jitter_band_is_within_20_percent() {
        let high = FixedJitter(1.0);
        let low = FixedJitter(-1.0);
        assert_eq!(backoff_ms(1, &high), 36_000);
        assert_eq!(backoff_ms(1, &low), 24_000);
    }

    #[test]
    fn backoff_is_monotonic_across_attempts() {
        let j = FixedJitter(1.0);
        let a1 = backoff_ms(1, &j);
        let a2 = backoff_ms(2, &j);
        let a3 = backoff_ms(3, &j);
        assert!(a2 >= a1);
        assert!(a3 >= a2);
    }
}
