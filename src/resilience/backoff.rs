//! Jittered delays for periodic work.

use std::time::Duration;
use rand::Rng;

/// Add a random delay of up to `ratio * base` to `base`.
///
/// Keeps periodic health checks of many backends from firing in lockstep.
pub fn jittered(base: Duration, ratio: f64) -> Duration {
    let ratio = ratio.clamp(0.0, 1.0);
    let jitter_range = base.mul_f64(ratio);
    if jitter_range.is_zero() {
        return base;
    }

    let jitter = rand::thread_rng().gen_range(Duration::ZERO..=jitter_range);
    base + jitter
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jitter_bounds() {
        let base = Duration::from_millis(1000);
        for _ in 0..100 {
            let d = jittered(base, 0.1);
            assert!(d >= base);
            assert!(d <= Duration::from_millis(1100));
        }
    }

    #[test]
    fn test_zero_ratio_is_exact() {
        let base = Duration::from_millis(20);
        assert_eq!(jittered(base, 0.0), base);
        assert_eq!(jittered(Duration::ZERO, 0.5), Duration::ZERO);
    }

    #[test]
    fn test_ratio_is_clamped() {
        let base = Duration::from_millis(100);
        let d = jittered(base, 7.0);
        assert!(d <= Duration::from_millis(200));
    }
}
