//! Exponential backoff with jitter for re-probing failing subgraphs.

use rand::Rng;
use std::time::Duration;

use crate::config::ProbeConfig;

/// Doubling delay from `base` up to `max`, shaved by up to 10% jitter so that
/// subgraphs failing together do not get re-probed in lockstep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
        }
    }

    pub fn from_probe(config: &ProbeConfig) -> Self {
        Self::new(
            Duration::from_millis(config.backoff_base_ms),
            Duration::from_millis(config.backoff_max_ms),
        )
    }

    /// Delay before the next attempt after `failures` consecutive failures.
    pub fn delay(&self, failures: u32) -> Duration {
        let ceiling = self.ceiling(failures);
        let jitter_range = ceiling.as_millis() as u64 / 10;
        if jitter_range == 0 {
            return ceiling;
        }
        let jitter = rand::thread_rng().gen_range(0..=jitter_range);
        ceiling.saturating_sub(Duration::from_millis(jitter))
    }

    /// Delay without jitter.
    pub fn ceiling(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(failures.saturating_sub(1).min(31));
        self.base.saturating_mul(factor).min(self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ceiling_doubles_until_capped() {
        let backoff = Backoff::new(Duration::from_millis(500), Duration::from_secs(4));
        assert_eq!(backoff.ceiling(0), Duration::ZERO);
        assert_eq!(backoff.ceiling(1), Duration::from_millis(500));
        assert_eq!(backoff.ceiling(2), Duration::from_millis(1000));
        assert_eq!(backoff.ceiling(4), Duration::from_millis(4000));
        assert_eq!(backoff.ceiling(40), Duration::from_millis(4000));
    }

    #[test]
    fn test_jitter_stays_within_ten_percent_below_ceiling() {
        let backoff = Backoff::new(Duration::from_millis(1000), Duration::from_secs(30));
        for failures in 1..8 {
            let ceiling = backoff.ceiling(failures);
            let delay = backoff.delay(failures);
            assert!(delay <= ceiling);
            assert!(delay >= ceiling - ceiling / 10);
        }
    }

    #[test]
    fn test_max_below_base_is_raised() {
        let backoff = Backoff::new(Duration::from_secs(2), Duration::from_secs(1));
        assert_eq!(backoff.ceiling(3), Duration::from_secs(2));
    }
}
