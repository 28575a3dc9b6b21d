//! Backoff configuration for the empty-response retry policy.
//!
//! The single-shot facade re-runs the whole request when the model produces
//! an empty final answer; the delay between those attempts comes from here.
//! Exponential backoff with jitter, capped at a maximum delay.

use std::time::Duration;

/// Delay schedule for retries.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Delay before the first retry.
    pub initial_delay: Duration,

    /// Upper bound on any single delay.
    pub max_delay: Duration,

    /// Multiplier applied per attempt (2.0 doubles the delay each time).
    pub backoff_multiplier: f64,

    /// Random jitter fraction (0.0 to 1.0) to spread out synchronized
    /// retries.
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    pub fn with_jitter_factor(mut self, jitter: f64) -> Self {
        self.jitter_factor = jitter.clamp(0.0, 1.0);
        self
    }

    /// Delay before retry number `attempt` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base_ms = self.initial_delay.as_millis() as f64;
        let exponential = base_ms * self.backoff_multiplier.powi(attempt as i32);
        let capped = exponential.min(self.max_delay.as_millis() as f64);

        let jitter_range = capped * self.jitter_factor;
        let jitter = rand::random::<f64>() * jitter_range;
        let final_ms = capped + jitter - (jitter_range / 2.0);

        Duration::from_millis(final_ms.max(0.0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_all_fields() {
        let config = RetryConfig::new()
            .with_initial_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_secs(5))
            .with_backoff_multiplier(1.5)
            .with_jitter_factor(0.2);
        assert_eq!(config.initial_delay, Duration::from_millis(100));
        assert_eq!(config.max_delay, Duration::from_secs(5));
        assert_eq!(config.backoff_multiplier, 1.5);
        assert_eq!(config.jitter_factor, 0.2);
    }

    #[test]
    fn delays_grow_exponentially_without_jitter() {
        let config = RetryConfig::new()
            .with_initial_delay(Duration::from_secs(1))
            .with_backoff_multiplier(2.0)
            .with_jitter_factor(0.0);
        let d0 = config.delay_for(0);
        let d1 = config.delay_for(1);
        let d2 = config.delay_for(2);
        assert!(d1 > d0);
        assert!(d2 > d1);
    }

    #[test]
    fn delays_are_capped_at_max() {
        let config = RetryConfig::new()
            .with_initial_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(2))
            .with_jitter_factor(0.0);
        assert!(config.delay_for(10) <= Duration::from_secs(2));
    }

    #[test]
    fn jitter_factor_is_clamped() {
        let config = RetryConfig::new().with_jitter_factor(3.0);
        assert_eq!(config.jitter_factor, 1.0);
    }
}
