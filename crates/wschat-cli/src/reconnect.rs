//! Client reconnection policy.

use std::time::Duration;

use wschat_core::config::ClientConfig;

/// Backoff schedule for reconnecting to a lost server.
///
/// Delays grow geometrically from `initial_delay` by `multiplier` and are
/// capped at `max_delay`.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// `None` retries forever.
    pub max_attempts: Option<u32>,
    /// A connection that lasted this long resets the attempt counter.
    pub stable_after: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from_config(&ClientConfig::default())
    }
}

impl ReconnectPolicy {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            initial_delay: Duration::from_millis(config.reconnect_initial_ms),
            max_delay: Duration::from_millis(config.reconnect_max_ms),
            multiplier: config.reconnect_multiplier,
            max_attempts: config.max_reconnect_attempts,
            stable_after: Duration::from_secs(config.stable_after_secs),
        }
    }

    /// Wait before reconnect number `attempt` (0-indexed).
    ///
    /// Growth that overflows `Duration` lands on the cap.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::try_from_secs_f64(secs).map_or(self.max_delay, |d| d.min(self.max_delay))
    }

    /// Whether reconnect number `attempt` (0-indexed) is allowed.
    pub fn should_retry(&self, attempt: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempt < max)
    }

    /// Whether a session of this length earns a fresh backoff schedule.
    pub fn resets_after(&self, session: Duration) -> bool {
        session > self.stable_after
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(config: ClientConfig) -> ReconnectPolicy {
        ReconnectPolicy::from_config(&config)
    }

    fn secs(list: &[u64]) -> Vec<Duration> {
        list.iter().copied().map(Duration::from_secs).collect()
    }

    fn schedule(policy: &ReconnectPolicy, attempts: u32) -> Vec<Duration> {
        (0..attempts).map(|a| policy.delay_for_attempt(a)).collect()
    }

    #[test]
    fn default_config_doubles_from_one_second_up_to_a_minute() {
        let p = policy(ClientConfig::default());
        assert_eq!(schedule(&p, 8), secs(&[1, 2, 4, 8, 16, 32, 60, 60]));
        assert_eq!(p.delay_for_attempt(u32::MAX), Duration::from_secs(60));
        assert!(p.should_retry(u32::MAX));
        assert_eq!(p.stable_after, Duration::from_secs(60));
    }

    #[test]
    fn configured_schedule_and_attempt_limit() {
        let p = policy(ClientConfig {
            reconnect_initial_ms: 250,
            reconnect_max_ms: 1_000,
            reconnect_multiplier: 3.0,
            max_reconnect_attempts: Some(3),
            stable_after_secs: 10,
        });
        let millis: Vec<_> = schedule(&p, 4).iter().map(Duration::as_millis).collect();
        assert_eq!(millis, [250, 750, 1_000, 1_000]);

        let allowed: Vec<_> = (0..5).map(|a| p.should_retry(a)).collect();
        assert_eq!(allowed, [true, true, true, false, false]);
    }

    #[test]
    fn zero_attempts_never_retries() {
        let p = policy(ClientConfig {
            max_reconnect_attempts: Some(0),
            ..ClientConfig::default()
        });
        assert!(!p.should_retry(0));
    }

    #[test]
    fn constant_multiplier_keeps_initial_delay() {
        let p = policy(ClientConfig {
            reconnect_initial_ms: 500,
            reconnect_multiplier: 1.0,
            ..ClientConfig::default()
        });
        assert!(schedule(&p, 5).iter().all(|d| *d == Duration::from_millis(500)));
    }

    #[test]
    fn only_long_sessions_reset_backoff() {
        let p = policy(ClientConfig {
            stable_after_secs: 10,
            ..ClientConfig::default()
        });
        assert!(!p.resets_after(Duration::from_secs(3)));
        assert!(!p.resets_after(Duration::from_secs(10)));
        assert!(p.resets_after(Duration::from_secs(11)));
    }
}
