//! Reconnect backoff for relay clients
//!
//! After a transport error, clients retry with bounded exponential
//! backoff plus jitter so a relay restart does not trigger a synchronized
//! reconnect stampede from every device.

use std::time::Duration;

use rand::Rng;

#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Delay before the first retry
    pub base: Duration,
    /// Ceiling for the exponential growth
    pub max: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { base: Duration::from_millis(500), max: Duration::from_secs(60) }
    }
}

impl ReconnectPolicy {
    /// Delay before retry number `attempt` (0-based): `base * 2^attempt`
    /// capped at `max`, jittered down to between half and the full value.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let capped = self.base.saturating_mul(2u32.saturating_pow(attempt.min(16))).min(self.max);
        let capped_ms = capped.as_millis() as u64;
        if capped_ms < 2 {
            return capped;
        }
        let jittered = rand::thread_rng().gen_range(capped_ms / 2..=capped_ms);
        Duration::from_millis(jittered)
    }
}
