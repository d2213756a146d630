use rand::Rng;
use std::time::Duration;

use crate::{DEFAULT_KILL_WAIT_SECS, DEFAULT_REMOVAL_POLL_MS, DEFAULT_REMOVAL_SETTLE_MS};

/// How a worker backs off after a transient cluster failure.
///
/// There is no attempt limit: a worker keeps retrying until it either
/// succeeds or loses authority.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub interval: Duration,
    /// Stretch each delay by up to half the interval
    pub jitter: bool,
}

impl RetryPolicy {
    pub fn fixed(interval: Duration) -> Self {
        Self {
            interval,
            jitter: false,
        }
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before the next attempt. Never shorter than `interval`.
    pub fn calculate_delay(&self) -> Duration {
        if !self.jitter || self.interval.is_zero() {
            return self.interval;
        }

        let spread = self.interval.as_secs_f64() / 2.0;
        let mut rng = rand::thread_rng();
        self.interval + Duration::from_secs_f64(rng.gen_range(0.0..=spread))
    }
}

/// Fixed timings for replacing a topology that is already on the cluster
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RemovalPolicy {
    /// Grace period passed to the cluster with the kill request
    pub kill_wait_secs: u64,
    /// Poll cadence while the killed topology is still listed
    pub poll_interval: Duration,
    /// Pause after the topology disappears before resubmitting
    pub settle_delay: Duration,
}

impl Default for RemovalPolicy {
    fn default() -> Self {
        Self {
            kill_wait_secs: DEFAULT_KILL_WAIT_SECS,
            poll_interval: Duration::from_millis(DEFAULT_REMOVAL_POLL_MS),
            settle_delay: Duration::from_millis(DEFAULT_REMOVAL_SETTLE_MS),
        }
    }
}
