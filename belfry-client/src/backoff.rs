//! Reconnect policies
//!
//! When the socket drops unexpectedly, the policy decides how long to wait
//! before the next dial and when to give up. The default is exponential
//! backoff starting at one second, doubling per attempt, capped at thirty
//! seconds, abandoned after ten attempts; with that policy the delay before
//! attempt N is `min(1000 * 2^(N-1), 30000)` milliseconds.
//!
//! # Built-in policies
//!
//! - [`ExponentialBackoff`]: exponentially increasing delays (default)
//! - [`FixedDelay`]: constant delay between attempts
//! - [`NoReconnect`]: never reconnect
//!
//! Implement [`ReconnectPolicy`] for custom behavior.

use std::time::Duration;

/// Policy consulted before each automatic reconnect attempt
///
/// The policy keeps state across attempts; `reset()` is called after a
/// successful connection so the next disconnect starts fresh.
pub trait ReconnectPolicy: Send + Sync {
    /// Delay before the given attempt (0-indexed), or `None` to give up.
    fn next_delay(&mut self, attempt: u32) -> Option<Duration>;

    /// Reset accumulated state after a successful connection.
    fn reset(&mut self);
}

/// Exponential backoff with a cap, an attempt ceiling, and optional jitter
pub struct ExponentialBackoff {
    base_delay: Duration,
    max_delay: Duration,
    max_attempts: Option<u32>,
    jitter: bool,
    current_attempt: u32,
}

impl ExponentialBackoff {
    /// Create a backoff policy with the given base and cap, no attempt
    /// ceiling, no jitter.
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
            max_attempts: None,
            jitter: false,
            current_attempt: 0,
        }
    }

    /// Set the attempt ceiling.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Add random jitter (0 to 25% of the delay) to avoid thundering herds
    /// when many clients lose the same gateway.
    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }
}

impl Default for ExponentialBackoff {
    /// One second to thirty seconds, ten attempts, no jitter. The delay
    /// sequence is 1s, 2s, 4s, 8s, 16s, 30s, 30s, ...
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(30)).with_max_attempts(10)
    }
}

impl ReconnectPolicy for ExponentialBackoff {
    fn next_delay(&mut self, attempt: u32) -> Option<Duration> {
        self.current_attempt = attempt;

        if let Some(max) = self.max_attempts {
            if attempt >= max {
                return None;
            }
        }

        let base_delay = self
            .base_delay
            .as_millis()
            .saturating_mul(1u128 << attempt.min(63));
        let delay = std::cmp::min(base_delay, self.max_delay.as_millis()) as u64;

        let mut final_delay = Duration::from_millis(delay);

        if self.jitter {
            use rand::Rng;
            let jitter_ms = rand::thread_rng().gen_range(0..=(delay / 4).max(1));
            final_delay = Duration::from_millis(delay + jitter_ms);
        }

        Some(final_delay)
    }

    fn reset(&mut self) {
        self.current_attempt = 0;
    }
}

/// Fixed delay between attempts
pub struct FixedDelay {
    delay: Duration,
    max_attempts: Option<u32>,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: None,
        }
    }

    /// Set the attempt ceiling.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

impl ReconnectPolicy for FixedDelay {
    fn next_delay(&mut self, attempt: u32) -> Option<Duration> {
        if let Some(max) = self.max_attempts {
            if attempt >= max {
                return None;
            }
        }
        Some(self.delay)
    }

    fn reset(&mut self) {
        // No state to reset for a fixed delay
    }
}

/// Policy that never reconnects
pub struct NoReconnect;

impl ReconnectPolicy for NoReconnect {
    fn next_delay(&mut self, _attempt: u32) -> Option<Duration> {
        None
    }

    fn reset(&mut self) {
        // No state to reset
    }
}
