//! Synchronization tunables.

use std::time::Duration;

/// Default topic prefix shared by every participant.
pub const DEFAULT_TOPIC_PREFIX: &str = "nerfwar";

/// Default scene-transition cooldown.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(2000);

/// Default interval between heartbeats (viewers) or announces (controllers).
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Default interval between presence sweeps.
pub const DEFAULT_PRESENCE_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Default age after which a silent participant is dropped.
pub const DEFAULT_PRESENCE_TIMEOUT: Duration = Duration::from_secs(60);

/// Default delay before the first reconnect attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Default cap on the reconnect delay.
pub const DEFAULT_RECONNECT_MAX_DELAY: Duration = Duration::from_secs(10);

/// Protocol and runtime settings for one participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Prefix of every topic, without a trailing slash.
    pub topic_prefix: String,
    /// How long next/previous are ignored after a scene crossing.
    pub cooldown: Duration,
    /// Heartbeat/announce period.
    pub heartbeat_interval: Duration,
    /// Presence sweep period.
    pub presence_sweep_interval: Duration,
    /// Presence expiry age.
    pub presence_timeout: Duration,
    /// First reconnect delay; doubles on each failed attempt.
    pub reconnect_delay: Duration,
    /// Upper bound for the reconnect delay.
    pub reconnect_max_delay: Duration,
    /// Discard messages whose sequence number is not newer than the last one
    /// seen from the same sender.
    pub sequence_guard: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            topic_prefix: DEFAULT_TOPIC_PREFIX.to_owned(),
            cooldown: DEFAULT_COOLDOWN,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            presence_sweep_interval: DEFAULT_PRESENCE_SWEEP_INTERVAL,
            presence_timeout: DEFAULT_PRESENCE_TIMEOUT,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            reconnect_max_delay: DEFAULT_RECONNECT_MAX_DELAY,
            sequence_guard: false,
        }
    }
}

impl SyncConfig {
    /// The cooldown as a domain duration.
    #[must_use]
    pub fn cooldown_delta(&self) -> chrono::Duration {
        to_delta(self.cooldown)
    }

    /// The presence timeout as a domain duration.
    #[must_use]
    pub fn presence_timeout_delta(&self) -> chrono::Duration {
        to_delta(self.presence_timeout)
    }

    /// A fresh reconnect backoff for these settings.
    #[must_use]
    pub fn backoff(&self) -> Backoff {
        Backoff::new(self.reconnect_delay, self.reconnect_max_delay)
    }
}

fn to_delta(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}

/// Doubling reconnect delay with an upper bound.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    /// Creates a backoff starting at `initial` and never exceeding `max`.
    #[must_use]
    pub fn new(initial: Duration, max: Duration) -> Self {
        let max = max.max(initial);
        Self {
            initial,
            max,
            current: initial,
        }
    }

    /// Returns the delay to wait now and doubles the next one.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }

    /// Starts over from the initial delay after a successful connection.
    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}
