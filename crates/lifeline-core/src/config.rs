//! Bridge configuration.

use std::time::Duration;

/// Commands that can be queued before the platform thread blocks on write.
pub const DEFAULT_COMMAND_CAPACITY: usize = 64;

/// Timer indices that can be pending before further sends are dropped.
pub const DEFAULT_TIMER_CAPACITY: usize = 256;

/// Longest a platform callback waits for the application thread to
/// acknowledge a blocking command.
pub const DEFAULT_HANDOFF_TIMEOUT: Duration = Duration::from_secs(5);

/// How long the poll loop waits before reporting an idle cycle.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(16);

/// Bridge configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Capacity of the command channel (at least 1)
    pub command_capacity: usize,
    /// Capacity of the timer channel (at least 1)
    pub timer_capacity: usize,
    /// Bound on every platform-thread wait for the application thread
    pub handoff_timeout: Duration,
    /// Poll wait before an idle cycle; `None` waits until a source fires
    pub poll_timeout: Option<Duration>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            command_capacity: DEFAULT_COMMAND_CAPACITY,
            timer_capacity: DEFAULT_TIMER_CAPACITY,
            handoff_timeout: DEFAULT_HANDOFF_TIMEOUT,
            poll_timeout: Some(DEFAULT_POLL_TIMEOUT),
        }
    }
}

impl BridgeConfig {
    /// Copy with zero capacities raised to one.
    ///
    /// A zero-capacity channel would turn every write into a rendezvous with
    /// the application thread.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.command_capacity = self.command_capacity.max(1);
        self.timer_capacity = self.timer_capacity.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_constants() {
        let config = BridgeConfig::default();
        assert_eq!(config.command_capacity, DEFAULT_COMMAND_CAPACITY);
        assert_eq!(config.timer_capacity, DEFAULT_TIMER_CAPACITY);
        assert_eq!(config.handoff_timeout, DEFAULT_HANDOFF_TIMEOUT);
        assert_eq!(config.poll_timeout, Some(DEFAULT_POLL_TIMEOUT));
    }

    #[test]
    fn normalized_rejects_zero_capacities() {
        let config =
            BridgeConfig { command_capacity: 0, timer_capacity: 0, ..Default::default() }
                .normalized();
        assert_eq!(config.command_capacity, 1);
        assert_eq!(config.timer_capacity, 1);
    }
}
