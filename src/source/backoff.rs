//! Reconnect delay schedule.

use std::time::Duration;

use crate::error::ConfigError;

/// Ordered reconnect delays, indexed by consecutive failed attempts.
///
/// Attempts past the end of the table reuse the last delay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectSchedule {
    delays: Vec<Duration>,
}

impl Default for ReconnectSchedule {
    fn default() -> Self {
        Self {
            delays: vec![
                Duration::from_millis(500),
                Duration::from_millis(1000),
                Duration::from_millis(2000),
                Duration::from_millis(5000),
            ],
        }
    }
}

impl ReconnectSchedule {
    /// Build a schedule from an explicit delay table.
    pub fn new(delays: Vec<Duration>) -> Result<Self, ConfigError> {
        if delays.is_empty() {
            return Err(ConfigError::EmptyReconnectSchedule);
        }
        Ok(Self { delays })
    }

    /// Delay before attempt number `attempt` (0-based).
    pub fn delay_for(&self, attempt: usize) -> Duration {
        match self.delays.get(attempt) {
            Some(delay) => *delay,
            None => self.last(),
        }
    }

    /// The cap: the largest index's delay.
    pub fn last(&self) -> Duration {
        // Non-empty by construction.
        self.delays.last().copied().unwrap_or_default()
    }

    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }
}
