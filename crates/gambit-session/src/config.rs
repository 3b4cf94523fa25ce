//! Session timing configuration.

use std::time::Duration;

/// Configuration for session lifecycle timing.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a suspended session waits for the missing player to
    /// reconnect before the remaining player wins by disconnect-timeout.
    ///
    /// `Duration::ZERO` means immediate forfeiture on disconnect.
    pub grace_period: Duration,

    /// How long an unjoined session may sit open before the reaper
    /// tears it down.
    pub open_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(30),
            open_timeout: Duration::from_secs(300),
        }
    }
}
