//! Automatic reconnection policy
//!
//! A fixed delay between a connection failure and the next attempt. A delay of
//! zero turns automatic reconnection off.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default delay before a reconnect attempt, in seconds
pub const DEFAULT_RECONNECT_DELAY_SECS: u64 = 30;

/// Reconnection policy
///
/// Used with [`ClientBuilder`](crate::io::builder::ClientBuilder) or changed at
/// runtime with [`AsyncTcpClient::set_reconnect_delay`](crate::io::AsyncTcpClient::set_reconnect_delay).
///
/// # Examples
///
/// ```
/// use asynctcp::io::reconnect::ReconnectPolicy;
/// use std::time::Duration;
///
/// let policy = ReconnectPolicy::with_delay_secs(5);
/// assert_eq!(policy.delay(), Some(Duration::from_secs(5)));
///
/// let disabled = ReconnectPolicy::disabled();
/// assert!(!disabled.is_enabled());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    /// Delay before each reconnect attempt (0 = never reconnect)
    pub delay_secs: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay_secs: DEFAULT_RECONNECT_DELAY_SECS,
        }
    }
}

impl ReconnectPolicy {
    /// Reconnect after `secs` seconds; `0` disables reconnection
    pub fn with_delay_secs(secs: u64) -> Self {
        Self { delay_secs: secs }
    }

    /// Never reconnect automatically
    pub fn disabled() -> Self {
        Self { delay_secs: 0 }
    }

    /// Whether failures should schedule a reconnect
    pub fn is_enabled(&self) -> bool {
        self.delay_secs != 0
    }

    /// Delay to wait before the next attempt, `None` when disabled
    pub fn delay(&self) -> Option<Duration> {
        self.is_enabled()
            .then(|| Duration::from_secs(self.delay_secs))
    }
}
