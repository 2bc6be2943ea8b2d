//! Client configuration

use crate::io::reconnect::ReconnectPolicy;
use serde::{Deserialize, Serialize};

/// Default size of the buffer each read fills, in bytes
pub const DEFAULT_READ_BUFFER_SIZE: usize = 4096;

/// Settings applied when a client is built
///
/// Serializable so applications can keep it in their own configuration files.
///
/// # Examples
///
/// ```
/// use asynctcp::io::config::ClientConfig;
///
/// let config = ClientConfig {
///     secure: true,
///     ..Default::default()
/// };
/// assert_eq!(config.reconnect.delay_secs, 30);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Wrap the connection in TLS (server certificate is not validated)
    pub secure: bool,
    /// Delay before automatic reconnection
    pub reconnect: ReconnectPolicy,
    /// Maximum number of bytes delivered by a single `on_data` call
    pub read_buffer_size: usize,
    /// Enable `SO_KEEPALIVE` on connected sockets
    pub keep_alive: bool,
    /// SNI name for TLS; the endpoint IP is used when absent
    pub server_name: Option<String>,
    /// Maximum number of writes waiting behind the one in flight
    /// (`None` = unbounded); further writes are discarded
    pub max_pending_writes: Option<usize>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            secure: false,
            reconnect: ReconnectPolicy::default(),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            keep_alive: true,
            server_name: None,
            max_pending_writes: None,
        }
    }
}

impl ClientConfig {
    /// Plain TCP with the given reconnect delay
    pub fn plain(reconnect_delay_secs: u64) -> Self {
        Self {
            reconnect: ReconnectPolicy::with_delay_secs(reconnect_delay_secs),
            ..Default::default()
        }
    }

    /// TLS with the given reconnect delay
    pub fn secure(reconnect_delay_secs: u64) -> Self {
        Self {
            secure: true,
            ..Self::plain(reconnect_delay_secs)
        }
    }
}
