//! Connection lifecycle states

use std::fmt;

/// Lifecycle state of one client
///
/// ```text
/// Idle ─► Connecting ─► (Handshaking) ─► Connected ─► Closing ─► Idle
///              ▲                                │
///              └──────── ReconnectPending ◄─────┘ (any failure)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No connection and nothing scheduled
    #[default]
    Idle,
    /// Resolving the host or waiting for the TCP connect to finish
    Connecting,
    /// TCP is up, TLS negotiation in progress
    Handshaking,
    /// Ready for reads and writes
    Connected,
    /// A deliberate close was requested and is being torn down
    Closing,
    /// A failure occurred and the reconnect timer is armed
    ReconnectPending,
}

impl ConnectionState {
    /// Whether a new `connect` request is accepted in this state
    pub fn accepts_connect(self) -> bool {
        matches!(
            self,
            ConnectionState::Idle | ConnectionState::ReconnectPending
        )
    }

    /// Whether an attempt is currently underway
    pub fn is_attempting(self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Handshaking
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Handshaking => "handshaking",
            ConnectionState::Connected => "connected",
            ConnectionState::Closing => "closing",
            ConnectionState::ReconnectPending => "reconnect-pending",
        };
        f.write_str(name)
    }
}
