//! Builder for [`AsyncTcpClient`]
//!
//! The transport is part of the builder's type. A fresh builder picks plain
//! TCP or TLS from its [`ClientConfig`] at build time; [`ClientBuilder::with_tls`]
//! and [`ClientBuilder::with_transport`] fix the transport up front.
//!
//! # Examples
//!
//! ```no_run
//! use asynctcp::io::builder::ClientBuilder;
//! use asynctcp::io::ChannelSink;
//!
//! # async fn example() -> Result<(), asynctcp::error::ClientError> {
//! let (sink, _events) = ChannelSink::new();
//!
//! // TLS with SNI, reconnect after 10 seconds
//! let client = ClientBuilder::new()
//!     .secure(true)
//!     .server_name("device.local")
//!     .reconnect_delay(10)
//!     .build(sink)?;
//! client.connect("device.local", 443);
//! # Ok(())
//! # }
//! ```

use crate::error::Result;
use crate::io::client::AsyncTcpClient;
use crate::io::config::ClientConfig;
use crate::io::reconnect::ReconnectPolicy;
use crate::io::sink::EventSink;
use crate::io::tls::TlsTransport;
use crate::io::transport::{TcpTransport, Transport};
use std::sync::Arc;

/// Transport chosen from [`ClientConfig::secure`] when the client is built
#[derive(Debug, Clone, Copy, Default)]
pub struct FromConfig;

/// Builder for [`AsyncTcpClient`]
///
/// # Type Parameters
/// * `T` - [`FromConfig`] or a concrete [`Transport`]
#[derive(Debug, Clone)]
pub struct ClientBuilder<T = FromConfig> {
    transport: T,
    config: ClientConfig,
}

// ============================================================================
// Initial Construction
// ============================================================================

impl ClientBuilder<FromConfig> {
    /// Create a builder with default settings (plain TCP, 30 s reconnect delay)
    ///
    /// # Examples
    ///
    /// ```
    /// use asynctcp::io::builder::ClientBuilder;
    ///
    /// let builder = ClientBuilder::new();
    /// assert!(!builder.config().secure);
    /// ```
    pub fn new() -> Self {
        Self::from_config(ClientConfig::default())
    }

    /// Create a builder from a complete configuration
    pub fn from_config(config: ClientConfig) -> Self {
        Self {
            transport: FromConfig,
            config,
        }
    }

    /// Select TLS (`true`) or plain TCP (`false`)
    pub fn secure(mut self, secure: bool) -> Self {
        self.config.secure = secure;
        self
    }

    /// Name presented for TLS SNI
    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.config.server_name = Some(name.into());
        self
    }

    /// Enable or disable `SO_KEEPALIVE` (default: enabled)
    pub fn keep_alive(mut self, enable: bool) -> Self {
        self.config.keep_alive = enable;
        self
    }

    /// Use TLS with a caller-supplied rustls configuration
    ///
    /// Keep-alive and server name settings made so far carry over.
    pub fn with_tls(self, tls_config: Arc<rustls::ClientConfig>) -> ClientBuilder<TlsTransport> {
        let mut transport = TlsTransport::with_config(tls_config).keep_alive(self.config.keep_alive);
        if let Some(name) = &self.config.server_name {
            transport = transport.server_name(name.clone());
        }
        ClientBuilder {
            transport,
            config: ClientConfig {
                secure: true,
                ..self.config
            },
        }
    }

    /// Use a custom transport
    pub fn with_transport<T: Transport>(self, transport: T) -> ClientBuilder<T> {
        ClientBuilder {
            config: ClientConfig {
                secure: transport.is_secure(),
                ..self.config
            },
            transport,
        }
    }

    /// Build the client and start its background task
    ///
    /// # Errors
    ///
    /// - [`ClientError::Runtime`](crate::error::ClientError::Runtime) - Called
    ///   outside a tokio runtime
    pub fn build(self, sink: impl EventSink) -> Result<AsyncTcpClient> {
        let config = self.config;
        if config.secure {
            let mut transport = TlsTransport::new().keep_alive(config.keep_alive);
            if let Some(name) = &config.server_name {
                transport = transport.server_name(name.clone());
            }
            AsyncTcpClient::spawn(transport, &config, sink)
        } else {
            let transport = TcpTransport::new().keep_alive(config.keep_alive);
            AsyncTcpClient::spawn(transport, &config, sink)
        }
    }
}

impl Default for ClientBuilder<FromConfig> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Common Configuration Methods
// ============================================================================

impl<T> ClientBuilder<T> {
    /// Reconnect `secs` seconds after a failure; `0` disables reconnection
    pub fn reconnect_delay(mut self, secs: u64) -> Self {
        self.config.reconnect = ReconnectPolicy::with_delay_secs(secs);
        self
    }

    /// Set the reconnect policy
    pub fn reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.config.reconnect = policy;
        self
    }

    /// Maximum bytes delivered per `on_data` call
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.config.read_buffer_size = size;
        self
    }

    /// Cap the number of writes waiting while one is in flight or the client
    /// is disconnected; writes beyond it are discarded
    pub fn max_pending_writes(mut self, limit: usize) -> Self {
        self.config.max_pending_writes = Some(limit);
        self
    }

    /// Configuration collected so far
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

impl<T: Transport> ClientBuilder<T> {
    /// Build the client and start its background task
    ///
    /// # Errors
    ///
    /// - [`ClientError::Runtime`](crate::error::ClientError::Runtime) - Called
    ///   outside a tokio runtime
    pub fn build(self, sink: impl EventSink) -> Result<AsyncTcpClient> {
        AsyncTcpClient::spawn(self.transport, &self.config, sink)
    }
}
