//! Network I/O module
//!
//! Provides the resilient TCP client, its transports, and the consumer-facing
//! notification interface.

pub(crate) mod actor;
pub mod builder;
pub mod client;
pub mod config;
pub mod reconnect;
pub mod sink;
pub mod state;
pub mod tls;
pub mod transport;
pub mod write_queue;

pub use actor::ClientStatus;
pub use builder::ClientBuilder;
pub use client::AsyncTcpClient;
pub use config::ClientConfig;
pub use reconnect::ReconnectPolicy;
pub use sink::{ChannelSink, ClientEvent, EventSink};
pub use state::ConnectionState;
pub use tls::{insecure_tls_config, native_roots_tls_config, tls_config_from_pem, TlsTransport};
pub use transport::{TcpTransport, Transport, TransportFuture};
pub use write_queue::WriteStats;
