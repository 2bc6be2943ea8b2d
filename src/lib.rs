//! Resilient asynchronous TCP client
//!
//! This library provides an outbound TCP connection that survives failures: it
//! connects (optionally over TLS), streams received bytes to a consumer,
//! serializes outbound writes, and reconnects on its own after a configurable
//! delay. It is meant as the transport underneath protocol handlers that only
//! care about "connected / got bytes / send these bytes / disconnected".
//!
//! # Features
//!
//! - **Automatic reconnection** - Fixed delay after any failure, or disabled with a delay of 0
//! - **Ordered writes** - One write in flight at a time, the rest queued in call order
//! - **Optional TLS** - rustls-based, certificate validation deliberately disabled
//! - **Non-blocking API** - Every call returns immediately; outcomes arrive as notifications
//! - **Silent teardown** - `terminate` stops notifications before closing
//!
//! # Quick Start
//!
//! ```no_run
//! use asynctcp::error::ClientError;
//! use asynctcp::io::{AsyncTcpClient, EventSink};
//!
//! struct Handler;
//!
//! impl EventSink for Handler {
//!     fn on_connect(&mut self) {
//!         println!("connected");
//!     }
//!     fn on_disconnect(&mut self) {
//!         println!("gave up");
//!     }
//!     fn on_error(&mut self, error: &ClientError) {
//!         eprintln!("{} ({:?})", error, error.condition());
//!     }
//!     fn on_data(&mut self, data: &[u8]) {
//!         println!("{:?}", String::from_utf8_lossy(data));
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ClientError> {
//!     // Plain TCP, retry 30 seconds after a failure
//!     let client = AsyncTcpClient::new(false, 30, Handler)?;
//!     client.connect("192.168.1.20", 23);
//!     client.write(&b"status\r\n"[..]);
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(60)).await;
//!     client.terminate(true)?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **`io`** - Network I/O layer
//!   - `AsyncTcpClient` - Handle; queues requests to the connection task
//!   - `ClientBuilder` / `ClientConfig` - Construction and settings
//!   - `Transport` - Connect / handshake abstraction with `TcpTransport` and `TlsTransport`
//!   - `EventSink` / `ChannelSink` - Consumer notifications
//!   - `ReconnectPolicy` - Delay between failure and retry
//!
//! - **`error`** - Error handling
//!   - `ClientError` - Resolve, connect, handshake, read and write failures
//!   - `Result<T>` - Type alias for `Result<T, ClientError>`
//!
//! ## Lifecycle
//!
//! ```text
//! Idle ─► Connecting ─► (Handshaking) ─► Connected ─► Closing ─► Idle
//!              ▲                                │
//!              └──────── ReconnectPending ◄─────┘
//! ```
//!
//! All state lives in one background task per client. Transport operations run
//! as separate tasks and report back to it, so notifications for one client are
//! never delivered concurrently.
//!
//! # Error Handling
//!
//! I/O failures are not returned from method calls; they are delivered to
//! [`EventSink::on_error`](io::EventSink::on_error). Unless reconnection is
//! disabled, every failure schedules a new attempt.
//!
//! ```no_run
//! use asynctcp::error::{ClientError, Condition};
//!
//! fn describe(error: &ClientError) -> &'static str {
//!     match error.condition() {
//!         Condition::Unreachable => "unable to connect to specified address",
//!         Condition::Reset => "connection reset",
//!         Condition::Other => "connection error",
//!     }
//! }
//! ```

pub mod error;
pub mod io;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use io::{AsyncTcpClient, ClientBuilder, EventSink};
