//! Resilient asynchronous TCP client
//!
//! [`AsyncTcpClient`] is a cheap handle to a background task that owns the
//! connection. Every method is non-blocking: requests are queued to the task in
//! call order, and outcomes are reported through the [`EventSink`] given at
//! construction.
//!
//! # Examples
//!
//! ```no_run
//! use asynctcp::io::{AsyncTcpClient, ChannelSink, ClientEvent};
//!
//! # async fn example() -> Result<(), asynctcp::error::ClientError> {
//! let (sink, mut events) = ChannelSink::new();
//!
//! // Plain TCP, reconnect 5 seconds after any failure
//! let client = AsyncTcpClient::new(false, 5, sink)?;
//! client.connect("127.0.0.1", 7000);
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         ClientEvent::Connected => client.write(&b"hello\r\n"[..]),
//!         ClientEvent::Data(bytes) => println!("received {} bytes", bytes.len()),
//!         ClientEvent::Error(e) => eprintln!("connection problem: {}", e),
//!         ClientEvent::Disconnected => break,
//!     }
//! }
//!
//! client.terminate(true)?;
//! # Ok(())
//! # }
//! ```

use crate::error::{ClientError, Result};
use crate::io::actor::{ClientActor, ClientStatus, Command};
use crate::io::builder::ClientBuilder;
use crate::io::config::ClientConfig;
use crate::io::sink::EventSink;
use crate::io::state::ConnectionState;
use crate::io::transport::Transport;
use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

/// Handle to a resilient TCP connection
///
/// Dropping the handle terminates the connection silently and stops the
/// background task.
pub struct AsyncTcpClient {
    cmd_tx: mpsc::UnboundedSender<Command>,
    callbacks: Arc<AtomicBool>,
}

impl AsyncTcpClient {
    /// Create a client
    ///
    /// # Arguments
    ///
    /// * `secure` - Wrap the connection in TLS (certificates are not validated)
    /// * `reconnect_delay_secs` - Delay before reconnecting after a failure; `0`
    ///   disables automatic reconnection
    /// * `sink` - Receiver of connection notifications
    ///
    /// # Errors
    ///
    /// - [`ClientError::Runtime`] - Called outside a tokio runtime
    pub fn new(secure: bool, reconnect_delay_secs: u64, sink: impl EventSink) -> Result<Self> {
        ClientBuilder::new()
            .secure(secure)
            .reconnect_delay(reconnect_delay_secs)
            .build(sink)
    }

    /// Start configuring a client
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Spawn the background task for `transport` on the current runtime
    pub(crate) fn spawn<T, S>(transport: T, config: &ClientConfig, sink: S) -> Result<Self>
    where
        T: Transport,
        S: EventSink,
    {
        let runtime = tokio::runtime::Handle::try_current()?;

        let callbacks = Arc::new(AtomicBool::new(true));
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (actor, done_rx) = ClientActor::new(
            transport,
            sink,
            callbacks.clone(),
            config.reconnect,
            config.read_buffer_size,
            config.max_pending_writes,
        );

        info!(
            secure = config.secure,
            reconnect_delay_secs = config.reconnect.delay_secs,
            "Starting TCP client"
        );
        runtime.spawn(actor.run(cmd_rx, done_rx));

        Ok(Self { cmd_tx, callbacks })
    }

    /// Resolve `host` and connect to `port` on its first address
    ///
    /// Ignored while a connection is established, being attempted, or being
    /// closed. Re-enables notifications after [`terminate`](Self::terminate).
    /// A resolution failure is reported through
    /// [`EventSink::on_error`] as [`ClientError::Resolve`].
    pub fn connect(&self, host: impl Into<String>, port: u16) {
        self.callbacks.store(true, Ordering::Release);
        self.send(Command::Connect {
            host: host.into(),
            port,
        });
    }

    /// Connect to an already resolved endpoint
    ///
    /// Same preconditions as [`connect`](Self::connect).
    pub fn connect_endpoint(&self, endpoint: SocketAddr) {
        self.callbacks.store(true, Ordering::Release);
        self.send(Command::ConnectEndpoint(endpoint));
    }

    /// Queue `data` for transmission
    ///
    /// Buffers are written one at a time in call order. Writes issued while
    /// no connection is established wait until the next connection is up.
    ///
    /// The waiting queue is unbounded unless
    /// [`ClientConfig::max_pending_writes`] is set; buffers beyond that limit
    /// are dropped and counted in [`WriteStats::discarded`](crate::io::WriteStats::discarded).
    pub fn write(&self, data: impl Into<Bytes>) {
        self.send(Command::Write(data.into()));
    }

    /// Close the connection and cancel any pending reconnect
    ///
    /// Writes still waiting in the queue are discarded.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Closed`] - The background task is gone; suppressed when
    ///   `silent` is true
    pub fn disconnect(&self, silent: bool) -> Result<()> {
        match self.cmd_tx.send(Command::Disconnect) {
            Ok(()) => Ok(()),
            Err(_) if silent => Ok(()),
            Err(_) => Err(ClientError::Closed),
        }
    }

    /// Stop all notifications, then [`disconnect`](Self::disconnect)
    ///
    /// Takes effect immediately: no notification starts after this returns,
    /// even for operations that were already completing. A callback that was
    /// already running on the client task when this was called may still be
    /// finishing.
    pub fn terminate(&self, silent: bool) -> Result<()> {
        self.callbacks.store(false, Ordering::Release);
        self.disconnect(silent)
    }

    /// Change the reconnect delay; `0` disables automatic reconnection
    ///
    /// Applies from the next failure. Disabling while a reconnect is pending
    /// cancels it and reports a disconnect.
    pub fn set_reconnect_delay(&self, secs: u64) {
        self.send(Command::SetReconnectDelay(secs));
    }

    /// Snapshot of the client's state
    ///
    /// # Errors
    ///
    /// - [`ClientError::Closed`] - The background task is gone
    pub async fn status(&self) -> Result<ClientStatus> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Status(reply))
            .map_err(|_| ClientError::Closed)?;
        rx.await.map_err(|_| ClientError::Closed)
    }

    /// Current lifecycle state
    pub async fn state(&self) -> Result<ConnectionState> {
        Ok(self.status().await?.state)
    }

    /// Check if currently connected
    pub async fn is_connected(&self) -> bool {
        matches!(self.state().await, Ok(ConnectionState::Connected))
    }

    /// Last resolved endpoint
    pub async fn endpoint(&self) -> Result<Option<SocketAddr>> {
        Ok(self.status().await?.endpoint)
    }

    /// Get the number of times this client has reconnected
    pub async fn reconnect_count(&self) -> Result<usize> {
        Ok(self.status().await?.reconnect_count)
    }

    fn send(&self, cmd: Command) {
        if self.cmd_tx.send(cmd).is_err() {
            debug!("Client task has stopped, request dropped");
        }
    }
}

impl Drop for AsyncTcpClient {
    fn drop(&mut self) {
        let _ = self.terminate(true);
    }
}

impl std::fmt::Debug for AsyncTcpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncTcpClient")
            .field("callbacks", &self.callbacks.load(Ordering::Relaxed))
            .field("running", &!self.cmd_tx.is_closed())
            .finish()
    }
}
