//! Consumer notifications
//!
//! A client reports everything that happens on its connection through an
//! [`EventSink`]. All callbacks run on the client task, one at a time, so an
//! implementation never sees two notifications concurrently.

use crate::error::ClientError;
use bytes::Bytes;
use tokio::sync::mpsc;

/// Receiver of connection lifecycle and data notifications
///
/// Callbacks are fire-and-forget and must not block: they run on the task that
/// drives the connection.
///
/// # Examples
///
/// ```no_run
/// use asynctcp::error::ClientError;
/// use asynctcp::io::EventSink;
///
/// struct Printer;
///
/// impl EventSink for Printer {
///     fn on_connect(&mut self) {
///         println!("connected");
///     }
///     fn on_disconnect(&mut self) {
///         println!("disconnected");
///     }
///     fn on_error(&mut self, error: &ClientError) {
///         eprintln!("error: {}", error);
///     }
///     fn on_data(&mut self, data: &[u8]) {
///         println!("{} bytes", data.len());
///     }
/// }
/// ```
pub trait EventSink: Send + 'static {
    /// The connection is established and reads have started
    fn on_connect(&mut self);

    /// The connection is gone and no reconnect will follow
    fn on_disconnect(&mut self);

    /// A resolve, connect, handshake, read or write operation failed
    fn on_error(&mut self, error: &ClientError);

    /// Bytes arrived from the peer, in order
    fn on_data(&mut self, data: &[u8]);
}

/// Notification forwarded by [`ChannelSink`]
#[derive(Debug)]
pub enum ClientEvent {
    /// See [`EventSink::on_connect`]
    Connected,
    /// See [`EventSink::on_disconnect`]
    Disconnected,
    /// See [`EventSink::on_error`]
    Error(ClientError),
    /// See [`EventSink::on_data`]
    Data(Bytes),
}

/// Sink that forwards every notification into an unbounded channel
///
/// # Examples
///
/// ```no_run
/// use asynctcp::io::{AsyncTcpClient, ChannelSink, ClientEvent};
///
/// # async fn example() -> Result<(), asynctcp::error::ClientError> {
/// let (sink, mut events) = ChannelSink::new();
/// let client = AsyncTcpClient::new(false, 5, sink)?;
/// client.connect("127.0.0.1", 7000);
///
/// while let Some(event) = events.recv().await {
///     if let ClientEvent::Data(bytes) = event {
///         println!("got {} bytes", bytes.len());
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ClientEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver its events are delivered to
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ClientEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, event: ClientEvent) {
        // Receiver dropped: nobody is listening any more
        let _ = self.tx.send(event);
    }
}

impl EventSink for ChannelSink {
    fn on_connect(&mut self) {
        self.forward(ClientEvent::Connected);
    }

    fn on_disconnect(&mut self) {
        self.forward(ClientEvent::Disconnected);
    }

    fn on_error(&mut self, error: &ClientError) {
        // ClientError holds io::Error, which is not Clone
        let copy = match error {
            ClientError::Resolve { host, source } => ClientError::Resolve {
                host: host.clone(),
                source: copy_io(source),
            },
            ClientError::Connect { endpoint, source } => ClientError::Connect {
                endpoint: *endpoint,
                source: copy_io(source),
            },
            ClientError::Handshake { endpoint, source } => ClientError::Handshake {
                endpoint: *endpoint,
                source: copy_io(source),
            },
            ClientError::Read(e) => ClientError::Read(copy_io(e)),
            ClientError::Write(e) => ClientError::Write(copy_io(e)),
            ClientError::Closed | ClientError::Runtime(_) => ClientError::Closed,
        };
        self.forward(ClientEvent::Error(copy));
    }

    fn on_data(&mut self, data: &[u8]) {
        self.forward(ClientEvent::Data(Bytes::copy_from_slice(data)));
    }
}

fn copy_io(e: &std::io::Error) -> std::io::Error {
    std::io::Error::new(e.kind(), e.to_string())
}
