//! Demonstration of logging capabilities using the tracing crate
//!
//! This example shows how to enable and configure logging for client operations.
//!
//! # Running with different log levels
//!
//! ```bash
//! # Show all logs (trace, debug, info, warn, error)
//! RUST_LOG=trace cargo run --example logging
//!
//! # Show only info and above
//! RUST_LOG=info cargo run --example logging
//!
//! # Show trace logs for the io module only
//! RUST_LOG=asynctcp::io=trace cargo run --example logging
//! ```

use asynctcp::error::ClientError;
use asynctcp::io::{AsyncTcpClient, EventSink};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Sink that logs every notification and signals when the peer went away
struct LoggingSink {
    done: mpsc::UnboundedSender<()>,
}

impl EventSink for LoggingSink {
    fn on_connect(&mut self) {
        info!("Sink: connected");
    }

    fn on_disconnect(&mut self) {
        warn!("Sink: disconnected");
        let _ = self.done.send(());
    }

    fn on_error(&mut self, err: &ClientError) {
        error!(condition = ?err.condition(), "Sink: {}", err);
    }

    fn on_data(&mut self, data: &[u8]) {
        info!(bytes = data.len(), "Sink: {:?}", String::from_utf8_lossy(data));
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber with environment filter
    // This allows control via RUST_LOG environment variable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();

    info!("=== Client Logging Demo ===");

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    // Server answers one request, then hangs up
    let server = tokio::spawn(async move {
        let (mut socket, peer) = listener.accept().await?;
        info!(peer = %peer, "Server accepted connection");

        let mut buf = [0u8; 256];
        let n = socket.read(&mut buf).await?;
        info!(bytes = n, "Server received request");

        socket.write_all(b"OK\r\n").await?;
        tokio::time::sleep(Duration::from_millis(100)).await;
        info!("Server closing connection");
        Ok::<_, std::io::Error>(())
    });

    // Reconnect disabled: the hang-up ends in on_disconnect
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    let client = AsyncTcpClient::builder()
        .reconnect_delay(0)
        .read_buffer_size(1024)
        .build(LoggingSink { done: done_tx })?;

    client.write(&b"STATUS\r\n"[..]);
    client.connect_endpoint(addr);

    done_rx.recv().await;
    server.await??;

    info!("=== Demo completed successfully ===");
    info!("Try running with different RUST_LOG values to see different log levels:");
    info!("  RUST_LOG=trace cargo run --example logging    # All logs");
    info!("  RUST_LOG=info cargo run --example logging     # Info and above");

    Ok(())
}
