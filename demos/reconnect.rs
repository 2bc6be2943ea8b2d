//! Automatic reconnection demonstration
//!
//! A line-echo server restarts between rounds; the client notices each drop,
//! reports it, and reconnects on its own after a fixed delay.

use asynctcp::io::{AsyncTcpClient, ChannelSink, ClientEvent};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::time::Duration;

const ADDR: &str = "127.0.0.1:18946";
const ROUNDS: usize = 3;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_target(false)
        .init();

    println!("=== Automatic Reconnection Demo ===\n");

    // Spawn server task
    let server_handle = tokio::spawn(async move {
        for round in 1..=ROUNDS {
            println!("[Server] Round {}: Starting server...", round);
            let listener = TcpListener::bind(ADDR).await?;

            let (socket, peer) = listener.accept().await?;
            println!("[Server] Round {}: Client connected from {}", round, peer);

            let mut lines = BufReader::new(socket);
            let mut line = String::new();
            lines.read_line(&mut line).await?;
            println!("[Server] Round {}: Received: {}", round, line.trim_end());

            let reply = format!("round {} says {}", round, line);
            lines.get_mut().write_all(reply.as_bytes()).await?;

            // Drop connection to simulate server restart
            tokio::time::sleep(Duration::from_millis(200)).await;
            println!("[Server] Round {}: Shutting down (simulating failure)...\n", round);
            drop(lines);
            drop(listener);
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        Ok::<_, std::io::Error>(())
    });

    // Give server time to start
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Reconnect one second after every failure
    let (sink, mut events) = ChannelSink::new();
    let client = AsyncTcpClient::new(false, 1, sink)?;
    client.connect("127.0.0.1", 18946);

    let mut connections = 0;
    let mut failures = 0;
    while let Some(event) = events.recv().await {
        match event {
            ClientEvent::Connected => {
                connections += 1;
                println!("[Client] Connected ({} so far)", connections);
                client.write(format!("hello #{}\n", connections));
            }
            ClientEvent::Data(data) => {
                print!("[Client] Received: {}", String::from_utf8_lossy(&data));
            }
            ClientEvent::Error(e) => {
                failures += 1;
                println!("[Client] {} ({:?}), waiting to reconnect", e, e.condition());
                if failures == ROUNDS {
                    break;
                }
            }
            ClientEvent::Disconnected => break,
        }
    }

    let status = client.status().await?;
    client.terminate(true)?;

    println!("\n=== Demo completed ===");
    println!("\nReconnection statistics:");
    println!("  Connections: {}", connections);
    println!("  Failures reported: {}", failures);
    println!("  Reconnections: {}", status.reconnect_count);
    println!("  Writes completed: {}", status.writes.written);

    let _ = tokio::time::timeout(Duration::from_secs(1), server_handle).await;

    Ok(())
}
