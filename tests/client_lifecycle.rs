//! Lifecycle tests against a scripted in-memory transport
//!
//! Time is paused in most tests, so reconnect delays elapse instantly and
//! attempt timestamps can be compared exactly. The back-pressure test needs a
//! real clock and a second worker thread for its blocking sink.

mod common;

use asynctcp::error::{ClientError, Condition};
use asynctcp::io::{AsyncTcpClient, ChannelSink, ClientEvent, ConnectionState, EventSink};
use common::{assert_quiet, endpoint, next_event, MockTransport, Outcome};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::Instant;
use tokio_test::assert_ok;

fn client(
    mock: &MockTransport,
    delay_secs: u64,
) -> (AsyncTcpClient, UnboundedReceiver<ClientEvent>) {
    let (sink, events) = ChannelSink::new();
    let client = AsyncTcpClient::builder()
        .reconnect_delay(delay_secs)
        .with_transport(mock.clone())
        .build(sink)
        .unwrap();
    (client, events)
}

#[tokio::test(start_paused = true)]
async fn test_refused_without_reconnect_gives_up() {
    let mock = MockTransport::new();
    mock.push(Outcome::Refuse);
    let (client, mut events) = client(&mock, 0);

    client.connect("192.0.2.1", 9);

    match next_event(&mut events).await {
        ClientEvent::Error(e) => {
            assert!(matches!(e, ClientError::Connect { .. }));
            assert_eq!(e.kind(), Some(io::ErrorKind::ConnectionRefused));
            assert_eq!(e.condition(), Condition::Unreachable);
        }
        other => panic!("expected error, got {:?}", other),
    }
    assert!(matches!(
        next_event(&mut events).await,
        ClientEvent::Disconnected
    ));

    // No further attempt, however long we wait
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(mock.attempts().len(), 1);
    assert_eq!(mock.attempts()[0].0, endpoint());
    assert_eq!(client.state().await.unwrap(), ConnectionState::Idle);
    assert_quiet(&mut events).await;
}

#[tokio::test(start_paused = true)]
async fn test_read_failure_reconnects_once_after_delay() {
    let mock = MockTransport::new();
    let first_peer = mock.accept(64);
    let _second_peer = mock.accept(64);
    let (client, mut events) = client(&mock, 5);

    client.connect_endpoint(endpoint());
    assert!(matches!(next_event(&mut events).await, ClientEvent::Connected));
    assert_quiet(&mut events).await;

    // Peer goes away
    drop(first_peer);

    let failed_at = match next_event(&mut events).await {
        ClientEvent::Error(e) => {
            assert!(matches!(e, ClientError::Read(_)));
            assert_eq!(e.kind(), Some(io::ErrorKind::UnexpectedEof));
            assert_eq!(e.condition(), Condition::Reset);
            Instant::now()
        }
        other => panic!("expected error, got {:?}", other),
    };

    assert!(matches!(next_event(&mut events).await, ClientEvent::Connected));

    let attempts = mock.attempts();
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[1].0, endpoint());
    assert!(attempts[1].1 - failed_at >= Duration::from_secs(5));

    let status = client.status().await.unwrap();
    assert_eq!(status.state, ConnectionState::Connected);
    assert_eq!(status.reconnect_count, 1);
    assert_quiet(&mut events).await;
}

#[tokio::test(start_paused = true)]
async fn test_read_failure_without_reconnect_disconnects() {
    let mock = MockTransport::new();
    let peer = mock.accept(64);
    let (client, mut events) = client(&mock, 0);

    client.connect_endpoint(endpoint());
    assert!(matches!(next_event(&mut events).await, ClientEvent::Connected));

    drop(peer);
    assert!(matches!(next_event(&mut events).await, ClientEvent::Error(_)));
    assert!(matches!(
        next_event(&mut events).await,
        ClientEvent::Disconnected
    ));

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(mock.attempts().len(), 1);
    assert_eq!(client.state().await.unwrap(), ConnectionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_data_is_delivered() {
    let mock = MockTransport::new();
    let mut peer = mock.accept(64);
    let (client, mut events) = client(&mock, 5);

    client.connect_endpoint(endpoint());
    assert!(matches!(next_event(&mut events).await, ClientEvent::Connected));

    peer.write_all(b"hello").await.unwrap();
    match next_event(&mut events).await {
        ClientEvent::Data(data) => assert_eq!(&data[..], b"hello"),
        other => panic!("expected data, got {:?}", other),
    }
    drop(client);
}

#[tokio::test(start_paused = true)]
async fn test_terminate_suppresses_everything() {
    let mock = MockTransport::new();
    let mut peer = mock.accept(64);
    let (client, mut events) = client(&mock, 5);

    client.connect_endpoint(endpoint());
    assert!(matches!(next_event(&mut events).await, ClientEvent::Connected));

    assert_ok!(client.terminate(false));

    // Whatever the peer does now goes unreported
    let _ = peer.write_all(b"late").await;
    drop(peer);
    assert_quiet(&mut events).await;

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(mock.attempts().len(), 1);
    assert_eq!(client.state().await.unwrap(), ConnectionState::Idle);
    assert_quiet(&mut events).await;
}

#[tokio::test(start_paused = true)]
async fn test_connect_after_terminate_resumes_notifications() {
    let mock = MockTransport::new();
    let _first_peer = mock.accept(64);
    let _second_peer = mock.accept(64);
    let (client, mut events) = client(&mock, 5);

    client.connect_endpoint(endpoint());
    assert!(matches!(next_event(&mut events).await, ClientEvent::Connected));

    assert_ok!(client.terminate(true));
    assert_quiet(&mut events).await;

    client.connect_endpoint(endpoint());
    assert!(matches!(next_event(&mut events).await, ClientEvent::Connected));
    assert_eq!(mock.attempts().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_connect_ignored_while_connected() {
    let mock = MockTransport::new();
    let _peer = mock.accept(64);
    let (client, mut events) = client(&mock, 5);

    client.connect_endpoint(endpoint());
    assert!(matches!(next_event(&mut events).await, ClientEvent::Connected));

    client.connect("198.51.100.7", 80);
    assert_quiet(&mut events).await;

    assert_eq!(mock.attempts().len(), 1);
    assert_eq!(client.endpoint().await.unwrap(), Some(endpoint()));
    assert!(client.is_connected().await);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_cancels_pending_reconnect() {
    let mock = MockTransport::new();
    mock.push(Outcome::Refuse);
    let (client, mut events) = client(&mock, 5);

    client.connect_endpoint(endpoint());
    assert!(matches!(next_event(&mut events).await, ClientEvent::Error(_)));
    assert_eq!(
        client.state().await.unwrap(),
        ConnectionState::ReconnectPending
    );

    assert_ok!(client.disconnect(false));
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(mock.attempts().len(), 1);
    assert_eq!(client.state().await.unwrap(), ConnectionState::Idle);
    assert_quiet(&mut events).await;
}

#[tokio::test(start_paused = true)]
async fn test_manual_connect_preempts_reconnect_timer() {
    let mock = MockTransport::new();
    mock.push(Outcome::Refuse);
    let _peer = mock.accept(64);
    let (client, mut events) = client(&mock, 30);
    let start = Instant::now();

    client.connect_endpoint(endpoint());
    assert!(matches!(next_event(&mut events).await, ClientEvent::Error(_)));

    client.connect_endpoint(endpoint());
    assert!(matches!(next_event(&mut events).await, ClientEvent::Connected));
    assert!(start.elapsed() < Duration::from_secs(30));

    // The cancelled timer must not start a third attempt
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(mock.attempts().len(), 2);
    assert!(client.is_connected().await);
    assert_quiet(&mut events).await;
}

#[tokio::test(start_paused = true)]
async fn test_disabling_reconnect_while_pending_disconnects() {
    let mock = MockTransport::new();
    mock.push(Outcome::Refuse);
    let (client, mut events) = client(&mock, 30);

    client.connect_endpoint(endpoint());
    assert!(matches!(next_event(&mut events).await, ClientEvent::Error(_)));

    client.set_reconnect_delay(0);
    assert!(matches!(
        next_event(&mut events).await,
        ClientEvent::Disconnected
    ));

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(mock.attempts().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_refused_attempts_keep_retrying() {
    let mock = MockTransport::new();
    mock.push(Outcome::Refuse);
    mock.push(Outcome::Refuse);
    let _peer = mock.accept(64);
    let (client, mut events) = client(&mock, 2);

    client.connect_endpoint(endpoint());
    assert!(matches!(next_event(&mut events).await, ClientEvent::Error(_)));
    assert!(matches!(next_event(&mut events).await, ClientEvent::Error(_)));
    assert!(matches!(next_event(&mut events).await, ClientEvent::Connected));

    let attempts = mock.attempts();
    assert_eq!(attempts.len(), 3);
    assert!(attempts[1].1 - attempts[0].1 >= Duration::from_secs(2));
    assert!(attempts[2].1 - attempts[1].1 >= Duration::from_secs(2));

    // Failed attempts before the first connection are not reconnects
    assert_eq!(client.reconnect_count().await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_handshake_failure_is_reported() {
    let mock = MockTransport::failing_handshake();
    let _peer = mock.accept(64);
    let (client, mut events) = client(&mock, 0);

    client.connect_endpoint(endpoint());
    match next_event(&mut events).await {
        ClientEvent::Error(e) => {
            assert!(matches!(e, ClientError::Handshake { .. }));
            assert_eq!(e.kind(), Some(io::ErrorKind::InvalidData));
            assert_eq!(e.condition(), Condition::Other);
        }
        other => panic!("expected error, got {:?}", other),
    }
    assert!(matches!(
        next_event(&mut events).await,
        ClientEvent::Disconnected
    ));
    assert_eq!(client.state().await.unwrap(), ConnectionState::Idle);
}

/// Sink whose first `on_data` blocks until released
struct StallingSink {
    release: std::sync::mpsc::Receiver<()>,
    stalled: bool,
    received: Arc<AtomicUsize>,
}

impl EventSink for StallingSink {
    fn on_connect(&mut self) {}

    fn on_disconnect(&mut self) {}

    fn on_error(&mut self, _error: &ClientError) {}

    fn on_data(&mut self, data: &[u8]) {
        self.received.fetch_add(data.len(), Ordering::SeqCst);
        if !self.stalled {
            self.stalled = true;
            let _ = self.release.recv_timeout(Duration::from_secs(10));
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_slow_sink_pushes_back_on_peer() {
    const TOTAL: usize = 64 * 1024;

    let mock = MockTransport::new();
    let mut peer = mock.accept(16);
    let (release_tx, release) = std::sync::mpsc::channel();
    let received = Arc::new(AtomicUsize::new(0));
    let client = AsyncTcpClient::builder()
        .read_buffer_size(16)
        .with_transport(mock.clone())
        .build(StallingSink {
            release,
            stalled: false,
            received: received.clone(),
        })
        .unwrap();

    client.connect_endpoint(endpoint());
    let writer = tokio::spawn(async move {
        peer.write_all(&vec![b'x'; TOTAL]).await.unwrap();
        peer
    });

    // Only the first chunk is taken while the sink is stuck in it
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(!writer.is_finished());
    assert!(received.load(Ordering::SeqCst) <= 16);

    release_tx.send(()).unwrap();
    let _peer = tokio::time::timeout(Duration::from_secs(10), writer)
        .await
        .expect("peer never finished writing")
        .unwrap();

    for _ in 0..500 {
        if received.load(Ordering::SeqCst) == TOTAL {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("received {} of {} bytes", received.load(Ordering::SeqCst), TOTAL);
}
