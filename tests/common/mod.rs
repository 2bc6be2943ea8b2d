//! Shared helpers for integration tests
//!
//! [`MockTransport`] hands out in-memory duplex streams according to a script,
//! and records every connect attempt with the (possibly paused) tokio clock.

#![allow(dead_code)]

use asynctcp::io::{ClientEvent, Transport, TransportFuture};
use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::Instant;

/// What the next connect attempt does
pub enum Outcome {
    /// Fail with `ConnectionRefused`
    Refuse,
    /// Succeed with this end of a duplex pipe
    Accept(DuplexStream),
    /// Succeed, but every write on the connection fails with `BrokenPipe`
    AcceptFailingWrites(DuplexStream),
}

/// Client end of a scripted connection
pub struct MockStream {
    inner: DuplexStream,
    fail_writes: bool,
}

impl AsyncRead for MockStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for MockStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if self.fail_writes {
            return Poll::Ready(Err(io::Error::from(io::ErrorKind::BrokenPipe)));
        }
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

#[derive(Default)]
struct Script {
    outcomes: VecDeque<Outcome>,
    attempts: Vec<(SocketAddr, Instant)>,
}

/// Scripted transport; attempts beyond the script never complete
#[derive(Clone, Default)]
pub struct MockTransport {
    script: Arc<Mutex<Script>>,
    secure: bool,
    fail_handshake: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Secured variant whose handshake always fails
    pub fn failing_handshake() -> Self {
        Self {
            secure: true,
            fail_handshake: true,
            ..Self::default()
        }
    }

    pub fn push(&self, outcome: Outcome) {
        self.script.lock().unwrap().outcomes.push_back(outcome);
    }

    /// Queue a successful connect and return the peer's end of the pipe
    pub fn accept(&self, capacity: usize) -> DuplexStream {
        let (client, peer) = tokio::io::duplex(capacity);
        self.push(Outcome::Accept(client));
        peer
    }

    /// Queue a connect whose writes all fail; reads still come from the peer
    pub fn accept_failing_writes(&self, capacity: usize) -> DuplexStream {
        let (client, peer) = tokio::io::duplex(capacity);
        self.push(Outcome::AcceptFailingWrites(client));
        peer
    }

    pub fn attempts(&self) -> Vec<(SocketAddr, Instant)> {
        self.script.lock().unwrap().attempts.clone()
    }
}

impl Transport for MockTransport {
    type Socket = MockStream;
    type Stream = MockStream;

    fn is_secure(&self) -> bool {
        self.secure
    }

    fn connect(&self, endpoint: SocketAddr) -> TransportFuture<'_, MockStream> {
        let outcome = {
            let mut script = self.script.lock().unwrap();
            script.attempts.push((endpoint, Instant::now()));
            script.outcomes.pop_front()
        };
        Box::pin(async move {
            match outcome {
                Some(Outcome::Refuse) => Err(io::Error::from(io::ErrorKind::ConnectionRefused)),
                Some(Outcome::Accept(inner)) => Ok(MockStream {
                    inner,
                    fail_writes: false,
                }),
                Some(Outcome::AcceptFailingWrites(inner)) => Ok(MockStream {
                    inner,
                    fail_writes: true,
                }),
                None => std::future::pending().await,
            }
        })
    }

    fn handshake(
        &self,
        socket: MockStream,
        _endpoint: SocketAddr,
    ) -> TransportFuture<'_, MockStream> {
        let fail = self.fail_handshake;
        Box::pin(async move {
            if fail {
                Err(io::Error::new(io::ErrorKind::InvalidData, "bad record"))
            } else {
                Ok(socket)
            }
        })
    }
}

pub fn endpoint() -> SocketAddr {
    "192.0.2.1:9".parse().unwrap()
}

/// Wait for the next notification
pub async fn next_event(events: &mut UnboundedReceiver<ClientEvent>) -> ClientEvent {
    tokio::time::timeout(Duration::from_secs(120), events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

/// Let pending work settle, then assert nothing was notified
pub async fn assert_quiet(events: &mut UnboundedReceiver<ClientEvent>) {
    tokio::time::sleep(Duration::from_millis(200)).await;
    if let Ok(event) = events.try_recv() {
        panic!("unexpected event: {:?}", event);
    }
}
