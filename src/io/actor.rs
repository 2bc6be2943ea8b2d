//! Connection state machine
//!
//! One task per client owns the transport, the lifecycle state, the write queue
//! and the reconnect timer. Every transport operation (resolve, connect,
//! handshake, read, write) runs in its own spawned task and reports back with a
//! [`Completion`] on a channel, so all state changes happen on this task only.
//!
//! Each connection incarnation is tagged with a generation number. Tearing a
//! connection down bumps the generation, and completions carrying an older
//! generation are dropped without effect.

use crate::error::ClientError;
use crate::io::reconnect::ReconnectPolicy;
use crate::io::sink::EventSink;
use crate::io::state::ConnectionState;
use crate::io::transport::Transport;
use crate::io::write_queue::{WriteQueue, WriteStats};
use bytes::Bytes;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Sleep;
use tracing::{debug, info, trace, warn};

/// Requests sent from the client handle to the task
pub(crate) enum Command {
    Connect { host: String, port: u16 },
    ConnectEndpoint(SocketAddr),
    Write(Bytes),
    Disconnect,
    SetReconnectDelay(u64),
    Status(oneshot::Sender<ClientStatus>),
}

/// Snapshot of a client's state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientStatus {
    /// Current lifecycle state
    pub state: ConnectionState,
    /// Last resolved endpoint, target of automatic reconnects
    pub endpoint: Option<SocketAddr>,
    /// Connections established after the first one
    pub reconnect_count: usize,
    /// Reconnect delay in seconds (0 = disabled)
    pub reconnect_delay_secs: u64,
    /// Write queue statistics
    pub writes: WriteStats,
}

/// Result of a transport operation, tagged with its generation
pub(crate) enum Completion<T: Transport> {
    Resolved {
        generation: u64,
        host: String,
        result: io::Result<Option<SocketAddr>>,
    },
    Connected {
        generation: u64,
        endpoint: SocketAddr,
        result: io::Result<T::Socket>,
    },
    Handshaken {
        generation: u64,
        endpoint: SocketAddr,
        result: io::Result<T::Stream>,
    },
    Read {
        generation: u64,
        result: io::Result<Bytes>,
        /// Dropped or fired once the chunk has been handled; the read loop
        /// waits for it before reading again
        ack: Option<oneshot::Sender<()>>,
    },
    Written {
        generation: u64,
        writer: WriteHalf<T::Stream>,
        result: io::Result<()>,
    },
}

impl<T: Transport> Completion<T> {
    fn generation(&self) -> u64 {
        match self {
            Completion::Resolved { generation, .. }
            | Completion::Connected { generation, .. }
            | Completion::Handshaken { generation, .. }
            | Completion::Read { generation, .. }
            | Completion::Written { generation, .. } => *generation,
        }
    }
}

/// Live connection: the write half and the tasks using the stream
///
/// Dropping it aborts both tasks, which drops both halves and closes the socket.
struct Connection<S> {
    writer: Option<WriteHalf<S>>,
    reader: JoinHandle<()>,
    write_task: Option<JoinHandle<()>>,
}

impl<S> Drop for Connection<S> {
    fn drop(&mut self) {
        self.reader.abort();
        if let Some(task) = self.write_task.take() {
            task.abort();
        }
    }
}

pub(crate) struct ClientActor<T: Transport, S: EventSink> {
    transport: Arc<T>,
    sink: S,
    callbacks: Arc<AtomicBool>,
    policy: ReconnectPolicy,
    read_buffer_size: usize,
    state: ConnectionState,
    target: Option<(String, u16)>,
    endpoint: Option<SocketAddr>,
    connection: Option<Connection<T::Stream>>,
    attempt: Option<JoinHandle<()>>,
    generation: u64,
    queue: WriteQueue,
    reconnect_timer: Option<Pin<Box<Sleep>>>,
    has_connected: bool,
    reconnect_count: usize,
    done_tx: mpsc::UnboundedSender<Completion<T>>,
}

impl<T: Transport, S: EventSink> ClientActor<T, S> {
    pub(crate) fn new(
        transport: T,
        sink: S,
        callbacks: Arc<AtomicBool>,
        policy: ReconnectPolicy,
        read_buffer_size: usize,
        max_pending_writes: Option<usize>,
    ) -> (Self, mpsc::UnboundedReceiver<Completion<T>>) {
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let actor = Self {
            transport: Arc::new(transport),
            sink,
            callbacks,
            policy,
            read_buffer_size: read_buffer_size.max(1),
            state: ConnectionState::Idle,
            target: None,
            endpoint: None,
            connection: None,
            attempt: None,
            generation: 0,
            queue: WriteQueue::with_limit(max_pending_writes),
            reconnect_timer: None,
            has_connected: false,
            reconnect_count: 0,
            done_tx,
        };
        (actor, done_rx)
    }

    /// Run until the client handle is dropped
    pub(crate) async fn run(
        mut self,
        mut cmd_rx: mpsc::UnboundedReceiver<Command>,
        mut done_rx: mpsc::UnboundedReceiver<Completion<T>>,
    ) {
        debug!(secure = self.transport.is_secure(), "Client task started");

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },
                Some(done) = done_rx.recv() => self.handle_completion(done),
                () = wait_reconnect(&mut self.reconnect_timer) => self.on_reconnect_timer(),
            }
        }

        self.close();
        debug!("Client task stopped");
    }

    pub(crate) fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Connect { host, port } => {
                if !self.state.accepts_connect() {
                    debug!(state = %self.state, host = %host, "Connect ignored");
                    return;
                }
                self.cancel_reconnect();
                self.reset_connection();
                self.target = Some((host.clone(), port));
                self.endpoint = None;
                self.begin_resolve(host, port);
            }
            Command::ConnectEndpoint(endpoint) => {
                if !self.state.accepts_connect() {
                    debug!(state = %self.state, endpoint = %endpoint, "Connect ignored");
                    return;
                }
                self.cancel_reconnect();
                self.reset_connection();
                self.target = None;
                self.endpoint = Some(endpoint);
                self.begin_connect(endpoint);
            }
            Command::Write(data) => {
                let ready = self.state == ConnectionState::Connected;
                trace!(bytes = data.len(), ready = ready, "Write requested");
                if let Some(data) = self.queue.offer(data, ready) {
                    self.submit_write(data);
                }
            }
            Command::Disconnect => self.close(),
            Command::SetReconnectDelay(secs) => {
                self.policy = ReconnectPolicy::with_delay_secs(secs);
                info!(delay_secs = secs, "Reconnect delay changed");
                if !self.policy.is_enabled() && self.reconnect_timer.is_some() {
                    self.cancel_reconnect();
                    self.state = ConnectionState::Idle;
                    self.notify(|sink| sink.on_disconnect());
                }
            }
            Command::Status(reply) => {
                let _ = reply.send(self.status());
            }
        }
    }

    pub(crate) fn handle_completion(&mut self, done: Completion<T>) {
        if done.generation() != self.generation {
            trace!(
                generation = done.generation(),
                current = self.generation,
                "Dropping stale completion"
            );
            return;
        }

        match done {
            Completion::Resolved { host, result, .. } => match result {
                Ok(Some(endpoint)) => {
                    debug!(host = %host, endpoint = %endpoint, "Host resolved");
                    self.endpoint = Some(endpoint);
                    self.begin_connect(endpoint);
                }
                Ok(None) => self.fail(ClientError::Resolve {
                    host,
                    source: io::Error::new(io::ErrorKind::NotFound, "host not found"),
                }),
                Err(e) => self.fail(ClientError::Resolve {
                    host,
                    source: io::Error::new(io::ErrorKind::NotFound, e.to_string()),
                }),
            },
            Completion::Connected {
                endpoint, result, ..
            } => match result {
                Ok(socket) => self.begin_handshake(socket, endpoint),
                Err(source) => self.fail(ClientError::Connect { endpoint, source }),
            },
            Completion::Handshaken {
                endpoint, result, ..
            } => match result {
                Ok(stream) => self.established(stream, endpoint),
                Err(source) => self.fail(ClientError::Handshake { endpoint, source }),
            },
            Completion::Read { result, ack, .. } => match result {
                Ok(data) => {
                    trace!(bytes = data.len(), "Data received");
                    self.notify(|sink| sink.on_data(&data));
                    if let Some(ack) = ack {
                        let _ = ack.send(());
                    }
                }
                Err(e) => self.fail(ClientError::Read(e)),
            },
            Completion::Written { writer, result, .. } => match result {
                Ok(()) => {
                    if let Some(conn) = self.connection.as_mut() {
                        conn.writer = Some(writer);
                        conn.write_task = None;
                    }
                    if let Some(next) = self.queue.complete() {
                        self.submit_write(next);
                    }
                }
                Err(e) => {
                    drop(writer);
                    self.queue.fail();
                    self.fail(ClientError::Write(e));
                }
            },
        }
    }

    /// Reconnect timer fired
    pub(crate) fn on_reconnect_timer(&mut self) {
        self.reconnect_timer = None;

        if matches!(
            self.state,
            ConnectionState::Connected | ConnectionState::Closing
        ) {
            return;
        }

        // Stale handle from the failed incarnation, if any
        self.reset_connection();

        if let Some(endpoint) = self.endpoint {
            info!(endpoint = %endpoint, attempt = self.reconnect_count + 1, "Reconnecting");
            self.begin_connect(endpoint);
        } else if let Some((host, port)) = self.target.clone() {
            info!(host = %host, port = port, "Reconnecting (resolving again)");
            self.begin_resolve(host, port);
        } else {
            self.state = ConnectionState::Idle;
        }
    }

    fn begin_resolve(&mut self, host: String, port: u16) {
        self.state = ConnectionState::Connecting;
        let generation = self.generation;
        let tx = self.done_tx.clone();

        debug!(host = %host, port = port, "Resolving host");

        self.attempt = Some(tokio::spawn(async move {
            // Only the first candidate is ever used
            let result = tokio::net::lookup_host((host.as_str(), port))
                .await
                .map(|mut addrs| addrs.next());
            let _ = tx.send(Completion::Resolved {
                generation,
                host,
                result,
            });
        }));
    }

    fn begin_connect(&mut self, endpoint: SocketAddr) {
        self.state = ConnectionState::Connecting;
        let generation = self.generation;
        let tx = self.done_tx.clone();
        let transport = self.transport.clone();

        debug!(endpoint = %endpoint, generation = generation, "Connecting");

        self.attempt = Some(tokio::spawn(async move {
            let result = transport.connect(endpoint).await;
            let _ = tx.send(Completion::Connected {
                generation,
                endpoint,
                result,
            });
        }));
    }

    fn begin_handshake(&mut self, socket: T::Socket, endpoint: SocketAddr) {
        if self.transport.is_secure() {
            self.state = ConnectionState::Handshaking;
            debug!(endpoint = %endpoint, "Starting TLS handshake");
        }
        let generation = self.generation;
        let tx = self.done_tx.clone();
        let transport = self.transport.clone();

        self.attempt = Some(tokio::spawn(async move {
            let result = transport.handshake(socket, endpoint).await;
            let _ = tx.send(Completion::Handshaken {
                generation,
                endpoint,
                result,
            });
        }));
    }

    fn established(&mut self, stream: T::Stream, endpoint: SocketAddr) {
        self.attempt = None;
        let (reader, writer) = tokio::io::split(stream);
        let reader = tokio::spawn(read_loop(
            reader,
            self.generation,
            self.read_buffer_size,
            self.done_tx.clone(),
        ));

        self.connection = Some(Connection {
            writer: Some(writer),
            reader,
            write_task: None,
        });
        self.state = ConnectionState::Connected;

        if self.has_connected {
            self.reconnect_count += 1;
        }
        self.has_connected = true;

        info!(
            endpoint = %endpoint,
            secure = self.transport.is_secure(),
            reconnect_count = self.reconnect_count,
            "Connection established"
        );

        self.notify(|sink| sink.on_connect());

        if let Some(next) = self.queue.resume() {
            self.submit_write(next);
        }
    }

    fn submit_write(&mut self, data: Bytes) {
        let writer = self.connection.as_mut().and_then(|conn| conn.writer.take());
        let Some(mut writer) = writer else {
            // Connection vanished between queueing and submission
            self.queue.fail();
            return;
        };

        let generation = self.generation;
        let tx = self.done_tx.clone();
        trace!(bytes = data.len(), queued = self.queue.len(), "Submitting write");

        let task = tokio::spawn(async move {
            let result = async {
                writer.write_all(&data).await?;
                writer.flush().await
            }
            .await;
            let _ = tx.send(Completion::Written {
                generation,
                writer,
                result,
            });
        });

        if let Some(conn) = self.connection.as_mut() {
            conn.write_task = Some(task);
        }
    }

    /// Common failure path for resolve, connect, handshake, read and write
    pub(crate) fn fail(&mut self, error: ClientError) {
        if self.state == ConnectionState::Closing {
            debug!(error = %error, "Failure during deliberate close ignored");
            self.finish_close();
            return;
        }

        warn!(error = %error, state = %self.state, "Connection failure");

        self.reset_connection();
        self.notify(|sink| sink.on_error(&error));

        if !self.policy.is_enabled() {
            self.state = ConnectionState::Idle;
            info!("Reconnect disabled, connection closed");
            self.notify(|sink| sink.on_disconnect());
            return;
        }

        self.state = ConnectionState::ReconnectPending;
        if self.reconnect_timer.is_some() {
            debug!("Reconnect already pending");
            return;
        }
        self.schedule_reconnect();
    }

    fn schedule_reconnect(&mut self) {
        let Some(delay) = self.policy.delay() else {
            return;
        };
        info!(
            delay_secs = delay.as_secs(),
            endpoint = ?self.endpoint,
            "Scheduling reconnect"
        );
        self.reconnect_timer = Some(Box::pin(tokio::time::sleep(delay)));
    }

    fn cancel_reconnect(&mut self) {
        if self.reconnect_timer.take().is_some() {
            debug!("Reconnect timer cancelled");
        }
    }

    /// Drop the current connection and any attempt in progress
    fn reset_connection(&mut self) {
        self.generation += 1;
        if let Some(attempt) = self.attempt.take() {
            attempt.abort();
        }
        if self.connection.take().is_some() && self.queue.is_in_flight() {
            // The in-flight write went down with its connection
            self.queue.fail();
        }
    }

    /// Deliberate close requested by the caller
    fn close(&mut self) {
        self.cancel_reconnect();
        self.queue.clear();
        if self.connection.is_some() || self.attempt.is_some() {
            self.state = ConnectionState::Closing;
            debug!("Closing connection");
        }
        self.finish_close();
    }

    fn finish_close(&mut self) {
        self.reset_connection();
        if self.state != ConnectionState::Idle {
            info!(endpoint = ?self.endpoint, "Connection closed");
        }
        self.state = ConnectionState::Idle;
    }

    fn notify(&mut self, f: impl FnOnce(&mut S)) {
        if self.callbacks.load(Ordering::Acquire) {
            f(&mut self.sink);
        }
    }

    fn status(&self) -> ClientStatus {
        ClientStatus {
            state: self.state,
            endpoint: self.endpoint,
            reconnect_count: self.reconnect_count,
            reconnect_delay_secs: self.policy.delay_secs,
            writes: self.queue.stats(),
        }
    }
}

async fn wait_reconnect(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

/// Read until failure, one chunk at a time
///
/// The next read is only issued after the client task has delivered the
/// previous chunk, so a slow sink pushes back on the peer through the socket
/// instead of buffering without bound.
async fn read_loop<T: Transport>(
    mut reader: ReadHalf<T::Stream>,
    generation: u64,
    buffer_size: usize,
    tx: mpsc::UnboundedSender<Completion<T>>,
) {
    let mut buf = vec![0u8; buffer_size];
    loop {
        let result = match reader.read(&mut buf).await {
            Ok(0) => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed by peer",
            )),
            Ok(n) => Ok(Bytes::copy_from_slice(&buf[..n])),
            Err(e) => Err(e),
        };

        if result.is_err() {
            let _ = tx.send(Completion::Read {
                generation,
                result,
                ack: None,
            });
            break;
        }

        let (ack, delivered) = oneshot::channel();
        if tx
            .send(Completion::Read {
                generation,
                result,
                ack: Some(ack),
            })
            .is_err()
        {
            break;
        }
        // Sender dropped: the completion was stale or the task is gone
        if delivered.await.is_err() {
            break;
        }
    }
}
