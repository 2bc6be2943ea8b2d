//! Transport abstraction
//!
//! A [`Transport`] knows how to open a socket to an endpoint and how to turn
//! that socket into the byte stream the client reads and writes. Plain TCP
//! ([`TcpTransport`]) passes the socket through unchanged; TLS
//! ([`TlsTransport`](crate::io::tls::TlsTransport)) negotiates a session on it.
//! The client is generic over this trait, so tests can substitute scripted
//! in-memory streams.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, warn};

/// Boxed future returned by [`Transport`] methods
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = io::Result<T>> + Send + 'a>>;

/// Byte-stream transport used by [`AsyncTcpClient`](crate::io::AsyncTcpClient)
///
/// Closing is dropping: the client drops the stream (or socket) to close it.
pub trait Transport: Send + Sync + 'static {
    /// Connected but not yet negotiated socket
    type Socket: Send + 'static;

    /// Stream that carries application bytes
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Whether `handshake` does real work (the client then reports a
    /// handshaking state between connect and connected)
    fn is_secure(&self) -> bool;

    /// Open a connection to `endpoint`
    fn connect(&self, endpoint: SocketAddr) -> TransportFuture<'_, Self::Socket>;

    /// Negotiate the session on a freshly connected socket
    fn handshake(
        &self,
        socket: Self::Socket,
        endpoint: SocketAddr,
    ) -> TransportFuture<'_, Self::Stream>;
}

/// Plain TCP transport
///
/// # Examples
///
/// ```no_run
/// use asynctcp::io::transport::{TcpTransport, Transport};
///
/// # async fn example() -> std::io::Result<()> {
/// let transport = TcpTransport::new();
/// let socket = transport.connect("127.0.0.1:7000".parse().unwrap()).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TcpTransport {
    keep_alive: bool,
}

impl TcpTransport {
    /// Plain TCP with keep-alive enabled
    pub fn new() -> Self {
        Self { keep_alive: true }
    }

    /// Enable or disable `SO_KEEPALIVE` on new connections
    pub fn keep_alive(mut self, enable: bool) -> Self {
        self.keep_alive = enable;
        self
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for TcpTransport {
    type Socket = TcpStream;
    type Stream = TcpStream;

    fn is_secure(&self) -> bool {
        false
    }

    fn connect(&self, endpoint: SocketAddr) -> TransportFuture<'_, TcpStream> {
        Box::pin(connect_tcp(endpoint, self.keep_alive))
    }

    fn handshake(&self, socket: TcpStream, _endpoint: SocketAddr) -> TransportFuture<'_, TcpStream> {
        Box::pin(std::future::ready(Ok(socket)))
    }
}

/// Connect a TCP socket and apply the keep-alive setting
pub(crate) async fn connect_tcp(endpoint: SocketAddr, keep_alive: bool) -> io::Result<TcpStream> {
    let stream = TcpStream::connect(endpoint).await?;
    if keep_alive {
        // Not fatal: the connection is usable without it
        if let Err(e) = set_keepalive(&stream, true) {
            warn!(endpoint = %endpoint, error = %e, "Failed to enable keep-alive");
        }
    }
    debug!(
        endpoint = %endpoint,
        local_addr = ?stream.local_addr().ok(),
        keep_alive = keep_alive,
        "TCP socket connected"
    );
    Ok(stream)
}

/// Set `SO_KEEPALIVE` on a connected socket
#[cfg(unix)]
pub(crate) fn set_keepalive(stream: &TcpStream, enable: bool) -> io::Result<()> {
    use std::os::fd::AsRawFd;

    let fd = stream.as_raw_fd();
    let value = libc::c_int::from(enable);

    unsafe {
        let ret = libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_KEEPALIVE,
            &value as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        );

        if ret != 0 {
            return Err(io::Error::last_os_error());
        }
    }

    Ok(())
}

#[cfg(not(unix))]
pub(crate) fn set_keepalive(_stream: &TcpStream, _enable: bool) -> io::Result<()> {
    Ok(())
}
