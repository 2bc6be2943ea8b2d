//! Error types for client operations
//!
//! Every connection failure is described by a [`ClientError`]. Failures on the
//! I/O path are never returned from the public API; they reach the consumer
//! through [`EventSink::on_error`](crate::io::EventSink::on_error). Only the
//! synchronous operations (building a client, `disconnect`, `terminate` and the
//! state observers) return `Result`.

use std::io;
use std::net::SocketAddr;
use thiserror::Error;

/// Client error types
#[derive(Error, Debug)]
pub enum ClientError {
    /// Address resolution failed
    ///
    /// Also produced when resolution succeeds but yields no candidate address;
    /// in that case the I/O kind is [`io::ErrorKind::NotFound`].
    ///
    /// # Example
    /// ```no_run
    /// # use asynctcp::error::ClientError;
    /// let err = ClientError::Resolve {
    ///     host: "unknown.invalid".to_string(),
    ///     source: std::io::Error::new(std::io::ErrorKind::NotFound, "host not found"),
    /// };
    /// ```
    #[error("failed to resolve {host}: {source}")]
    Resolve {
        /// Host name as given to `connect`
        host: String,
        /// Underlying resolver error
        source: io::Error,
    },

    /// TCP connect failed (refused, unreachable, timed out)
    #[error("connect to {endpoint} failed: {source}")]
    Connect {
        /// Endpoint the attempt targeted
        endpoint: SocketAddr,
        /// Underlying socket error
        source: io::Error,
    },

    /// TLS negotiation failed on an established TCP connection
    #[error("TLS handshake with {endpoint} failed: {source}")]
    Handshake {
        /// Endpoint the attempt targeted
        endpoint: SocketAddr,
        /// Underlying TLS or socket error
        source: io::Error,
    },

    /// Reading from the peer failed
    ///
    /// An orderly shutdown by the peer is reported as
    /// [`io::ErrorKind::UnexpectedEof`].
    #[error("read failed: {0}")]
    Read(#[source] io::Error),

    /// Writing to the peer failed
    #[error("write failed: {0}")]
    Write(#[source] io::Error),

    /// The client task is no longer running
    #[error("client task has stopped")]
    Closed,

    /// No tokio runtime was available to host the client task
    #[error("no tokio runtime: {0}")]
    Runtime(#[from] tokio::runtime::TryCurrentError),
}

/// Coarse classification of a failure
///
/// Lets consumers tell "could not reach the peer" apart from "the peer went
/// away" without matching on individual I/O kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// Peer could not be reached: refused, unreachable, timed out, address in
    /// use, permission denied, or the host name did not resolve
    Unreachable,
    /// An established connection was dropped: EOF, reset, aborted, broken pipe
    Reset,
    /// Anything else
    Other,
}

impl ClientError {
    /// I/O kind of the underlying error, if there is one
    pub fn kind(&self) -> Option<io::ErrorKind> {
        self.io_error().map(io::Error::kind)
    }

    /// Underlying I/O error, if there is one
    pub fn io_error(&self) -> Option<&io::Error> {
        match self {
            ClientError::Resolve { source, .. }
            | ClientError::Connect { source, .. }
            | ClientError::Handshake { source, .. } => Some(source),
            ClientError::Read(e) | ClientError::Write(e) => Some(e),
            ClientError::Closed | ClientError::Runtime(_) => None,
        }
    }

    /// Classify this failure
    ///
    /// # Examples
    ///
    /// ```
    /// use asynctcp::error::{ClientError, Condition};
    /// use std::io;
    ///
    /// let err = ClientError::Read(io::Error::from(io::ErrorKind::UnexpectedEof));
    /// assert_eq!(err.condition(), Condition::Reset);
    /// ```
    pub fn condition(&self) -> Condition {
        if matches!(self, ClientError::Resolve { .. }) {
            return Condition::Unreachable;
        }
        match self.kind() {
            Some(
                io::ErrorKind::ConnectionRefused
                | io::ErrorKind::AddrInUse
                | io::ErrorKind::PermissionDenied
                | io::ErrorKind::TimedOut
                | io::ErrorKind::HostUnreachable
                | io::ErrorKind::NetworkUnreachable
                | io::ErrorKind::AddrNotAvailable,
            ) => Condition::Unreachable,
            Some(
                io::ErrorKind::UnexpectedEof
                | io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::BrokenPipe,
            ) => Condition::Reset,
            _ => Condition::Other,
        }
    }
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;
