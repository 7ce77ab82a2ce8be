//! Transport Traits
//!
//! The seam between [`Transport`](super::Transport) and its owner.
//!
//! The transport knows about sockets and lines; it knows nothing about game
//! messages or session state. Everything it learns about the peer is handed
//! to a [`LinkHandler`], which the session implements.

use std::fmt;
use std::net::SocketAddr;

use thiserror::Error;

/// Port published by a successful `listen`
///
/// Never 0: the OS-assigned port is read back after binding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenResult {
    port: u16,
}

impl ListenResult {
    /// Wrap a bound port; `None` for the unbound sentinel 0
    #[must_use]
    pub fn new(port: u16) -> Option<Self> {
        (port != 0).then_some(Self { port })
    }

    /// The listening port, in 1..=65535
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for ListenResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "port {}", self.port)
    }
}

/// Why a connection (or a pending accept) ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CloseReason {
    /// `close()` was called locally
    LocalClose,
    /// Peer closed its end (EOF)
    PeerClosed,
    /// Read or write failed mid-session
    Io(String),
    /// The listening socket failed before a peer arrived
    AcceptFailed(String),
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LocalClose => write!(f, "closed locally"),
            Self::PeerClosed => write!(f, "peer closed the connection"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::AcceptFailed(e) => write!(f, "accept failed: {e}"),
        }
    }
}

/// Errors that can occur during transport operations
#[derive(Debug, Error)]
pub enum TransportError {
    /// Binding the listening socket failed
    #[error("Bind failed: {0}")]
    Bind(#[source] std::io::Error),

    /// Outbound connection failed
    #[error("Connect to {addr} failed: {source}")]
    Connect {
        /// Address dialed
        addr: SocketAddr,
        /// The underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Outbound connection did not complete in time
    #[error("Connect to {addr} timed out after {timeout_ms} ms")]
    ConnectTimeout {
        /// Address dialed
        addr: SocketAddr,
        /// Configured timeout
        timeout_ms: u64,
    },

    /// IO error on an established connection
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record contains a line terminator
    #[error("Record contains an embedded line terminator")]
    EmbeddedTerminator,

    /// Transport was stopped; it cannot be reused
    #[error("Transport stopped")]
    Stopped,

    /// Operation not valid in the current state
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Receives everything the transport learns about its peer
///
/// Called from the transport's background tasks; implementations must not
/// block.
pub trait LinkHandler: Send + Sync + 'static {
    /// A peer socket is ready. Returning `false` refuses it and the socket
    /// is dropped.
    fn on_connected(&self, peer: SocketAddr) -> bool;

    /// One complete record, terminator stripped
    fn on_record(&self, record: String);

    /// The connection (or pending accept) ended
    ///
    /// May race with a local `stop()`; the owner decides which wins.
    fn on_closed(&self, reason: CloseReason);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listen_result_rejects_unbound_port() {
        assert!(ListenResult::new(0).is_none());
        let listen = ListenResult::new(40123).unwrap();
        assert_eq!(listen.port(), 40123);
        assert_eq!(listen.to_string(), "port 40123");
    }

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::InvalidState("test".to_string());
        assert!(err.to_string().contains("Invalid state"));

        let io_err = std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use");
        let err = TransportError::Bind(io_err);
        assert!(err.to_string().contains("Bind failed"));

        let err = TransportError::ConnectTimeout {
            addr: "127.0.0.1:9".parse().unwrap(),
            timeout_ms: 250,
        };
        assert!(err.to_string().contains("timed out after 250 ms"));
    }

    #[test]
    fn test_close_reason_display() {
        assert_eq!(
            CloseReason::PeerClosed.to_string(),
            "peer closed the connection"
        );
        assert!(CloseReason::Io("reset".into()).to_string().contains("reset"));
    }
}
