//! Session Facade
//!
//! The only type the rest of the application talks to. A [`Session`] owns one
//! [`Transport`] and one state machine and lives for exactly one connection:
//! after `Disconnected` a new session is needed.
//!
//! # Example
//!
//! ```no_run
//! use duet_core::{ConnectionState, GameMessage, Session, TransportConfig};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let host = Session::new(TransportConfig::loopback());
//! let listen = host.start_as_host().await?;
//!
//! let joiner = Session::new(TransportConfig::loopback());
//! joiner.join_as_client("127.0.0.1".parse()?, listen.port()).await?;
//!
//! let mut incoming = joiner.observe_incoming();
//! host.wait_for_state(ConnectionState::Connected).await;
//! host.send(&GameMessage::select_cell(4, 4)?).await;
//! let msg = incoming.recv().await;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::messages::GameMessage;
use crate::observe::{Observers, Subscription};
use crate::state::{ConnectionState, ConnectionStateMachine};
use crate::transport::{
    codec, CloseReason, LinkHandler, ListenResult, Transport, TransportConfig, TransportError,
};

/// Which side of the session this peer plays
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Accepts the connection and owns the authoritative board
    Host,
    /// Connects to a host and mirrors its board
    Joiner,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host => write!(f, "host"),
            Self::Joiner => write!(f, "joiner"),
        }
    }
}

struct SessionInner {
    transport: Arc<Transport>,
    state: ConnectionStateMachine,
    incoming: Mutex<Observers<GameMessage>>,
    listen: Mutex<Option<ListenResult>>,
    role: OnceLock<Role>,
    close_reason: Mutex<Option<CloseReason>>,
    game_started: AtomicBool,
}

impl SessionInner {
    /// Single teardown path; `true` only for the call that performed it
    fn shutdown(&self, reason: CloseReason) -> bool {
        self.state.disconnect_with(|| {
            tracing::info!(%reason, role = ?self.role.get(), "Session disconnected");
            *self.close_reason.lock() = Some(reason);
            self.transport.stop();
            self.listen.lock().take();
            self.incoming.lock().close();
        })
    }
}

impl LinkHandler for SessionInner {
    fn on_connected(&self, peer: SocketAddr) -> bool {
        let accepted = self.state.mark_connected();
        if accepted {
            tracing::info!(%peer, "Session connected");
        } else {
            tracing::debug!(%peer, "Late connection refused; session already ended");
        }
        accepted
    }

    fn on_record(&self, record: String) {
        match codec::decode(&record) {
            Ok(message) => {
                tracing::trace!(kind = %message.kind(), "Received message");
                self.incoming.lock().publish(message);
            }
            Err(e) => {
                tracing::warn!(error = %e, bytes = record.len(), "Skipping undecodable record");
            }
        }
    }

    fn on_closed(&self, reason: CloseReason) {
        self.shutdown(reason);
    }
}

/// One peer's end of a two-player session
///
/// Dropping a session closes it.
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Create an idle session
    #[must_use]
    pub fn new(config: TransportConfig) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                transport: Arc::new(Transport::new(config)),
                state: ConnectionStateMachine::new(),
                incoming: Mutex::new(Observers::new()),
                listen: Mutex::new(None),
                role: OnceLock::new(),
                close_reason: Mutex::new(None),
                game_started: AtomicBool::new(false),
            }),
        }
    }

    fn claim_role(&self, role: Role) -> Result<(), TransportError> {
        if self.inner.state.current().is_terminal() {
            return Err(TransportError::Stopped);
        }
        self.inner.role.set(role).map_err(|_| {
            let taken = self.inner.role.get().map(Role::to_string).unwrap_or_default();
            TransportError::InvalidState(format!("session already started as {taken}"))
        })
    }

    /// `true` for the first caller only; guards the single `StartGame`
    pub(crate) fn claim_start(&self) -> bool {
        !self.inner.game_started.swap(true, Ordering::SeqCst)
    }

    fn handler(&self) -> Arc<dyn LinkHandler> {
        Arc::clone(&self.inner) as Arc<dyn LinkHandler>
    }

    /// Listen on an ephemeral port and wait for one peer in the background
    ///
    /// Returns once the port is known; the state turns `Connected` when the
    /// peer arrives. A setup failure ends the session.
    ///
    /// # Errors
    ///
    /// [`TransportError::Bind`] if no port can be bound,
    /// [`TransportError::InvalidState`] if this session already took a role,
    /// [`TransportError::Stopped`] if it was closed.
    pub async fn start_as_host(&self) -> Result<ListenResult, TransportError> {
        self.claim_role(Role::Host)?;

        let listen = match self.inner.transport.listen(self.handler()).await {
            Ok(listen) => listen,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to start hosting");
                self.inner.shutdown(CloseReason::Io(e.to_string()));
                return Err(e);
            }
        };

        *self.inner.listen.lock() = Some(listen);
        if self.inner.state.current().is_terminal() {
            // Closed while binding; shutdown may have run before the store
            self.inner.listen.lock().take();
            return Err(TransportError::Stopped);
        }

        tracing::info!(port = listen.port(), "Hosting session");
        Ok(listen)
    }

    /// Connect to a host
    ///
    /// A single attempt without retry. On success the state is already
    /// `Connected` when this returns.
    ///
    /// # Errors
    ///
    /// [`TransportError::Connect`] / [`TransportError::ConnectTimeout`] if the
    /// host cannot be reached, [`TransportError::InvalidState`] for port 0 or
    /// a session that already took a role.
    pub async fn join_as_client(&self, address: IpAddr, port: u16) -> Result<(), TransportError> {
        if port == 0 {
            return Err(TransportError::InvalidState(
                "port 0 is not a valid host port".to_string(),
            ));
        }
        self.claim_role(Role::Joiner)?;

        let addr = SocketAddr::new(address, port);
        if let Err(e) = self.inner.transport.dial(addr, self.handler()).await {
            tracing::warn!(error = %e, %addr, "Failed to join session");
            self.inner.shutdown(CloseReason::Io(e.to_string()));
            return Err(e);
        }
        Ok(())
    }

    /// Encode and write one message
    ///
    /// Silently dropped unless `Connected`. A write failure ends the session
    /// and is reported through [`observe_state`](Self::observe_state), not
    /// here. Returns whether the record reached the socket.
    pub async fn send(&self, message: &GameMessage) -> bool {
        if self.inner.state.current() != ConnectionState::Connected {
            tracing::debug!(kind = %message.kind(), "Not connected; message dropped");
            return false;
        }

        let record = match codec::encode(message) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(error = %e, "Refusing to send invalid message");
                return false;
            }
        };

        match self.inner.transport.write(&record).await {
            Ok(written) => {
                if written {
                    tracing::trace!(kind = %message.kind(), "Sent message");
                }
                written
            }
            Err(e) => {
                tracing::warn!(error = %e, "Write failed");
                self.inner.shutdown(CloseReason::Io(e.to_string()));
                false
            }
        }
    }

    /// Stream of decoded messages from the peer, in wire order
    ///
    /// Each call creates an independent subscriber that sees messages
    /// arriving after the call. Ends when the session disconnects.
    pub fn observe_incoming(&self) -> Subscription<GameMessage> {
        self.inner.incoming.lock().subscribe_with(None)
    }

    /// Stream of states, starting with the current one
    ///
    /// Carries at most one `Disconnected`, after which it ends.
    pub fn observe_state(&self) -> Subscription<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Force `Disconnected` and release every socket
    ///
    /// Idempotent: returns `true` only for the call that closed the session.
    pub fn close(&self) -> bool {
        self.inner.shutdown(CloseReason::LocalClose)
    }

    /// Current state
    pub fn state(&self) -> ConnectionState {
        self.inner.state.current()
    }

    /// Published port while hosting; cleared on disconnect
    pub fn listen_result(&self) -> Option<ListenResult> {
        *self.inner.listen.lock()
    }

    /// Role taken by this session, if any
    pub fn role(&self) -> Option<Role> {
        self.inner.role.get().copied()
    }

    /// Why the session ended, once it has
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.inner.close_reason.lock().clone()
    }

    /// Peer address of the active connection
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.inner.transport.peer_addr()
    }

    /// Local address of the active connection
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.transport.local_addr()
    }

    /// Transport configuration in use
    pub fn config(&self) -> &TransportConfig {
        self.inner.transport.config()
    }

    /// Wait until the session reaches `target`
    ///
    /// Returns `false` if the session ended without reaching it.
    pub async fn wait_for_state(&self, target: ConnectionState) -> bool {
        let mut states = self.observe_state();
        while let Some(state) = states.recv().await {
            if state == target {
                return true;
            }
        }
        false
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(TransportConfig::default())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.inner.shutdown(CloseReason::LocalClose);
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("role", &self.role())
            .field("state", &self.state())
            .field("listen", &self.listen_result())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_new_session_is_idle() {
        let session = Session::new(TransportConfig::loopback());
        assert_eq!(session.state(), ConnectionState::Idle);
        assert_eq!(session.role(), None);
        assert_eq!(session.listen_result(), None);
        assert_eq!(session.close_reason(), None);
    }

    #[tokio::test]
    async fn test_role_is_claimed_once() {
        let session = Session::new(TransportConfig::loopback());
        session.start_as_host().await.unwrap();
        assert_eq!(session.role(), Some(Role::Host));

        let again = session.start_as_host().await;
        assert!(matches!(again, Err(TransportError::InvalidState(_))));
        let join = session.join_as_client(IpAddr::from([127, 0, 0, 1]), 9).await;
        assert!(matches!(join, Err(TransportError::InvalidState(_))));
        session.close();
    }

    #[tokio::test]
    async fn test_join_rejects_port_zero() {
        let session = Session::new(TransportConfig::loopback());
        let result = session.join_as_client(IpAddr::from([127, 0, 0, 1]), 0).await;
        assert!(matches!(result, Err(TransportError::InvalidState(_))));
        // Nothing was attempted, so the session is still usable
        assert_eq!(session.state(), ConnectionState::Idle);
        assert_eq!(session.role(), None);
    }

    #[tokio::test]
    async fn test_close_while_idle() {
        let session = Session::new(TransportConfig::loopback());
        assert!(session.close());
        assert!(!session.close());
        assert_eq!(session.state(), ConnectionState::Disconnected);
        assert_eq!(session.close_reason(), Some(CloseReason::LocalClose));
        assert!(matches!(
            session.start_as_host().await,
            Err(TransportError::Stopped)
        ));
    }

    #[tokio::test]
    async fn test_close_clears_listen_result() {
        let session = Session::new(TransportConfig::loopback());
        let listen = session.start_as_host().await.unwrap();
        assert_eq!(session.listen_result(), Some(listen));
        session.close();
        assert_eq!(session.listen_result(), None);
    }

    #[tokio::test]
    async fn test_send_while_idle_is_dropped() {
        let session = Session::new(TransportConfig::loopback());
        let msg = GameMessage::select_cell(1, 1).unwrap();
        assert!(!session.send(&msg).await);
        assert_eq!(session.state(), ConnectionState::Idle);
    }

    #[tokio::test]
    async fn test_failed_join_ends_session() {
        let port = {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let session = Session::new(TransportConfig::loopback());
        let mut states = session.observe_state();

        let result = session.join_as_client(IpAddr::from([127, 0, 0, 1]), port).await;
        assert!(matches!(result, Err(TransportError::Connect { .. })));
        assert_eq!(session.state(), ConnectionState::Disconnected);
        assert_eq!(states.recv().await, Some(ConnectionState::Idle));
        assert_eq!(states.recv().await, Some(ConnectionState::Disconnected));
        assert_eq!(states.recv().await, None);
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::Host.to_string(), "host");
        assert_eq!(serde_json::to_string(&Role::Joiner).unwrap(), "\"joiner\"");
    }
}
