//! Connection State Machine
//!
//! ```text
//!   Idle ──handshake──► Connected ──failure / peer close / close()──► Disconnected
//!     │                                                                  ▲
//!     └──────────────────────── close() / accept failure ────────────────┘
//! ```
//!
//! Linear, no cycles. `Disconnected` is terminal and is entered through a
//! single compare-and-set, so racing teardown paths produce exactly one
//! transition and one notification.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::observe::{Observers, Subscription};

/// Lifecycle of a session's single connection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Created, or waiting for the peer
    Idle,
    /// Peer attached; messages flow
    Connected,
    /// Terminal
    Disconnected,
}

impl ConnectionState {
    const fn as_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Connected => 1,
            Self::Disconnected => 2,
        }
    }

    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Idle,
            1 => Self::Connected,
            _ => Self::Disconnected,
        }
    }

    /// Whether this state is final
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self == Self::Disconnected
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Connected => write!(f, "connected"),
            Self::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Atomic state flag plus its observers
///
/// Transitions publish while holding the observer lock, so a concurrent
/// [`subscribe`](Self::subscribe) sees either the old state followed by the
/// transition, or the new state, never a gap or a duplicate.
pub(crate) struct ConnectionStateMachine {
    state: AtomicU8,
    observers: Mutex<Observers<ConnectionState>>,
}

impl ConnectionStateMachine {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(ConnectionState::Idle.as_u8()),
            observers: Mutex::new(Observers::new()),
        }
    }

    pub(crate) fn current(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// `Idle -> Connected`; `false` if the session already moved on
    pub(crate) fn mark_connected(&self) -> bool {
        let mut observers = self.observers.lock();
        let swapped = self
            .state
            .compare_exchange(
                ConnectionState::Idle.as_u8(),
                ConnectionState::Connected.as_u8(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok();
        if swapped {
            observers.publish(ConnectionState::Connected);
        }
        swapped
    }

    /// Enter `Disconnected` from any other state
    ///
    /// Only the caller that wins the swap gets `true`; it runs `on_enter`
    /// (resource release) before observers hear about the transition. Every
    /// state subscription ends afterwards.
    pub(crate) fn disconnect_with(&self, on_enter: impl FnOnce()) -> bool {
        let terminal = ConnectionState::Disconnected.as_u8();
        let mut current = self.state.load(Ordering::SeqCst);
        loop {
            if current == terminal {
                return false;
            }
            match self.state.compare_exchange(
                current,
                terminal,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }

        on_enter();

        // A concurrent mark_connected that won before the swap has already
        // published Connected under this lock, so ordering holds.
        let mut observers = self.observers.lock();
        observers.publish(ConnectionState::Disconnected);
        observers.close();
        true
    }

    /// Stream of states, starting with the current one
    pub(crate) fn subscribe(&self) -> Subscription<ConnectionState> {
        let mut observers = self.observers.lock();
        let current = self.current();
        // Swapped but not yet published: Disconnected is still on its way
        let pending = current.is_terminal() && !observers.is_closed();
        observers.subscribe_with((!pending).then_some(current))
    }
}
