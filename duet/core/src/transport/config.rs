//! Transport Configuration
//!
//! Socket-level settings for hosting and joining a session.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default connect timeout (5 seconds)
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;

/// Default upper bound for a single record (64 KiB)
///
/// A `StartGame` record is well under 300 bytes; anything near this limit is
/// not a game message.
pub const DEFAULT_MAX_LINE_BYTES: usize = 64 * 1024;

/// Smallest accepted `max_line_bytes`; must fit a `StartGame` record
pub const MIN_MAX_LINE_BYTES: usize = 512;

// Read by `config::load_config`, which validates the merged result

/// Env var: address the host binds to
pub const ENV_BIND_ADDR: &str = "DUET_BIND_ADDR";
/// Env var: connect timeout in ms
pub const ENV_CONNECT_TIMEOUT: &str = "DUET_CONNECT_TIMEOUT";
/// Env var: record size limit in bytes
pub const ENV_MAX_LINE_BYTES: &str = "DUET_MAX_LINE_BYTES";
/// Env var: "0" or "false" disables `TCP_NODELAY`
pub const ENV_NODELAY: &str = "DUET_NODELAY";

/// Transport configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Address the host listens on (port is always OS-assigned)
    pub bind_address: IpAddr,

    /// Connection timeout in milliseconds
    ///
    /// How long `join` waits for the host to accept.
    pub connect_timeout_ms: u64,

    /// Maximum length of a single record in bytes
    ///
    /// Longer lines are discarded up to their terminator.
    pub max_line_bytes: usize,

    /// Whether to set `TCP_NODELAY` on the peer socket
    ///
    /// Game actions are tiny and latency-sensitive.
    pub nodelay: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            nodelay: true,
        }
    }
}

impl TransportConfig {
    /// Configuration bound to the loopback interface (local play and tests)
    pub fn loopback() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            ..Default::default()
        }
    }

    /// Connect timeout as a [`Duration`]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}
