//! Transport Layer for Peer-to-Peer Play
//!
//! Moves newline-terminated records between exactly two peers over TCP:
//! - `codec`: [`GameMessage`](crate::GameMessage) to and from one JSON record
//! - `tcp`: listener, dialer, line reader and serialized writer
//! - `traits`: the [`LinkHandler`] seam and error types
//!
//! # Design Philosophy
//!
//! The transport never interprets records. It reports connection, records and
//! closure to its owner through [`LinkHandler`]; the session decides what they
//! mean.
//!
//! # Security
//!
//! - No authentication or encryption; intended for a trusted local network
//! - One peer per session: the listener is dropped after the first accept
//! - Record length is bounded by `max_line_bytes`

pub mod codec;
pub mod config;
pub mod tcp;
pub mod traits;

// Re-exports for convenience
pub use codec::{decode, encode, ActionCodec, DecodeError, EncodeError};
pub use config::TransportConfig;
pub use tcp::Transport;
pub use traits::{CloseReason, LinkHandler, ListenResult, TransportError};
