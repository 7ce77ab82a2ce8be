//! Duet Core - Two-Peer Game Session Synchronization
//!
//! This crate keeps two players' copies of a shared 9×9 puzzle in sync over
//! a single TCP connection. One peer hosts (listens on an ephemeral port and
//! owns the authoritative board); the other joins and mirrors it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                   Application / Surface                       │
//! │        (CLI, UI, discovery, puzzle generation, scores)       │
//! └──────────────┬──────────────────────────────▲────────────────┘
//!                │ start_as_host / join_as_client│ observe_incoming
//!                │ send / close                  │ observe_state
//! ┌──────────────▼──────────────────────────────┴────────────────┐
//! │                          Session                              │
//! │  ┌────────────────────┐   ┌──────────────────────────────┐   │
//! │  │ ConnectionState    │   │ ActionCodec                  │   │
//! │  │ Idle→Connected→    │   │ GameMessage ⇄ JSON line      │   │
//! │  │ Disconnected (CAS) │   │ (action_type discriminant)   │   │
//! │  └────────────────────┘   └──────────────────────────────┘   │
//! │  ┌────────────────────────────────────────────────────────┐   │
//! │  │ Transport: listener (one accept) | dialer              │   │
//! │  │            read task → LinkHandler, Mutex<writer>      │   │
//! │  └────────────────────────────────────────────────────────┘   │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                │ TCP, newline-delimited JSON
//!                                ▼
//!                              peer
//! ```
//!
//! # Key Types
//!
//! - [`Session`]: the facade; one per connection
//! - [`GameMessage`]: `FillCell`, `SelectCell`, `StartGame`
//! - [`ConnectionState`]: `Idle`, `Connected`, `Disconnected`
//! - [`BoardMirror`]: local copy of the shared board
//! - [`Discovery`]: advertise and find hosted rooms
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use duet_core::{host_bootstrap, load_config, RandomBoardGenerator, Session};
//!
//! let config = load_config()?;
//! let host = Session::new(config.transport.clone());
//! let listen = host.start_as_host().await?;
//! println!("waiting on {listen}");
//!
//! let generator = Arc::new(RandomBoardGenerator::new());
//! let mut board = host_bootstrap(&host, generator, config.difficulty).await?;
//! let mut incoming = host.observe_incoming();
//! while let Some(msg) = incoming.recv().await {
//!     board.apply(&msg);
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`board`]: validated grid and board mirror
//! - [`config`]: TOML/env/CLI configuration
//! - [`discovery`]: room advertisement capability
//! - [`game`]: difficulty, puzzle generation, host start-of-game
//! - [`messages`]: the game message enum
//! - [`session`]: the session facade
//! - [`state`]: connection lifecycle
//! - [`transport`]: TCP transport and wire codec

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod board;
pub mod config;
pub mod discovery;
pub mod game;
pub mod messages;
mod observe;
pub mod session;
pub mod state;
pub mod transport;

// Re-exports for convenience
pub use board::{Applied, BoardMirror, Grid, IgnoreReason, BOARD_SIZE, CELL_COUNT, MAX_DIGIT};
pub use config::{
    default_config_path, load_config, load_config_from_path, ConfigError, ConfigOverrides,
    ConfigSource, DuetConfig,
};
pub use discovery::{
    Discovery, DiscoveryError, DiscoveryEvent, LocalDiscovery, RoomName, DEFAULT_ROOM_PREFIX,
};
pub use game::{
    host_bootstrap, BoardGenerator, Difficulty, FixedBoardGenerator, GameError,
    RandomBoardGenerator,
};
pub use messages::{FieldError, GameMessage, MessageKind};
pub use observe::Subscription;
pub use session::{Role, Session};
pub use state::ConnectionState;
pub use transport::{
    ActionCodec, CloseReason, DecodeError, EncodeError, ListenResult, TransportConfig,
    TransportError,
};
