//! Duet - Command-Line Peer
//!
//! Hosts or joins a two-player puzzle session and plays it from the
//! terminal. Incoming moves are printed as they arrive; local moves are read
//! from stdin.
//!
//! # Usage
//!
//! ```bash
//! # Host a session (prints the port and a room name to share)
//! duet host --difficulty hard
//!
//! # Join it from another terminal or machine
//! duet join 192.168.1.20 40123
//!
//! # Decode one wire record
//! duet codec '{"action_type":"SelectCell","row":1,"col":2}'
//!
//! # Verbose logging
//! RUST_LOG=debug duet host
//! ```
//!
//! # Commands (stdin)
//!
//! - `fill <row> <col> <number>`: fill a cell (0 clears)
//! - `select <row> <col>`: move the cursor
//! - `board`: print the board
//! - `quit`: close the session

mod peer;

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use duet_core::{
    host_bootstrap, load_config_from_path, transport::codec, BoardMirror, ConfigOverrides,
    Difficulty, DuetConfig, ListenResult, RandomBoardGenerator, RoomName, Session,
};

/// Duet - two-player puzzle sessions over TCP
#[derive(Parser, Debug)]
#[command(name = "duet")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, env = "DUET_CONFIG", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "DUET_LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// Connection timeout in milliseconds
    #[arg(long, value_name = "MS", global = true)]
    connect_timeout: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Host a session and wait for one player to join
    Host {
        /// Puzzle difficulty (easy, medium, hard)
        #[arg(short = 'd', long)]
        difficulty: Option<Difficulty>,

        /// Address to listen on
        #[arg(short = 'b', long, value_name = "ADDR")]
        bind: Option<IpAddr>,
    },

    /// Join a hosted session
    Join {
        /// Host address
        address: IpAddr,

        /// Host port
        port: u16,
    },

    /// Decode a single wire record and print it
    Codec {
        /// The record, without its trailing newline
        line: String,
    },
}

/// Initialize logging with the specified level
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("duet={level},duet_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_config(args: &Args, overrides: ConfigOverrides) -> Result<DuetConfig> {
    let path = args.config.clone().or_else(duet_core::default_config_path);
    let mut config = load_config_from_path(path).context("Failed to load configuration")?;

    let overrides = match args.connect_timeout {
        Some(ms) => overrides.with_connect_timeout_ms(ms),
        None => overrides,
    };
    overrides
        .apply(&mut config)
        .context("Invalid command-line option")?;

    info!(source = %config.source(), "Configuration resolved");
    Ok(config)
}

/// What the host prints for the other player
///
/// The room name is only a label to read out; joining needs the address and
/// port.
fn hosting_banner(room: &RoomName, listen: ListenResult, difficulty: Difficulty) -> String {
    format!(
        "Hosting {room} on {listen} ({difficulty} difficulty)\n\
         Join with: duet join <this-host-address> {}",
        listen.port()
    )
}

async fn host(config: DuetConfig) -> Result<()> {
    let session = Session::new(config.transport.clone());
    let listen = session
        .start_as_host()
        .await
        .context("Failed to start hosting")?;

    let room = RoomName::generate(&config.room_prefix);
    println!("{}", hosting_banner(&room, listen, config.difficulty));
    println!("Waiting for a player to join...");

    let incoming = session.observe_incoming();
    let generator = Arc::new(RandomBoardGenerator::new());
    let bootstrap = host_bootstrap(&session, generator, config.difficulty);
    let board = tokio::select! {
        result = bootstrap => result.context("Game did not start")?,
        _ = tokio::signal::ctrl_c() => {
            session.close();
            return Ok(());
        }
    };

    if let Some(peer) = session.peer_addr() {
        println!("Player joined from {peer}");
    }
    println!("{}", board.grid());

    peer::run(&session, board, incoming).await
}

async fn join(config: DuetConfig, address: IpAddr, port: u16) -> Result<()> {
    let session = Session::new(config.transport);
    // Subscribe before connecting so the host's StartGame is not missed
    let incoming = session.observe_incoming();
    session
        .join_as_client(address, port)
        .await
        .with_context(|| format!("Failed to join {address}:{port}"))?;

    println!("Joined session at {address}:{port}; waiting for the board...");
    peer::run(&session, BoardMirror::new(), incoming).await
}

fn decode_record(line: &str) -> Result<()> {
    let message = codec::decode(line).context("Record does not decode")?;
    println!("{}", serde_json::to_string_pretty(&message)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);
    info!(version = env!("CARGO_PKG_VERSION"), "duet starting");

    match &args.command {
        Command::Host { difficulty, bind } => {
            let mut overrides = ConfigOverrides::new();
            if let Some(d) = difficulty {
                overrides = overrides.with_difficulty(*d);
            }
            if let Some(addr) = bind {
                overrides = overrides.with_bind_address(*addr);
            }
            let config = resolve_config(&args, overrides)?;
            host(config).await
        }
        Command::Join { address, port } => {
            let config = resolve_config(&args, ConfigOverrides::new())?;
            join(config, *address, *port).await
        }
        Command::Codec { line } => decode_record(line),
    }
}
