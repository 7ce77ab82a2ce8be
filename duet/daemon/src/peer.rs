//! Interactive Peer Loop
//!
//! Multiplexes three sources until the session ends:
//!
//! ```text
//!   stdin commands ──► local BoardMirror ──► Session::send
//!   observe_incoming ─► local BoardMirror ──► stdout
//!   observe_state ────► exit on Disconnected
//! ```
//!
//! Local moves are applied before they are sent, and only moves the board
//! accepts go on the wire, so a given cell is never overwritten on either
//! side.

use anyhow::Result;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};

use duet_core::{
    Applied, BoardMirror, ConnectionState, GameMessage, IgnoreReason, Session, Subscription,
};

/// A line typed by the local player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PeerCommand {
    Fill { row: u8, col: u8, number: u8 },
    Select { row: u8, col: u8 },
    Board,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum CommandError {
    #[error("empty command")]
    Empty,

    #[error("unknown command '{0}' (try fill, select, board, quit)")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("not a number: '{0}'")]
    NotANumber(String),
}

fn number(token: &str) -> Result<u8, CommandError> {
    token
        .parse()
        .map_err(|_| CommandError::NotANumber(token.to_string()))
}

/// Parse one stdin line
pub(crate) fn parse_command(line: &str) -> Result<PeerCommand, CommandError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let Some((&verb, rest)) = tokens.split_first() else {
        return Err(CommandError::Empty);
    };

    match (verb.to_lowercase().as_str(), rest) {
        ("fill" | "f", [row, col, n]) => Ok(PeerCommand::Fill {
            row: number(row)?,
            col: number(col)?,
            number: number(n)?,
        }),
        ("fill" | "f", _) => Err(CommandError::Usage("fill <row> <col> <number>")),
        ("select" | "s", [row, col]) => Ok(PeerCommand::Select {
            row: number(row)?,
            col: number(col)?,
        }),
        ("select" | "s", _) => Err(CommandError::Usage("select <row> <col>")),
        ("board" | "b", []) => Ok(PeerCommand::Board),
        ("quit" | "q" | "exit", []) => Ok(PeerCommand::Quit),
        (other, _) => Err(CommandError::Unknown(other.to_string())),
    }
}

fn describe(applied: &Applied) -> Option<String> {
    match applied {
        Applied::Initialized => None,
        Applied::CellUpdated { row, col, number: 0 } => Some(format!("cleared ({row}, {col})")),
        Applied::CellUpdated { row, col, number } => Some(format!("filled ({row}, {col}) = {number}")),
        Applied::SelectionMoved { row, col } => Some(format!("selected ({row}, {col})")),
        Applied::Ignored(reason) => Some(format!("ignored: {}", ignore_text(*reason))),
    }
}

fn ignore_text(reason: IgnoreReason) -> &'static str {
    match reason {
        IgnoreReason::DuplicateStart => "board already started",
        IgnoreReason::NotStarted => "board not ready yet",
        IgnoreReason::GivenCell => "that cell is part of the puzzle",
        IgnoreReason::Invalid => "row, col or number out of range",
    }
}

/// Handle one local command; `false` means quit
async fn handle_line(session: &Session, board: &mut BoardMirror, line: &str) -> bool {
    let command = match parse_command(line) {
        Ok(command) => command,
        Err(CommandError::Empty) => return true,
        Err(e) => {
            println!("{e}");
            return true;
        }
    };

    let message = match command {
        PeerCommand::Quit => return false,
        PeerCommand::Board => {
            println!("{}", board.grid());
            return true;
        }
        PeerCommand::Fill { row, col, number } => GameMessage::fill_cell(row, col, number),
        PeerCommand::Select { row, col } => GameMessage::select_cell(row, col),
    };

    let message = match message {
        Ok(message) => message,
        Err(e) => {
            println!("{e}");
            return true;
        }
    };

    let applied = board.apply(&message);
    if let Some(text) = describe(&applied) {
        println!("you {text}");
    }
    if !matches!(applied, Applied::Ignored(_)) {
        session.send(&message).await;
    }
    true
}

fn report(board: &mut BoardMirror, message: &GameMessage) {
    let applied = board.apply(message);
    match applied {
        Applied::Initialized => println!("Game started:\n{}", board.grid()),
        ref other => {
            if let Some(text) = describe(other) {
                println!("peer {text}");
            }
        }
    }
}

/// Play until the session ends, stdin closes, or the user quits
pub(crate) async fn run(
    session: &Session,
    mut board: BoardMirror,
    mut incoming: Subscription<GameMessage>,
) -> Result<()> {
    let mut states = session.observe_state();
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = stdin.next_line() => match line? {
                Some(line) => {
                    if !handle_line(session, &mut board, &line).await {
                        session.close();
                        break;
                    }
                }
                None => {
                    session.close();
                    break;
                }
            },
            message = incoming.recv() => match message {
                Some(message) => report(&mut board, &message),
                None => break,
            },
            state = states.recv() => {
                if matches!(state, None | Some(ConnectionState::Disconnected)) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                session.close();
                break;
            }
        }
    }

    match session.close_reason() {
        Some(reason) => println!("Session ended: {reason}"),
        None => println!("Session ended"),
    }
    Ok(())
}
