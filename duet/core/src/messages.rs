//! Game Messages
//!
//! The closed set of actions exchanged between the two peers of a session.
//! Every message is one of three variants and carries its discriminant on the
//! wire (`action_type`), so the receiving side can always tell which field
//! schema applies.
//!
//! | Variant      | Fields                          | Sent by        |
//! |--------------|---------------------------------|----------------|
//! | `FillCell`   | `row`, `col`, `number` (0 = clear) | either peer |
//! | `SelectCell` | `row`, `col`                    | either peer    |
//! | `StartGame`  | `board` (81 cells, row-major)   | host, once     |

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::board::{Grid, BOARD_SIZE, MAX_DIGIT};

/// Largest valid row or column index
pub const MAX_INDEX: u8 = (BOARD_SIZE - 1) as u8;

/// A single synchronized game action
///
/// Serializes as an internally tagged JSON object keyed by `action_type`.
/// Decoding is manual (see [`crate::transport::codec`]) so that an unknown
/// discriminant can never fall through to a default variant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "action_type")]
pub enum GameMessage {
    /// Fill (or clear, with `number == 0`) a single cell
    FillCell {
        /// Row index, 0..=8
        row: u8,
        /// Column index, 0..=8
        col: u8,
        /// Digit 1..=9, or 0 to clear
        number: u8,
    },

    /// Move the sender's selection cursor
    SelectCell {
        /// Row index, 0..=8
        row: u8,
        /// Column index, 0..=8
        col: u8,
    },

    /// Initial puzzle, sent by the host right after the peer connects
    StartGame {
        /// Row-major board; non-zero cells are givens
        board: Grid,
    },
}

/// Discriminant of a [`GameMessage`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// [`GameMessage::FillCell`]
    FillCell,
    /// [`GameMessage::SelectCell`]
    SelectCell,
    /// [`GameMessage::StartGame`]
    StartGame,
}

impl MessageKind {
    /// Wire name of this discriminant
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FillCell => "FillCell",
            Self::SelectCell => "SelectCell",
            Self::StartGame => "StartGame",
        }
    }

    /// Look up a discriminant by its wire name
    #[must_use]
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "FillCell" => Some(Self::FillCell),
            "SelectCell" => Some(Self::SelectCell),
            "StartGame" => Some(Self::StartGame),
            _ => None,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A field value outside its declared range
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum FieldError {
    /// Scalar field outside `0..=max`
    #[error("field `{field}` out of range: {value} (expected 0..={max})")]
    OutOfRange {
        /// Field name as it appears on the wire
        field: &'static str,
        /// Offending value
        value: i64,
        /// Inclusive upper bound
        max: u8,
    },

    /// Board does not have exactly 81 cells
    #[error("board must have 81 cells, got {0}")]
    BoardLength(usize),

    /// A board cell outside 0..=9
    #[error("board cell {index} out of range: {value} (expected 0..=9)")]
    BoardCell {
        /// Row-major cell index
        index: usize,
        /// Offending value
        value: i64,
    },
}

/// Check that `value` lies in `0..=max` and narrow it
pub(crate) fn check_range(field: &'static str, value: i64, max: u8) -> Result<u8, FieldError> {
    match u8::try_from(value) {
        Ok(v) if v <= max => Ok(v),
        _ => Err(FieldError::OutOfRange { field, value, max }),
    }
}

impl GameMessage {
    /// Build a validated `FillCell`
    pub fn fill_cell(row: u8, col: u8, number: u8) -> Result<Self, FieldError> {
        let msg = Self::FillCell { row, col, number };
        msg.validate()?;
        Ok(msg)
    }

    /// Build a validated `SelectCell`
    pub fn select_cell(row: u8, col: u8) -> Result<Self, FieldError> {
        let msg = Self::SelectCell { row, col };
        msg.validate()?;
        Ok(msg)
    }

    /// Build a `StartGame` (a [`Grid`] is always valid)
    #[must_use]
    pub fn start_game(board: Grid) -> Self {
        Self::StartGame { board }
    }

    /// Discriminant of this message
    #[must_use]
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::FillCell { .. } => MessageKind::FillCell,
            Self::SelectCell { .. } => MessageKind::SelectCell,
            Self::StartGame { .. } => MessageKind::StartGame,
        }
    }

    /// Check every field against its declared range
    pub fn validate(&self) -> Result<(), FieldError> {
        match *self {
            Self::FillCell { row, col, number } => {
                check_range("row", row.into(), MAX_INDEX)?;
                check_range("col", col.into(), MAX_INDEX)?;
                check_range("number", number.into(), MAX_DIGIT)?;
            }
            Self::SelectCell { row, col } => {
                check_range("row", row.into(), MAX_INDEX)?;
                check_range("col", col.into(), MAX_INDEX)?;
            }
            // Grid enforces its own invariant at construction
            Self::StartGame { .. } => {}
        }
        Ok(())
    }
}
