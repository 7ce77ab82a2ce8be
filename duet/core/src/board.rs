//! Board Model
//!
//! [`Grid`] is the validated 81-cell board carried by `StartGame`.
//! [`BoardMirror`] is each peer's local copy of the shared board and applies
//! incoming [`GameMessage`]s to it.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::messages::{FieldError, GameMessage};

/// Side length of the board
pub const BOARD_SIZE: usize = 9;

/// Number of cells on the board
pub const CELL_COUNT: usize = BOARD_SIZE * BOARD_SIZE;

/// Largest digit a cell can hold (0 = empty)
pub const MAX_DIGIT: u8 = 9;

/// An 81-cell board in row-major order, every cell in `0..=9`
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Grid([u8; CELL_COUNT]);

impl Grid {
    /// A board with every cell empty
    #[must_use]
    pub const fn empty() -> Self {
        Self([0; CELL_COUNT])
    }

    /// Build a grid from row-major cells
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::BoardLength`] unless exactly 81 cells are given,
    /// or [`FieldError::BoardCell`] for a value above 9.
    pub fn from_cells<I>(cells: I) -> Result<Self, FieldError>
    where
        I: IntoIterator<Item = u8>,
    {
        let cells: Vec<u8> = cells.into_iter().collect();
        if cells.len() != CELL_COUNT {
            return Err(FieldError::BoardLength(cells.len()));
        }
        if let Some((index, &value)) = cells.iter().enumerate().find(|(_, v)| **v > MAX_DIGIT) {
            return Err(FieldError::BoardCell {
                index,
                value: value.into(),
            });
        }

        let mut grid = [0u8; CELL_COUNT];
        grid.copy_from_slice(&cells);
        Ok(Self(grid))
    }

    /// Build a grid from nine rows
    pub fn from_rows(rows: [[u8; BOARD_SIZE]; BOARD_SIZE]) -> Result<Self, FieldError> {
        Self::from_cells(rows.into_iter().flatten())
    }

    /// Value at (`row`, `col`)
    ///
    /// # Panics
    ///
    /// Panics if `row` or `col` is 9 or more.
    #[must_use]
    pub fn cell(&self, row: usize, col: usize) -> u8 {
        assert!(row < BOARD_SIZE && col < BOARD_SIZE, "cell ({row}, {col}) off the board");
        self.0[row * BOARD_SIZE + col]
    }

    /// Row-major cells
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Iterate rows
    pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
        self.0.chunks(BOARD_SIZE)
    }

    /// Count of non-empty cells
    #[must_use]
    pub fn filled(&self) -> usize {
        self.0.iter().filter(|v| **v != 0).count()
    }

    fn set(&mut self, row: usize, col: usize, value: u8) {
        self.0[row * BOARD_SIZE + col] = value;
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.rows()).finish()
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (r, row) in self.rows().enumerate() {
            if r > 0 && r % 3 == 0 {
                writeln!(f, "------+-------+------")?;
            }
            for (c, v) in row.iter().enumerate() {
                if c > 0 && c % 3 == 0 {
                    f.write_str("| ")?;
                }
                match v {
                    0 => f.write_str(". ")?,
                    d => write!(f, "{d} ")?,
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl Serialize for Grid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter())
    }
}

/// What [`BoardMirror::apply`] did with a message
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Applied {
    /// First `StartGame`: board initialized
    Initialized,
    /// Cell value changed
    CellUpdated {
        /// Row index
        row: u8,
        /// Column index
        col: u8,
        /// New value (0 = cleared)
        number: u8,
    },
    /// Selection cursor moved
    SelectionMoved {
        /// Row index
        row: u8,
        /// Column index
        col: u8,
    },
    /// Message had no effect
    Ignored(IgnoreReason),
}

/// Why a message was not applied
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IgnoreReason {
    /// `StartGame` after the board was already initialized
    DuplicateStart,
    /// Cell action before any `StartGame`
    NotStarted,
    /// `FillCell` on a given (starting) cell
    GivenCell,
    /// Message fields out of range
    Invalid,
}

/// A peer's local copy of the shared board
///
/// The first `StartGame` seeds the board; its non-zero cells become givens
/// that `FillCell` can never overwrite.
#[derive(Clone, Debug, Default)]
pub struct BoardMirror {
    givens: Option<Grid>,
    current: Grid,
    selection: Option<(u8, u8)>,
}

impl BoardMirror {
    /// An uninitialized mirror
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a `StartGame` has been applied
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.givens.is_some()
    }

    /// Current board contents
    #[must_use]
    pub fn grid(&self) -> &Grid {
        &self.current
    }

    /// Givens from the initial board, if started
    #[must_use]
    pub fn givens(&self) -> Option<&Grid> {
        self.givens.as_ref()
    }

    /// Last selected cell, cleared on initialization
    #[must_use]
    pub fn selection(&self) -> Option<(u8, u8)> {
        self.selection
    }

    /// Whether (`row`, `col`) holds a given digit
    #[must_use]
    pub fn is_given(&self, row: u8, col: u8) -> bool {
        let (row, col) = (usize::from(row), usize::from(col));
        row < BOARD_SIZE
            && col < BOARD_SIZE
            && self.givens.as_ref().is_some_and(|g| g.cell(row, col) != 0)
    }

    /// Apply a message to the local board
    pub fn apply(&mut self, msg: &GameMessage) -> Applied {
        if msg.validate().is_err() {
            return Applied::Ignored(IgnoreReason::Invalid);
        }

        match msg {
            GameMessage::StartGame { board } => {
                if self.is_started() {
                    tracing::warn!("Ignoring StartGame: board already initialized");
                    return Applied::Ignored(IgnoreReason::DuplicateStart);
                }
                self.givens = Some(board.clone());
                self.current = board.clone();
                self.selection = None;
                tracing::debug!(givens = board.filled(), "Board initialized");
                Applied::Initialized
            }
            &GameMessage::FillCell { row, col, number } => {
                if !self.is_started() {
                    return Applied::Ignored(IgnoreReason::NotStarted);
                }
                if self.is_given(row, col) {
                    return Applied::Ignored(IgnoreReason::GivenCell);
                }
                self.current.set(row.into(), col.into(), number);
                Applied::CellUpdated { row, col, number }
            }
            &GameMessage::SelectCell { row, col } => {
                if !self.is_started() {
                    return Applied::Ignored(IgnoreReason::NotStarted);
                }
                self.selection = Some((row, col));
                Applied::SelectionMoved { row, col }
            }
        }
    }
}
