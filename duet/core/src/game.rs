//! Game Coordination
//!
//! Puzzle generation and the host's start-of-game handshake.
//!
//! The host does not generate a board until the peer is attached, then sends
//! exactly one `StartGame`. The joiner seeds its [`BoardMirror`] from that
//! message and ignores any later one.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::board::{BoardMirror, Grid, BOARD_SIZE, CELL_COUNT};
use crate::messages::GameMessage;
use crate::session::{Role, Session};
use crate::state::ConnectionState;

/// Puzzle difficulty
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    /// 35 empty cells
    Easy,
    /// 45 empty cells
    #[default]
    Medium,
    /// 50 empty cells
    Hard,
}

impl Difficulty {
    /// Number of cells the generator tries to clear
    #[must_use]
    pub const fn holes(self) -> usize {
        match self {
            Self::Easy => 35,
            Self::Medium => 45,
            Self::Hard => 50,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Easy => write!(f, "easy"),
            Self::Medium => write!(f, "medium"),
            Self::Hard => write!(f, "hard"),
        }
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "easy" | "1" => Ok(Self::Easy),
            "medium" | "2" => Ok(Self::Medium),
            "hard" | "3" => Ok(Self::Hard),
            other => Err(format!(
                "unknown difficulty '{other}' (expected easy, medium or hard)"
            )),
        }
    }
}

/// Source of starting boards
pub trait BoardGenerator: Send + Sync {
    /// Produce a puzzle; non-zero cells are givens
    fn generate(&self, difficulty: Difficulty) -> Grid;
}

/// Always returns the same board, whatever the difficulty
#[derive(Clone, Debug)]
pub struct FixedBoardGenerator(Grid);

impl FixedBoardGenerator {
    /// Serve `grid` for every request
    #[must_use]
    pub fn new(grid: Grid) -> Self {
        Self(grid)
    }
}

impl BoardGenerator for FixedBoardGenerator {
    fn generate(&self, _difficulty: Difficulty) -> Grid {
        self.0.clone()
    }
}

/// Randomized generator whose puzzles have a unique solution
///
/// Fills a complete solution by shuffled backtracking, then clears cells in
/// random order, keeping a cell whenever clearing it would admit a second
/// solution. At high hole counts fewer cells than requested may be cleared.
pub struct RandomBoardGenerator {
    rng: Mutex<StdRng>,
}

impl RandomBoardGenerator {
    /// Seeded from OS entropy
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic output for a given seed
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for RandomBoardGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RandomBoardGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RandomBoardGenerator").finish_non_exhaustive()
    }
}

impl BoardGenerator for RandomBoardGenerator {
    fn generate(&self, difficulty: Difficulty) -> Grid {
        let mut rng = self.rng.lock();

        let mut cells = [0u8; CELL_COUNT];
        fill(&mut cells, &mut *rng);

        let mut order: Vec<usize> = (0..CELL_COUNT).collect();
        order.shuffle(&mut *rng);

        let mut dug = 0;
        for index in order {
            if dug >= difficulty.holes() {
                break;
            }
            let kept = cells[index];
            cells[index] = 0;
            if count_solutions(&mut cells, 2) == 1 {
                dug += 1;
            } else {
                cells[index] = kept;
            }
        }

        tracing::debug!(%difficulty, holes = dug, "Generated puzzle");
        // Every cell is 0..=9 by construction
        Grid::from_cells(cells).unwrap_or_default()
    }
}

fn candidate_ok(cells: &[u8; CELL_COUNT], index: usize, digit: u8) -> bool {
    let (row, col) = (index / BOARD_SIZE, index % BOARD_SIZE);
    let (box_row, box_col) = (row - row % 3, col - col % 3);
    for i in 0..BOARD_SIZE {
        if cells[row * BOARD_SIZE + i] == digit || cells[i * BOARD_SIZE + col] == digit {
            return false;
        }
        let (r, c) = (box_row + i / 3, box_col + i % 3);
        if cells[r * BOARD_SIZE + c] == digit {
            return false;
        }
    }
    true
}

fn fill<R: rand::Rng>(cells: &mut [u8; CELL_COUNT], rng: &mut R) -> bool {
    let Some(index) = cells.iter().position(|v| *v == 0) else {
        return true;
    };
    let mut digits: Vec<u8> = (1..=9).collect();
    digits.shuffle(rng);
    for digit in digits {
        if candidate_ok(cells, index, digit) {
            cells[index] = digit;
            if fill(cells, rng) {
                return true;
            }
            cells[index] = 0;
        }
    }
    false
}

/// Number of solutions, counting stops at `limit`
fn count_solutions(cells: &mut [u8; CELL_COUNT], limit: usize) -> usize {
    let Some(index) = cells.iter().position(|v| *v == 0) else {
        return 1;
    };
    let mut found = 0;
    for digit in 1..=9 {
        if candidate_ok(cells, index, digit) {
            cells[index] = digit;
            found += count_solutions(cells, limit - found);
            cells[index] = 0;
            if found >= limit {
                break;
            }
        }
    }
    found
}

/// Errors from the start-of-game handshake
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GameError {
    /// Only the host generates and sends the board
    #[error("only the host can start the game")]
    NotHost,

    /// The session ended before the board could be sent
    #[error("session ended before the game started")]
    SessionEnded,

    /// This session already sent (or is sending) its starting board
    #[error("game already started on this session")]
    AlreadyStarted,

    /// The board generator panicked
    #[error("board generation failed: {0}")]
    GeneratorFailed(String),
}

/// Wait for the peer, then generate and send the starting board
///
/// Call right after [`Session::start_as_host`]; only the first call on a
/// session gets to send. Generation runs on the blocking pool. Returns the
/// host's own mirror, already seeded with the board that was sent.
///
/// # Errors
///
/// [`GameError::NotHost`] unless the session is hosting,
/// [`GameError::AlreadyStarted`] on any call after the first,
/// [`GameError::SessionEnded`] if it disconnects before or during the send,
/// [`GameError::GeneratorFailed`] if the generator panics.
pub async fn host_bootstrap<G>(
    session: &Session,
    generator: Arc<G>,
    difficulty: Difficulty,
) -> Result<BoardMirror, GameError>
where
    G: BoardGenerator + ?Sized + 'static,
{
    if session.role() != Some(Role::Host) {
        return Err(GameError::NotHost);
    }
    if !session.claim_start() {
        return Err(GameError::AlreadyStarted);
    }
    if !session.wait_for_state(ConnectionState::Connected).await {
        return Err(GameError::SessionEnded);
    }

    let board = tokio::task::spawn_blocking(move || generator.generate(difficulty))
        .await
        .map_err(|e| GameError::GeneratorFailed(e.to_string()))?;
    let start = GameMessage::start_game(board);
    if !session.send(&start).await {
        return Err(GameError::SessionEnded);
    }
    tracing::info!(%difficulty, "Sent starting board");

    let mut mirror = BoardMirror::new();
    mirror.apply(&start);
    Ok(mirror)
}
