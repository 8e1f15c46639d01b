/// Puzzle data model: themes, difficulty and the move under study

pub mod explain;
pub mod extraction;
pub mod themes;

use chess::{Board, ChessMove, Color};
use serde::{Deserialize, Serialize};

use crate::board_utils::{board_from_fen, parse_uci_move};

/// Tactical theme of a puzzle's key move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    Checkmate,
    Check,
    /// The key move captures a queen
    QueenSacrifice,
    Capturing,
    Fork,
    Pin,
    DiscoveredAttack,
    Tactic,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Checkmate => "checkmate",
            Theme::Check => "check",
            Theme::QueenSacrifice => "queen_sacrifice",
            Theme::Capturing => "capturing",
            Theme::Fork => "fork",
            Theme::Pin => "pin",
            Theme::DiscoveredAttack => "discovered_attack",
            Theme::Tactic => "tactic",
        }
    }
}

/// Difficulty bucket derived from the best/second-best margin.
/// A larger margin means the key move stands out more, so the puzzle is easier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn from_margin(margin: i32) -> Self {
        if margin > 500 {
            Difficulty::Easy
        } else if margin > 300 {
            Difficulty::Medium
        } else {
            Difficulty::Hard
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

/// The key move of a puzzle together with the boards around it
#[derive(Debug, Clone)]
pub struct PuzzleMove {
    /// Board state BEFORE the key move
    pub board_before: Board,
    /// Board state AFTER the key move
    pub board_after: Board,
    pub chess_move: ChessMove,
    /// Side playing the key move (the solver)
    pub pov: Color,
}

impl PuzzleMove {
    pub fn new(board_before: Board, chess_move: ChessMove) -> Self {
        Self {
            board_after: board_before.make_move_new(chess_move),
            pov: board_before.side_to_move(),
            board_before,
            chess_move,
        }
    }

    /// Build from a FEN and a UCI move; None when either is invalid or the
    /// move is illegal in the position
    pub fn from_uci(fen: &str, uci: &str) -> Option<Self> {
        let board = board_from_fen(fen)?;
        let chess_move = parse_uci_move(&board, uci)?;
        Some(Self::new(board, chess_move))
    }
}
