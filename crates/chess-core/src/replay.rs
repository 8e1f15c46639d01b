//! Replays SAN move lists with shakmaty, producing the position before every
//! ply plus UCI/SAN renderings used by the analysis pipeline.

use serde::{Deserialize, Serialize};
use shakmaty::{
    fen::Fen, san::San, uci::UciMove, CastlingMode, Chess, Color, EnPassantMode, Move, Position,
};
use thiserror::Error;

use crate::game_data::Side;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PgnError {
    #[error("Invalid FEN '{0}'")]
    InvalidFen(String),

    #[error("Illegal or unparsable move '{san}' at ply {ply}")]
    IllegalMove { ply: usize, san: String },
}

/// One half-move of a replayed game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayedPly {
    /// 1-based ply index
    pub ply: usize,
    /// Full-move number as printed in PGN
    pub move_number: u32,
    pub side: Side,
    pub san: String,
    pub uci: String,
    pub fen_before: String,
}

/// How the position after the last ply stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalState {
    Ongoing,
    Checkmate,
    /// Stalemate: no legal moves, not in check
    NoLegalMoves,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayedGame {
    pub start_fen: String,
    pub plies: Vec<ReplayedPly>,
    pub final_fen: String,
    pub final_state: FinalState,
    pub final_side: Side,
}

fn side_of(color: Color) -> Side {
    match color {
        Color::White => Side::White,
        Color::Black => Side::Black,
    }
}

/// Parse a FEN into a shakmaty position.
pub fn position_from_fen(fen: &str) -> Result<Chess, PgnError> {
    let parsed: Fen = fen
        .parse()
        .map_err(|_| PgnError::InvalidFen(fen.to_string()))?;
    parsed
        .into_position(CastlingMode::Standard)
        .map_err(|_| PgnError::InvalidFen(fen.to_string()))
}

pub fn fen_of(pos: &Chess) -> String {
    Fen::from_position(pos, EnPassantMode::Legal).to_string()
}

fn uci_of(mv: &Move) -> String {
    mv.clone().to_uci(CastlingMode::Standard).to_string()
}

/// SAN with check/mate suffix, computed by playing the move on a copy.
fn san_plus(pos: &Chess, mv: &Move) -> String {
    let mut san = San::from_move(pos, mv.clone()).to_string();
    let mut after = pos.clone();
    after.play_unchecked(mv.clone());
    if after.is_checkmate() {
        san.push('#');
    } else if after.is_check() {
        san.push('+');
    }
    san
}

fn final_state_of(pos: &Chess) -> FinalState {
    if pos.is_checkmate() {
        FinalState::Checkmate
    } else if pos.legal_moves().is_empty() {
        FinalState::NoLegalMoves
    } else {
        FinalState::Ongoing
    }
}

/// Replay SAN moves from the standard start (or `start_fen`).
pub fn replay(moves: &[String], start_fen: Option<&str>) -> Result<ReplayedGame, PgnError> {
    let mut pos = match start_fen {
        Some(fen) => position_from_fen(fen)?,
        None => Chess::default(),
    };
    let start = fen_of(&pos);
    let mut plies = Vec::with_capacity(moves.len());

    for (i, san_str) in moves.iter().enumerate() {
        let ply = i + 1;
        let san: San = san_str
            .trim_end_matches(['+', '#', '!', '?'])
            .parse()
            .map_err(|_| PgnError::IllegalMove {
                ply,
                san: san_str.clone(),
            })?;
        let mv = san.to_move(&pos).map_err(|_| PgnError::IllegalMove {
            ply,
            san: san_str.clone(),
        })?;

        plies.push(ReplayedPly {
            ply,
            move_number: pos.fullmoves().get(),
            side: side_of(pos.turn()),
            san: san_plus(&pos, &mv),
            uci: uci_of(&mv),
            fen_before: fen_of(&pos),
        });
        pos.play_unchecked(mv);
    }

    Ok(ReplayedGame {
        start_fen: start,
        plies,
        final_fen: fen_of(&pos),
        final_state: final_state_of(&pos),
        final_side: side_of(pos.turn()),
    })
}

/// Render a UCI move as SAN (with check suffix) in the given position.
pub fn uci_to_san(fen: &str, uci: &str) -> Option<String> {
    let pos = position_from_fen(fen).ok()?;
    let uci_move: UciMove = uci.parse().ok()?;
    let mv = uci_move.to_move(&pos).ok()?;
    Some(san_plus(&pos, &mv))
}

/// Render a UCI line as SAN, stopping at the first move that is not legal.
pub fn uci_line_to_san(fen: &str, line: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    let Ok(mut pos) = position_from_fen(fen) else {
        return out;
    };
    for uci in line {
        let Some(mv) = uci
            .parse::<UciMove>()
            .ok()
            .and_then(|u| u.to_move(&pos).ok())
        else {
            break;
        };
        out.push(san_plus(&pos, &mv));
        pos.play_unchecked(mv);
    }
    out
}

/// FEN of the position reached by playing `line` (UCI) from `fen`.
/// Stops at the first illegal move.
pub fn play_uci_line(fen: &str, line: &[String]) -> Option<String> {
    let mut pos = position_from_fen(fen).ok()?;
    for uci in line {
        let mv = uci.parse::<UciMove>().ok()?.to_move(&pos).ok()?;
        pos.play_unchecked(mv);
    }
    Some(fen_of(&pos))
}

/// Whether playing `line` from `fen` ends in checkmate.
pub fn line_ends_in_mate(fen: &str, line: &[String]) -> bool {
    play_uci_line(fen, line)
        .and_then(|f| position_from_fen(&f).ok())
        .map(|p| p.is_checkmate())
        .unwrap_or(false)
}

/// Number of legal moves in a position (0 for an unparsable FEN).
pub fn legal_move_count(fen: &str) -> usize {
    position_from_fen(fen)
        .map(|p| p.legal_moves().len())
        .unwrap_or(0)
}
