/// Theme classification: an ordered chain of structural checks on the
/// position after the key move. Each check assumes the earlier ones failed.

use chess::{BoardStatus, Piece};

use crate::board_utils::captured_piece;
use crate::puzzle::{PuzzleMove, Theme};
use crate::tactics::{attacks, line_geometry, pins};

pub fn classify_theme(mv: &PuzzleMove) -> Theme {
    if mv.board_after.status() == BoardStatus::Checkmate {
        return Theme::Checkmate;
    }
    if *mv.board_after.checkers() != chess::EMPTY {
        return Theme::Check;
    }

    match captured_piece(&mv.board_before, mv.chess_move) {
        Some(Piece::Queen) => return Theme::QueenSacrifice,
        Some(_) => return Theme::Capturing,
        None => {}
    }

    if attacks::fork(mv) {
        return Theme::Fork;
    }
    if pins::pin(mv) {
        return Theme::Pin;
    }
    if line_geometry::discovered_attack(mv) {
        return Theme::DiscoveredAttack;
    }
    Theme::Tactic
}
