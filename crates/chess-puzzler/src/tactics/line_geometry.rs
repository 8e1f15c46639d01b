/// Line geometry detectors: discovered attack

use chess::{BitBoard, Piece, EMPTY};

use crate::board_utils::{is_ray_piece, next_piece_beyond, slides_towards};
use crate::puzzle::PuzzleMove;

/// Discovered check: a piece other than the one that moved gives check
pub fn discovered_check(mv: &PuzzleMove) -> bool {
    let checkers = *mv.board_after.checkers();
    checkers != EMPTY && (checkers & BitBoard::from_square(mv.chess_move.get_dest())) == EMPTY
}

/// Discovered attack (includes discovered check): moving a piece off a line
/// opens a friendly slider onto an enemy piece worth more than a pawn
pub fn discovered_attack(mv: &PuzzleMove) -> bool {
    if discovered_check(mv) {
        return true;
    }

    let board = &mv.board_after;
    let from_sq = mv.chess_move.get_source();
    let to_sq = mv.chess_move.get_dest();
    let occupied = *board.combined();

    for slider_sq in *board.color_combined(mv.pov) {
        if slider_sq == to_sq {
            continue;
        }
        let slider = match board.piece_on(slider_sq) {
            Some(p) if is_ray_piece(p) => p,
            _ => continue,
        };
        if !slides_towards(slider, slider_sq, from_sq) {
            continue;
        }
        // The vacated square must have been the only blocker
        if (chess::between(slider_sq, from_sq) & occupied) != EMPTY {
            continue;
        }
        let Some(target_sq) = next_piece_beyond(board, slider_sq, from_sq) else {
            continue;
        };
        if board.color_on(target_sq) == Some(mv.pov) {
            continue;
        }
        if matches!(board.piece_on(target_sq), Some(p) if p != Piece::Pawn) {
            return true;
        }
    }
    false
}
