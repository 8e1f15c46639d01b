/// Pin detector

use crate::board_utils::{
    attacked_enemy_pieces, is_ray_piece, next_piece_beyond, piece_value, slides_towards,
};
use crate::puzzle::PuzzleMove;

/// Pin: the moved slider attacks an enemy piece with a more valuable enemy
/// piece (or the king) standing directly behind it on the same line
pub fn pin(mv: &PuzzleMove) -> bool {
    let board = &mv.board_after;
    let to_sq = mv.chess_move.get_dest();
    let moved = match board.piece_on(to_sq) {
        Some(p) if is_ray_piece(p) => p,
        _ => return false,
    };

    for (front, front_sq) in attacked_enemy_pieces(board, to_sq, mv.pov) {
        if !slides_towards(moved, to_sq, front_sq) {
            continue;
        }
        let Some(back_sq) = next_piece_beyond(board, to_sq, front_sq) else {
            continue;
        };
        if board.color_on(back_sq) == Some(mv.pov) {
            continue;
        }
        if let Some(back) = board.piece_on(back_sq) {
            if piece_value(back) > piece_value(front) {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bishop_pins_knight_to_king() {
        let mv = PuzzleMove::from_uci("4k3/8/2n5/8/8/3B4/8/4K3 w - - 0 1", "d3b5").unwrap();
        assert!(pin(&mv));
    }

    #[test]
    fn test_rook_pins_bishop_to_queen() {
        let mv = PuzzleMove::from_uci("3q3k/8/3b4/8/8/8/8/R3K3 w - - 0 1", "a1d1").unwrap();
        assert!(pin(&mv));
    }

    #[test]
    fn test_cheaper_piece_behind_is_not_a_pin() {
        // Queen in front, knight behind: a skewer shape, not a pin
        let mv = PuzzleMove::from_uci("3n3k/8/3q4/8/8/8/8/R3K3 w - - 0 1", "a1d1").unwrap();
        assert!(!pin(&mv));
    }

    #[test]
    fn test_knight_cannot_pin() {
        let mv = PuzzleMove::from_uci("r3q2k/8/8/1N6/8/8/8/7K w - - 0 1", "b5c7").unwrap();
        assert!(!pin(&mv));
    }
}
