/// Attack-based detectors: fork

use crate::board_utils::{attacked_enemy_pieces, is_major_target};
use crate::puzzle::PuzzleMove;

/// Fork: the piece on the destination square attacks two or more enemy
/// rooks, queens or the king
pub fn fork(mv: &PuzzleMove) -> bool {
    let to_sq = mv.chess_move.get_dest();
    if mv.board_after.piece_on(to_sq).is_none() {
        return false;
    }

    let targets = attacked_enemy_pieces(&mv.board_after, to_sq, mv.pov)
        .into_iter()
        .filter(|(piece, _)| is_major_target(*piece))
        .count();
    targets >= 2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_knight_forks_rook_and_queen() {
        let mv = PuzzleMove::from_uci("r3q2k/8/8/1N6/8/8/8/7K w - - 0 1", "b5c7").unwrap();
        assert!(fork(&mv));
    }

    #[test]
    fn test_single_target_is_not_a_fork() {
        let mv = PuzzleMove::from_uci("r6k/8/8/1N6/8/8/8/4K3 w - - 0 1", "b5c7").unwrap();
        assert!(!fork(&mv));
    }

    #[test]
    fn test_minor_pieces_do_not_count() {
        // Knight on c7 hits bishops on a8 and e8
        let mv = PuzzleMove::from_uci("b3b2k/8/8/1N6/8/8/8/4K3 w - - 0 1", "b5c7").unwrap();
        assert!(!fork(&mv));
    }
}
