/// Human-readable explanation of a puzzle's key move

use chess::BoardStatus;

use crate::board_utils::{captured_piece, piece_name};
use crate::puzzle::{PuzzleMove, Theme};

/// Build the explanation from the key move's SAN, what it captures, whether it
/// checks, and the opponent's first reply in the principal line.
pub fn explain(mv: &PuzzleMove, san: &str, theme: Theme, first_reply: Option<&str>) -> String {
    let mut text = format!("{san}!");

    if mv.board_after.status() == BoardStatus::Checkmate {
        text.push_str(" delivers checkmate.");
        return text;
    }

    let mut actions = Vec::new();
    if let Some(piece) = captured_piece(&mv.board_before, mv.chess_move) {
        actions.push(format!("captures the {}", piece_name(piece)));
    }
    if *mv.board_after.checkers() != chess::EMPTY {
        actions.push("gives check".to_string());
    }
    match theme {
        Theme::Fork => actions.push("forks two valuable pieces".to_string()),
        Theme::Pin => actions.push("pins an enemy piece".to_string()),
        Theme::DiscoveredAttack => actions.push("unleashes a discovered attack".to_string()),
        _ => {}
    }

    if actions.is_empty() {
        text.push_str(" is the only move that keeps the advantage.");
    } else {
        text.push(' ');
        text.push_str(&actions.join(" and "));
        text.push('.');
    }

    if let Some(reply) = first_reply {
        text.push_str(&format!(" After {reply}, the follow-up wins."));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_with_reply() {
        let mv = PuzzleMove::from_uci("4k3/8/8/3q4/8/8/8/3RK3 w - - 0 1", "d1d5").unwrap();
        let text = explain(&mv, "Rxd5", Theme::QueenSacrifice, Some("Kf7"));
        assert_eq!(text, "Rxd5! captures the queen. After Kf7, the follow-up wins.");
    }

    #[test]
    fn test_capture_with_check() {
        let mv = PuzzleMove::from_uci("n3k3/8/8/8/8/8/8/R3K3 w - - 0 1", "a1a8").unwrap();
        let text = explain(&mv, "Rxa8+", Theme::Check, None);
        assert_eq!(text, "Rxa8+! captures the knight and gives check.");
    }

    #[test]
    fn test_mate_ignores_reply() {
        let mv = PuzzleMove::from_uci("6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 1", "a1a8").unwrap();
        let text = explain(&mv, "Ra8#", Theme::Checkmate, Some("Kh8"));
        assert_eq!(text, "Ra8#! delivers checkmate.");
    }

    #[test]
    fn test_quiet_move() {
        let mv = PuzzleMove::from_uci(
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
            "e2e4",
        )
        .unwrap();
        let text = explain(&mv, "e4", Theme::Tactic, None);
        assert_eq!(text, "e4! is the only move that keeps the advantage.");
    }
}
