//! Move analysis and classification. Pure functions only.
//! (No Board/Engine/Game dependencies)

use serde::{Deserialize, Serialize};

use crate::config::{AnalysisSettings, GOOD_THRESHOLD};
use crate::uci::MATE_SCORE;

/// Per-move label from the layered threshold ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveLabel {
    Best,
    Good,
    Inaccuracy,
    Mistake,
    Blunder,
}

impl MoveLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            MoveLabel::Best => "best",
            MoveLabel::Good => "good",
            MoveLabel::Inaccuracy => "inaccuracy",
            MoveLabel::Mistake => "mistake",
            MoveLabel::Blunder => "blunder",
        }
    }
}

/// Keep scores inside the mate magnitude before any arithmetic
pub fn clamp_score(cp: i32) -> i32 {
    cp.clamp(-MATE_SCORE, MATE_SCORE)
}

/// Score of the side to move in a finished position
pub fn terminal_score(checkmated: bool) -> i32 {
    if checkmated {
        -MATE_SCORE
    } else {
        0
    }
}

/// Value lost by the mover at ply i.
/// `score_before` is the mover's score before the move; `next_score_before`
/// is the opponent's score before the following ply (side-to-move view),
/// so the mover's score after the move is its negation.
pub fn evaluation_drop(score_before: i32, next_score_before: i32) -> i32 {
    let before = clamp_score(score_before);
    let after = -clamp_score(next_score_before);
    before - after
}

pub fn is_mistake(drop: i32, settings: &AnalysisSettings) -> bool {
    drop > settings.mistake_threshold
}

/// Blunders refine mistakes: only a mistake can be a blunder
pub fn is_blunder(drop: i32, settings: &AnalysisSettings) -> bool {
    is_mistake(drop, settings) && drop > settings.blunder_threshold
}

/// Large swing in either direction, regardless of who is at fault
pub fn is_critical(drop: i32, settings: &AnalysisSettings) -> bool {
    drop.abs() > settings.critical_threshold
}

pub fn classify_move(drop: i32, settings: &AnalysisSettings) -> MoveLabel {
    if is_mistake(drop, settings) {
        if is_blunder(drop, settings) {
            MoveLabel::Blunder
        } else {
            MoveLabel::Mistake
        }
    } else if drop > settings.inaccuracy_threshold {
        MoveLabel::Inaccuracy
    } else if drop > GOOD_THRESHOLD {
        MoveLabel::Good
    } else {
        MoveLabel::Best
    }
}

/// Percentage of a side's moves that stayed under the mistake threshold,
/// rounded to one decimal. 100 when the side has no moves.
pub fn calculate_accuracy(drops: &[i32], settings: &AnalysisSettings) -> f64 {
    if drops.is_empty() {
        return 100.0;
    }
    let accurate = drops
        .iter()
        .filter(|d| !is_mistake(**d, settings))
        .count();
    round1(accurate as f64 * 100.0 / drops.len() as f64).clamp(0.0, 100.0)
}

/// Mean of the drops, gains counted as zero
pub fn average_centipawn_loss(drops: &[i32]) -> f64 {
    if drops.is_empty() {
        return 0.0;
    }
    let total: i64 = drops.iter().map(|d| (*d).max(0) as i64).sum();
    round1(total as f64 / drops.len() as f64)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> AnalysisSettings {
        AnalysisSettings::default()
    }

    #[test]
    fn test_drop_is_from_movers_perspective() {
        // +50 before, opponent then sits at +160: mover is at -160
        assert_eq!(evaluation_drop(50, 160), 210);
        // -30 before, opponent then sits at -80: mover climbed to +80
        assert_eq!(evaluation_drop(-30, -80), -110);
        // Hanging the queen for nothing
        assert!(evaluation_drop(0, 900) > 0);
    }

    #[test]
    fn test_mate_scores_are_clamped() {
        assert_eq!(evaluation_drop(10_000, 10_000), 20_000);
        assert_eq!(evaluation_drop(50_000, 0), 10_000);
        assert_eq!(evaluation_drop(0, terminal_score(true)), -10_000);
        assert_eq!(evaluation_drop(0, terminal_score(false)), 0);
    }

    #[test]
    fn test_layered_thresholds() {
        let s = settings();
        assert!(is_mistake(101, &s));
        assert!(!is_mistake(100, &s));
        assert!(is_blunder(201, &s));
        assert!(!is_blunder(200, &s));
        assert!(is_critical(-201, &s));
        assert!(!is_critical(200, &s));
    }

    #[test]
    fn test_blunder_requires_mistake() {
        // Blunder threshold below the mistake threshold never bypasses it
        let s = AnalysisSettings {
            mistake_threshold: 300,
            blunder_threshold: 150,
            ..settings()
        };
        assert!(!is_blunder(200, &s));
    }

    #[test]
    fn test_classify_move() {
        let s = settings();
        assert_eq!(classify_move(0, &s), MoveLabel::Best);
        assert_eq!(classify_move(-40, &s), MoveLabel::Best);
        assert_eq!(classify_move(25, &s), MoveLabel::Good);
        assert_eq!(classify_move(75, &s), MoveLabel::Inaccuracy);
        assert_eq!(classify_move(150, &s), MoveLabel::Mistake);
        assert_eq!(classify_move(210, &s), MoveLabel::Blunder);
    }

    #[test]
    fn test_calculate_accuracy() {
        let s = settings();
        assert_eq!(calculate_accuracy(&[], &s), 100.0);
        assert_eq!(calculate_accuracy(&[0, 10, 100], &s), 100.0);
        assert_eq!(calculate_accuracy(&[0, 150, 300], &s), 33.3);
        assert_eq!(calculate_accuracy(&[500], &s), 0.0);
    }

    #[test]
    fn test_average_centipawn_loss() {
        assert_eq!(average_centipawn_loss(&[]), 0.0);
        assert_eq!(average_centipawn_loss(&[-100, 30, 60]), 30.0);
    }
}
