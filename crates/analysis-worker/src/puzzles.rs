//! Puzzle Synthesizer: turn the worst moves of a job's games into verified
//! tactical puzzles.

use std::collections::HashSet;

use chess_core::replay::{legal_move_count, line_ends_in_mate, uci_line_to_san, uci_to_san};
use chess_core::Side;
use chess_puzzler::puzzle::explain::explain;
use chess_puzzler::puzzle::extraction::{
    is_valid_margin, trim_solution, MAX_ALTERNATIVES, PRESCAN_LINES,
};
use chess_puzzler::puzzle::themes::classify_theme;
use chess_puzzler::puzzle::{Difficulty, PuzzleMove, Theme};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::analyzer::{GameAnalysis, MoveRecord};
use crate::config::{AnalysisSettings, PuzzleSettings};
use crate::engine::CancelSignal;
use crate::error::WorkerError;
use crate::evaluator::PositionEvaluator;

/// The move a puzzle was built from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MistakeRef {
    pub game_id: String,
    pub ply_index: usize,
    pub move_played: String,
    pub evaluation_drop: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Puzzle {
    pub id: String,
    pub source_position_fen: String,
    /// Key move, UCI
    pub best_move: String,
    pub best_move_san: String,
    /// UCI moves starting with the key move
    pub solution_line: Vec<String>,
    pub solution_san: Vec<String>,
    pub theme: Theme,
    pub difficulty: Difficulty,
    pub explanation: String,
    pub is_valid: bool,
    /// Best score minus the best alternative's score
    pub margin: i32,
    pub solver: Side,
    pub originating_mistake: MistakeRef,
}

/// Candidate positions, most promising first: mistakes by drop (ties by game
/// order, then ply), then the remaining critical swings by size.
pub fn puzzle_candidates(analyses: &[GameAnalysis]) -> Vec<(&GameAnalysis, &MoveRecord)> {
    let mut mistakes = Vec::new();
    let mut swings = Vec::new();
    for (game_idx, game) in analyses.iter().enumerate() {
        for record in &game.records {
            if record.is_mistake {
                mistakes.push((game_idx, game, record));
            } else if record.is_critical {
                swings.push((game_idx, game, record));
            }
        }
    }

    mistakes.sort_by(|a, b| {
        b.2.evaluation_drop
            .cmp(&a.2.evaluation_drop)
            .then(a.0.cmp(&b.0))
            .then(a.2.ply_index.cmp(&b.2.ply_index))
    });
    swings.sort_by(|a, b| {
        b.2.evaluation_drop
            .abs()
            .cmp(&a.2.evaluation_drop.abs())
            .then(a.0.cmp(&b.0))
            .then(a.2.ply_index.cmp(&b.2.ply_index))
    });

    mistakes
        .into_iter()
        .chain(swings)
        .map(|(_, game, record)| (game, record))
        .collect()
}

/// Build up to `settings.target` valid puzzles. Fewer candidates mean fewer
/// puzzles; invalid ones are dropped. Only cancellation is an error.
pub async fn synthesize_puzzles(
    evaluator: &PositionEvaluator,
    analyses: &[GameAnalysis],
    analysis_settings: &AnalysisSettings,
    settings: &PuzzleSettings,
    cancel: &CancelSignal,
) -> Result<Vec<Puzzle>, WorkerError> {
    let candidates = puzzle_candidates(analyses);
    info!(candidates = candidates.len(), target = settings.target, "Synthesizing puzzles");

    let mut puzzles = Vec::new();
    let mut seen_positions = HashSet::new();

    for (game, record) in candidates {
        if puzzles.len() >= settings.target {
            break;
        }
        if !seen_positions.insert(record.position_before_fen.clone()) {
            continue;
        }

        match confirm_candidate(evaluator, game, record, analysis_settings, settings, cancel).await {
            Ok(Some(puzzle)) if puzzle.is_valid => puzzles.push(puzzle),
            Ok(Some(puzzle)) => {
                debug!(id = %puzzle.id, margin = puzzle.margin, "Best move not unique enough");
            }
            Ok(None) => {}
            Err(e) if e.is_cancellation() => return Err(e),
            Err(e) => {
                warn!(game_id = %game.game_id, ply = record.ply_index, error = %e, "Puzzle candidate skipped");
            }
        }
    }

    info!(count = puzzles.len(), "Puzzles ready");
    Ok(puzzles)
}

/// Deep-check one candidate position. None when no puzzle can be built at
/// all; otherwise the puzzle with `is_valid` set from the margin rule.
pub async fn confirm_candidate(
    evaluator: &PositionEvaluator,
    game: &GameAnalysis,
    record: &MoveRecord,
    analysis_settings: &AnalysisSettings,
    settings: &PuzzleSettings,
    cancel: &CancelSignal,
) -> Result<Option<Puzzle>, WorkerError> {
    let fen = record.position_before_fen.as_str();
    if legal_move_count(fen) < 2 {
        return Ok(None);
    }

    let confirm_depth = analysis_settings.depth + settings.depth_bonus;
    let confirmed = evaluator.evaluate(fen, confirm_depth, cancel).await?;
    let best_move = confirmed.best_move.clone();
    if best_move.is_empty() {
        return Ok(None);
    }

    // Shallow multi-line scan picks the alternatives worth a real look
    let prescan = evaluator
        .evaluate_lines(fen, settings.prescan_depth, PRESCAN_LINES, cancel)
        .await?;
    let mut alternatives: Vec<String> = Vec::new();
    for line in &prescan {
        if line.best_move.is_empty() || line.best_move == best_move {
            continue;
        }
        if !alternatives.contains(&line.best_move) {
            alternatives.push(line.best_move.clone());
        }
        if alternatives.len() >= MAX_ALTERNATIVES {
            break;
        }
    }
    if alternatives.is_empty() {
        debug!(fen, "No alternative to compare against");
        return Ok(None);
    }

    let mut second_best = i32::MIN;
    for alternative in &alternatives {
        let eval = evaluator
            .evaluate_move(fen, analysis_settings.depth, alternative, cancel)
            .await?;
        second_best = second_best.max(eval.score_centipawns);
    }

    let best_score = confirmed.score_centipawns;
    let is_valid = is_valid_margin(best_score, second_best);
    let margin = best_score - second_best;

    let principal = if confirmed.principal_line.first() == Some(&best_move) {
        confirmed.principal_line.clone()
    } else {
        vec![best_move.clone()]
    };
    let Some(solution_line) = trim_solution(&principal, |line| line_ends_in_mate(fen, line)) else {
        debug!(fen, "Solution line too short");
        return Ok(None);
    };

    let Some(key_move) = PuzzleMove::from_uci(fen, &best_move) else {
        return Ok(None);
    };
    let solution_san = uci_line_to_san(fen, &solution_line);
    let best_move_san = uci_to_san(fen, &best_move).unwrap_or_else(|| best_move.clone());
    let theme = classify_theme(&key_move);
    let explanation = explain(
        &key_move,
        &best_move_san,
        theme,
        solution_san.get(1).map(String::as_str),
    );

    Ok(Some(Puzzle {
        id: format!("{}-{}", game.game_id, record.ply_index),
        source_position_fen: fen.to_string(),
        best_move,
        best_move_san,
        solution_line,
        solution_san,
        theme,
        difficulty: Difficulty::from_margin(margin),
        explanation,
        is_valid,
        margin,
        solver: record.side_to_move,
        originating_mistake: MistakeRef {
            game_id: game.game_id.clone(),
            ply_index: record.ply_index,
            move_played: record.move_played.clone(),
            evaluation_drop: record.evaluation_drop,
        },
    }))
}
