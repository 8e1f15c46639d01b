//! Game Analyzer: replay a game, evaluate the position before every ply and
//! turn the evaluations into per-move records, mistakes and accuracy.

use chess_core::pgn::parse_pgn;
use chess_core::replay::{replay, uci_to_san, FinalState, ReplayedGame};
use chess_core::Side;
use serde::{Deserialize, Serialize};
use tracing::{info, trace, warn};

use crate::analysis::{self, MoveLabel};
use crate::clients::{GameRecord, Platform};
use crate::config::AnalysisSettings;
use crate::engine::CancelSignal;
use crate::error::WorkerError;
use crate::evaluator::PositionEvaluator;
use crate::uci::EvaluationInfo;

/// One ply of an analysed game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRecord {
    /// 1-based ply index
    pub ply_index: usize,
    pub move_number: u32,
    pub side_to_move: Side,
    /// Move played, SAN
    pub move_played: String,
    pub move_uci: String,
    pub position_before_fen: String,
    pub evaluation_before_move: EvaluationInfo,
    /// Mover's score after the move (mover's perspective)
    pub evaluation_after_move: i32,
    /// Positive = the move lost value for the mover
    pub evaluation_drop: i32,
    pub best_move_uci: String,
    pub best_move_san: Option<String>,
    pub label: MoveLabel,
    pub is_mistake: bool,
    pub is_blunder: bool,
    pub is_critical: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    /// Every ply evaluated
    Analyzed,
    /// The engine failed part-way; records cover the plies before the failure
    Partial,
    /// The game record could not be replayed; nothing evaluated
    Failed,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Analyzed => "analyzed",
            AnalysisStatus::Partial => "partial",
            AnalysisStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameAnalysis {
    pub game_id: String,
    pub platform: Option<Platform>,
    pub white: String,
    pub black: String,
    pub result: String,
    pub opening: Option<String>,
    pub date: Option<String>,
    pub time_control: Option<String>,
    pub status: AnalysisStatus,
    pub error: Option<String>,
    pub total_plies: usize,
    pub records: Vec<MoveRecord>,
    /// Ply indices of records with drop above the mistake threshold
    pub mistakes: Vec<usize>,
    /// Ply indices of mistakes that are also blunders
    pub blunders: Vec<usize>,
    pub critical_moments: Vec<usize>,
    pub best_moves: Vec<usize>,
    pub accuracy_white: f64,
    pub accuracy_black: f64,
    pub acpl_white: f64,
    pub acpl_black: f64,
}

impl GameAnalysis {
    fn empty(record: &GameRecord) -> Self {
        Self {
            game_id: record.game_id.clone(),
            platform: Some(record.platform),
            white: "Unknown".to_string(),
            black: "Unknown".to_string(),
            result: "*".to_string(),
            opening: None,
            date: record.date.clone(),
            time_control: record.time_control.clone(),
            status: AnalysisStatus::Analyzed,
            error: None,
            total_plies: 0,
            records: Vec::new(),
            mistakes: Vec::new(),
            blunders: Vec::new(),
            critical_moments: Vec::new(),
            best_moves: Vec::new(),
            accuracy_white: 100.0,
            accuracy_black: 100.0,
            acpl_white: 0.0,
            acpl_black: 0.0,
        }
    }

    fn failed(mut self, error: String) -> Self {
        self.status = AnalysisStatus::Failed;
        self.error = Some(error);
        self
    }

    pub fn record(&self, ply_index: usize) -> Option<&MoveRecord> {
        ply_index
            .checked_sub(1)
            .and_then(|i| self.records.get(i))
            .filter(|r| r.ply_index == ply_index)
    }

    pub fn mistake_records(&self) -> impl Iterator<Item = &MoveRecord> {
        self.records.iter().filter(|r| r.is_mistake)
    }

    pub fn blunder_records(&self) -> impl Iterator<Item = &MoveRecord> {
        self.records.iter().filter(|r| r.is_blunder)
    }
}

/// Analyse one game. Only cancellation is returned as an error: unreadable
/// games and engine failures are recorded on the returned analysis.
pub async fn analyze_game(
    evaluator: &PositionEvaluator,
    game: &GameRecord,
    settings: &AnalysisSettings,
    cancel: &CancelSignal,
) -> Result<GameAnalysis, WorkerError> {
    let game_id = game.game_id.as_str();
    info!(game_id, depth = settings.depth, "Starting analysis");

    let mut analysis = GameAnalysis::empty(game);

    let Some(data) = parse_pgn(&game.pgn) else {
        warn!(game_id, "Unreadable game record");
        return Ok(analysis.failed("Unreadable game record".to_string()));
    };
    analysis.white = data.metadata.white.clone();
    analysis.black = data.metadata.black.clone();
    analysis.result = data.metadata.result.clone();
    analysis.opening = data.metadata.opening_name().map(String::from);
    if analysis.date.is_none() {
        analysis.date = data.metadata.date.clone();
    }
    if analysis.time_control.is_none() {
        analysis.time_control = data.metadata.time_control.clone();
    }

    let replayed = match replay(&data.moves, data.metadata.setup_fen.as_deref()) {
        Ok(r) => r,
        Err(e) => {
            let err = WorkerError::InvalidGame(e);
            warn!(game_id, error = %err, "Game replay failed");
            return Ok(analysis.failed(err.to_string()));
        }
    };
    analysis.total_plies = replayed.plies.len();
    info!(game_id, plies = analysis.total_plies, "Evaluating positions");

    // evals[i] = evaluation before ply i+1
    let mut evals: Vec<EvaluationInfo> = Vec::with_capacity(replayed.plies.len() + 1);
    let mut failure: Option<(usize, WorkerError)> = None;

    for ply in &replayed.plies {
        let ply_index = ply.ply;
        let on_progress = |line: &EvaluationInfo| {
            trace!(game_id, ply = ply_index, depth = line.depth, score = line.score_centipawns, "Search progress");
        };
        match evaluator
            .evaluate_with_progress(&ply.fen_before, settings.depth, cancel, &on_progress)
            .await
        {
            Ok(eval) => evals.push(eval),
            Err(e) if e.is_cancellation() => return Err(e),
            Err(e) => {
                failure = Some((ply.ply, e));
                break;
            }
        }
    }

    let final_score = if failure.is_some() {
        None
    } else {
        match final_position_score(evaluator, &replayed, settings, cancel).await {
            Ok(score) => score,
            Err(e) if e.is_cancellation() => return Err(e),
            Err(e) => {
                failure = Some((replayed.plies.len() + 1, e));
                None
            }
        }
    };

    let classify = replayed.plies.len() >= 2;
    for (i, ply) in replayed.plies.iter().enumerate() {
        let next_score = match evals.get(i + 1) {
            Some(next) => next.score_centipawns,
            None if i + 1 == replayed.plies.len() => match final_score {
                Some(score) => score,
                None => break,
            },
            None => break,
        };
        let Some(before) = evals.get(i) else {
            break;
        };

        let drop = analysis::evaluation_drop(before.score_centipawns, next_score);
        let (label, is_mistake, is_blunder, is_critical) = if classify {
            (
                analysis::classify_move(drop, settings),
                analysis::is_mistake(drop, settings),
                analysis::is_blunder(drop, settings),
                analysis::is_critical(drop, settings),
            )
        } else {
            (MoveLabel::Best, false, false, false)
        };

        analysis.records.push(MoveRecord {
            ply_index: ply.ply,
            move_number: ply.move_number,
            side_to_move: ply.side,
            move_played: ply.san.clone(),
            move_uci: ply.uci.clone(),
            position_before_fen: ply.fen_before.clone(),
            evaluation_before_move: before.clone(),
            evaluation_after_move: -analysis::clamp_score(next_score),
            evaluation_drop: drop,
            best_move_uci: before.best_move.clone(),
            best_move_san: uci_to_san(&ply.fen_before, &before.best_move),
            label,
            is_mistake,
            is_blunder,
            is_critical,
        });
    }

    summarize(&mut analysis, settings, classify);

    if let Some((ply, err)) = failure {
        let partial = WorkerError::AnalysisPartial {
            ply,
            reason: err.to_string(),
        };
        warn!(game_id, ply, error = %err, "Analysis incomplete");
        analysis.status = AnalysisStatus::Partial;
        analysis.error = Some(partial.to_string());
    }

    info!(
        game_id,
        status = analysis.status.as_str(),
        mistakes = analysis.mistakes.len(),
        blunders = analysis.blunders.len(),
        accuracy_white = analysis.accuracy_white,
        accuracy_black = analysis.accuracy_black,
        "Analysis complete"
    );
    Ok(analysis)
}

/// Side-to-move score after the last ply: fixed for finished games,
/// evaluated otherwise. None when the game has no plies.
async fn final_position_score(
    evaluator: &PositionEvaluator,
    replayed: &ReplayedGame,
    settings: &AnalysisSettings,
    cancel: &CancelSignal,
) -> Result<Option<i32>, WorkerError> {
    if replayed.plies.is_empty() {
        return Ok(None);
    }
    match replayed.final_state {
        FinalState::Checkmate => Ok(Some(analysis::terminal_score(true))),
        FinalState::NoLegalMoves => Ok(Some(analysis::terminal_score(false))),
        FinalState::Ongoing => {
            let eval = evaluator
                .evaluate(&replayed.final_fen, settings.depth, cancel)
                .await?;
            Ok(Some(eval.score_centipawns))
        }
    }
}

/// Fill the mistake lists, accuracy and average loss from the records
fn summarize(analysis: &mut GameAnalysis, settings: &AnalysisSettings, classify: bool) {
    let mut white_drops = Vec::new();
    let mut black_drops = Vec::new();

    for record in &analysis.records {
        match record.side_to_move {
            Side::White => white_drops.push(record.evaluation_drop),
            Side::Black => black_drops.push(record.evaluation_drop),
        }
        if record.is_mistake {
            analysis.mistakes.push(record.ply_index);
        }
        if record.is_blunder {
            analysis.blunders.push(record.ply_index);
        }
        if record.is_critical {
            analysis.critical_moments.push(record.ply_index);
        }
        if classify && record.label == MoveLabel::Best {
            analysis.best_moves.push(record.ply_index);
        }
    }

    if classify {
        analysis.accuracy_white = analysis::calculate_accuracy(&white_drops, settings);
        analysis.accuracy_black = analysis::calculate_accuracy(&black_drops, settings);
    }
    analysis.acpl_white = analysis::average_centipawn_loss(&white_drops);
    analysis.acpl_black = analysis::average_centipawn_loss(&black_drops);
}
