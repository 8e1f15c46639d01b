//! Game Analyzer against a scripted engine.

mod common;

use std::sync::Arc;

use analysis_worker::analysis::MoveLabel;
use analysis_worker::analyzer::{analyze_game, AnalysisStatus};
use analysis_worker::config::AnalysisSettings;
use analysis_worker::engine::never_cancelled;
use analysis_worker::puzzles::puzzle_candidates;
use chess_core::Side;
use common::{game, knight_shuffle, replayed, Line, Script};

/// 40 quiet plies; White's ply 21 turns +50 into -160
fn forty_ply_script() -> (String, Script) {
    let moves = knight_shuffle(10);
    let replay = replayed(&moves);
    assert_eq!(replay.plies.len(), 40);

    let mut script = Script::new();
    for ply in &replay.plies {
        let score = match ply.ply {
            21 => 50,
            p if p > 21 && p % 2 == 0 => 160,
            p if p > 21 => -160,
            _ => 0,
        };
        script.score(&ply.fen_before, Line::new(score, &["b1c3"]));
    }
    // White to move after ply 40, still worse off
    script.score(&replay.final_fen, Line::new(-160, &["b1c3"]));
    (moves, script)
}

#[tokio::test]
async fn test_one_record_per_ply() {
    let (moves, script) = forty_ply_script();
    let evaluator = common::evaluator(Arc::new(script), 2);

    let analysis = analyze_game(
        &evaluator,
        &game("g1", &moves),
        &AnalysisSettings::default(),
        &never_cancelled(),
    )
    .await
    .unwrap();

    assert_eq!(analysis.status, AnalysisStatus::Analyzed);
    assert_eq!(analysis.total_plies, 40);
    assert_eq!(analysis.records.len(), 40);
    for (i, record) in analysis.records.iter().enumerate() {
        assert_eq!(record.ply_index, i + 1);
    }
    assert_eq!(analysis.white, "alice");
    assert_eq!(analysis.black, "bob");
}

#[tokio::test]
async fn test_ply_21_is_mistake_and_blunder() {
    let (moves, script) = forty_ply_script();
    let evaluator = common::evaluator(Arc::new(script), 1);

    let analysis = analyze_game(
        &evaluator,
        &game("g1", &moves),
        &AnalysisSettings::default(),
        &never_cancelled(),
    )
    .await
    .unwrap();

    let record = analysis.record(21).unwrap();
    assert_eq!(record.side_to_move, Side::White);
    assert_eq!(record.evaluation_before_move.score_centipawns, 50);
    assert_eq!(record.evaluation_after_move, -160);
    assert_eq!(record.evaluation_drop, 210);
    assert!(record.is_mistake);
    assert!(record.is_blunder);
    assert!(record.is_critical);
    assert_eq!(record.label, MoveLabel::Blunder);

    assert_eq!(analysis.mistakes, vec![21]);
    assert_eq!(analysis.blunders, vec![21]);
    assert_eq!(analysis.accuracy_white, 95.0);
    assert_eq!(analysis.accuracy_black, 100.0);

    // Source of a puzzle: the position before ply 21
    let analyses = vec![analysis];
    let candidates = puzzle_candidates(&analyses);
    let (_, first) = candidates[0];
    assert_eq!(first.ply_index, 21);
    let replay = replayed(&moves);
    assert_eq!(first.position_before_fen, replay.plies[20].fen_before);
}

#[tokio::test]
async fn test_hanging_the_queen_is_a_positive_drop() {
    // 2. Qg4 drops the queen to Bxg4
    let moves = "e4 d5 Qg4 Bxg4";
    let replay = replayed(moves);
    let mut script = Script::new();
    script
        .score(&replay.plies[0].fen_before, Line::new(30, &["e2e4"]))
        .score(&replay.plies[1].fen_before, Line::new(-20, &["d7d5"]))
        .score(&replay.plies[2].fen_before, Line::new(40, &["e4d5"]))
        .score(&replay.plies[3].fen_before, Line::new(900, &["c8g4"]))
        .score(&replay.final_fen, Line::new(-880, &["e4d5"]));
    let evaluator = common::evaluator(Arc::new(script), 1);

    let analysis = analyze_game(
        &evaluator,
        &game("hang", moves),
        &AnalysisSettings::default(),
        &never_cancelled(),
    )
    .await
    .unwrap();

    let blunder = analysis.record(3).unwrap();
    assert_eq!(blunder.side_to_move, Side::White);
    assert_eq!(blunder.move_played, "Qg4");
    assert!(blunder.evaluation_drop > 0);
    assert!(blunder.is_blunder);
    assert_eq!(blunder.best_move_san.as_deref(), Some("exd5"));

    // Taking the queen cost Black nothing
    let capture = analysis.record(4).unwrap();
    assert!(capture.evaluation_drop <= 20);
    assert!(!capture.is_mistake);
}

#[tokio::test]
async fn test_short_games_are_not_penalised() {
    let evaluator = common::evaluator(Arc::new(Script::new()), 1);
    let analysis = analyze_game(
        &evaluator,
        &game("short", "e4"),
        &AnalysisSettings::default(),
        &never_cancelled(),
    )
    .await
    .unwrap();

    assert_eq!(analysis.records.len(), 1);
    assert!(analysis.mistakes.is_empty());
    assert_eq!(analysis.accuracy_white, 100.0);
    assert_eq!(analysis.accuracy_black, 100.0);
}

#[tokio::test]
async fn test_checkmate_ends_evaluation() {
    // Fool's mate: the final position is never sent to the engine
    let moves = "f3 e5 g4 Qh4#";
    let replay = replayed(moves);
    let mut script = Script::new();
    script.score(&replay.plies[3].fen_before, Line::new(10_000, &["d8h4"]));
    let script = Arc::new(script);
    let evaluator = common::evaluator(script.clone(), 1);

    let analysis = analyze_game(
        &evaluator,
        &game("mate", moves),
        &AnalysisSettings::default(),
        &never_cancelled(),
    )
    .await
    .unwrap();

    assert_eq!(script.search_count(), 4);
    let mate = analysis.record(4).unwrap();
    assert_eq!(mate.evaluation_drop, 0);
    assert_eq!(mate.label, MoveLabel::Best);
}

#[tokio::test]
async fn test_illegal_game_is_recorded_as_failed() {
    let evaluator = common::evaluator(Arc::new(Script::new()), 1);
    let analysis = analyze_game(
        &evaluator,
        &game("bad", "e4 e4"),
        &AnalysisSettings::default(),
        &never_cancelled(),
    )
    .await
    .unwrap();

    assert_eq!(analysis.status, AnalysisStatus::Failed);
    assert!(analysis.error.unwrap().contains("ply 2"));
    assert!(analysis.records.is_empty());
}
