//! Analysis worker CLI
//!
//! `--pgn <file> [--depth N]` analyses one game file locally.
//! `--platform P --username U [--games N] [--depth N]` runs a whole job
//! against the in-memory store and prints its summary.

use std::sync::Arc;

use anyhow::Context;
use chess_core::Side;
use tracing::info;

use analysis_worker::analyzer::analyze_game;
use analysis_worker::clients::{GameRecord, Platform, PlatformRouter};
use analysis_worker::config::WorkerConfig;
use analysis_worker::coordinator::JobCoordinator;
use analysis_worker::engine::{never_cancelled, EngineOptions};
use analysis_worker::evaluator::PositionEvaluator;
use analysis_worker::jobs::{JobRequest, DEFAULT_GAME_LIMIT};
use analysis_worker::pool::{EnginePool, StockfishFactory};
use analysis_worker::store::MemoryStore;

const CLI_OWNER: &str = "cli";

/// Value following `--name`, if present
fn flag_value(args: &[String], name: &str) -> Option<String> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn parse_flag<T: std::str::FromStr>(args: &[String], name: &str) -> anyhow::Result<Option<T>> {
    match flag_value(args, name) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| anyhow::anyhow!("{name} expects a number, got {raw:?}")),
        None => Ok(None),
    }
}

fn usage() -> anyhow::Error {
    anyhow::anyhow!(
        "usage: analysis-worker --pgn <file> [--depth N]\n       \
         analysis-worker --platform <lichess|chess_com> --username <name> [--games N] [--depth N]"
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Load .env file for local dev
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().collect();
    let config = WorkerConfig::from_env()?;
    let depth: Option<u32> = parse_flag(&args, "--depth")?;

    let factory = Arc::new(StockfishFactory::new(
        &config.stockfish_path,
        EngineOptions::from_config(&config),
    ));
    let pool = Arc::new(EnginePool::new(factory, config.pool_size));
    let evaluator = PositionEvaluator::new(pool.clone());
    info!(stockfish_path = %config.stockfish_path, pool_size = pool.size(), "Worker config loaded");

    if let Some(path) = flag_value(&args, "--pgn") {
        let pgn = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
        let settings = match depth {
            Some(d) => config.analysis.with_depth(d),
            None => config.analysis.clone(),
        };
        let record = GameRecord::new(&path, Platform::Lichess, &pgn);
        let analysis = analyze_game(&evaluator, &record, &settings, &never_cancelled()).await?;

        println!("{} vs {} ({})", analysis.white, analysis.black, analysis.result);
        println!(
            "Accuracy: white {:.1}%, black {:.1}%",
            analysis.accuracy_white, analysis.accuracy_black
        );
        println!(
            "Mistakes: {}, blunders: {}",
            analysis.mistakes.len(),
            analysis.blunder_records().count()
        );
        for record in analysis.mistake_records() {
            println!(
                "  {}{} {} drop {} (best {}) [{}]",
                record.move_number,
                if record.side_to_move == Side::White { "." } else { "..." },
                record.move_played,
                record.evaluation_drop,
                record.best_move_san.as_deref().unwrap_or(&record.best_move_uci),
                record.label.as_str(),
            );
        }
        if let Some(error) = &analysis.error {
            println!("Incomplete: {error}");
        }
    } else if let Some(platform) = flag_value(&args, "--platform") {
        let username = flag_value(&args, "--username").ok_or_else(usage)?;
        let platform: Platform = platform.parse()?;
        let games: usize = parse_flag(&args, "--games")?.unwrap_or(DEFAULT_GAME_LIMIT);

        let coordinator = JobCoordinator::new(
            Arc::new(MemoryStore::new()),
            Arc::new(PlatformRouter::new()?),
            evaluator,
            config.analysis.clone(),
            config.puzzles.clone(),
        );
        let request = JobRequest::new(platform, &username)
            .with_limit(games)
            .with_depth(depth.unwrap_or(config.analysis.depth));
        let job = coordinator.run_job_to_end(CLI_OWNER, request).await?;

        println!("Job {} finished: {}", job.id, job.status);
        if let Some(result) = &job.result {
            println!("{}", serde_json::to_string_pretty(result)?);
        }
    } else {
        return Err(usage());
    }

    pool.shutdown().await;
    Ok(())
}
