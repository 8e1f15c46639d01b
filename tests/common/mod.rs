//! Shared fixtures: a deterministic scripted engine and a static game source.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use analysis_worker::clients::{GameRecord, GameSource, Platform};
use analysis_worker::coordinator::JobCoordinator;
use analysis_worker::config::{AnalysisSettings, PuzzleSettings};
use analysis_worker::engine::{cancelled, CancelSignal, EngineSession, ProgressFn, SearchRequest};
use analysis_worker::evaluator::PositionEvaluator;
use analysis_worker::jobs::{JobStatus, JobStatusView};
use analysis_worker::pool::{EnginePool, SessionFactory};
use analysis_worker::store::MemoryStore;
use analysis_worker::uci::EvaluationInfo;
use analysis_worker::WorkerError;
use async_trait::async_trait;
use chess_core::replay::{replay, ReplayedGame};
use uuid::Uuid;

/// What the engine says about one position
#[derive(Clone, Debug)]
pub struct Line {
    pub score: i32,
    pub pv: Vec<String>,
}

impl Line {
    pub fn new(score: i32, pv: &[&str]) -> Self {
        Self {
            score,
            pv: pv.iter().map(|m| m.to_string()).collect(),
        }
    }

    fn info(&self, depth: u32) -> EvaluationInfo {
        EvaluationInfo {
            depth,
            score_centipawns: self.score,
            mate_in_n: None,
            best_move: self.pv.first().cloned().unwrap_or_default(),
            principal_line: self.pv.clone(),
        }
    }
}

/// Scores keyed by FEN. Unknown positions score 0 with no best move.
#[derive(Default)]
pub struct Script {
    pub lines: HashMap<String, Vec<Line>>,
    /// Score of (fen, root move) when the search is restricted to that move
    pub restricted: HashMap<(String, String), i32>,
    /// Positions whose search only ends when the job is cancelled
    pub hang: HashSet<String>,
    /// Positions where the engine process dies mid-search
    pub crash: HashSet<String>,
    pub searches: AtomicUsize,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn score(&mut self, fen: &str, line: Line) -> &mut Self {
        self.lines.insert(fen.to_string(), vec![line]);
        self
    }

    pub fn multi(&mut self, fen: &str, lines: Vec<Line>) -> &mut Self {
        self.lines.insert(fen.to_string(), lines);
        self
    }

    pub fn restrict(&mut self, fen: &str, uci: &str, score: i32) -> &mut Self {
        self.restricted
            .insert((fen.to_string(), uci.to_string()), score);
        self
    }

    pub fn hang(&mut self, fen: &str) -> &mut Self {
        self.hang.insert(fen.to_string());
        self
    }

    pub fn crash(&mut self, fen: &str) -> &mut Self {
        self.crash.insert(fen.to_string());
        self
    }

    pub fn search_count(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

pub struct ScriptedSession {
    script: Arc<Script>,
    alive: bool,
}

#[async_trait]
impl EngineSession for ScriptedSession {
    async fn search(
        &mut self,
        request: &SearchRequest,
        cancel: CancelSignal,
        progress: Option<&ProgressFn<'_>>,
    ) -> Result<Vec<EvaluationInfo>, WorkerError> {
        self.script.searches.fetch_add(1, Ordering::SeqCst);

        if self.script.hang.contains(&request.fen) {
            cancelled(cancel).await;
            return Err(WorkerError::SearchCancelled);
        }

        if self.script.crash.contains(&request.fen) {
            self.alive = false;
            return Err(WorkerError::EngineCrashed);
        }

        if let Some(root) = request.searchmoves.first() {
            let score = self
                .script
                .restricted
                .get(&(request.fen.clone(), root.clone()))
                .copied()
                .unwrap_or(0);
            return Ok(vec![Line::new(score, &[root.as_str()]).info(request.depth)]);
        }

        let lines = match self.script.lines.get(&request.fen) {
            Some(lines) => lines.clone(),
            None => vec![Line::new(0, &[])],
        };
        let take = (request.multipv.max(1) as usize).min(lines.len());
        let infos: Vec<EvaluationInfo> = lines[..take]
            .iter()
            .map(|line| line.info(request.depth))
            .collect();
        if let Some(callback) = progress {
            for info in &infos {
                callback(info);
            }
        }
        Ok(infos)
    }

    fn is_alive(&self) -> bool {
        self.alive
    }

    async fn quit(&mut self) {}
}

pub struct ScriptedFactory {
    script: Arc<Script>,
}

#[async_trait]
impl SessionFactory for ScriptedFactory {
    async fn create(&self) -> Result<Box<dyn EngineSession>, WorkerError> {
        Ok(Box::new(ScriptedSession {
            script: self.script.clone(),
            alive: true,
        }))
    }
}

pub fn evaluator(script: Arc<Script>, pool_size: usize) -> PositionEvaluator {
    let factory = Arc::new(ScriptedFactory { script });
    PositionEvaluator::new(Arc::new(EnginePool::new(factory, pool_size)))
}

/// Games per username; anything else is an unknown user
#[derive(Default)]
pub struct StaticSource {
    pub games: HashMap<String, Vec<GameRecord>>,
}

impl StaticSource {
    pub fn with_user(mut self, username: &str, games: Vec<GameRecord>) -> Self {
        self.games.insert(username.to_string(), games);
        self
    }
}

#[async_trait]
impl GameSource for StaticSource {
    async fn fetch_games(
        &self,
        _platform: Platform,
        username: &str,
        limit: usize,
    ) -> Result<Vec<GameRecord>, WorkerError> {
        match self.games.get(username) {
            Some(games) => Ok(games.iter().take(limit).cloned().collect()),
            None => Err(WorkerError::UserNotFound(username.to_string())),
        }
    }
}

pub fn coordinator(script: Arc<Script>, source: StaticSource, pool_size: usize) -> Arc<JobCoordinator> {
    JobCoordinator::new(
        Arc::new(MemoryStore::new()),
        Arc::new(source),
        evaluator(script, pool_size),
        AnalysisSettings::default(),
        PuzzleSettings::default(),
    )
}

pub fn sans(moves: &str) -> Vec<String> {
    moves.split_whitespace().map(String::from).collect()
}

/// Replay a space-separated SAN list to learn the FENs the pipeline will see
pub fn replayed(moves: &str) -> ReplayedGame {
    replay(&sans(moves), None).expect("legal test game")
}

/// Render SAN moves as PGN movetext with numbers
pub fn pgn(white: &str, black: &str, moves: &str) -> String {
    let mut text = format!("[White \"{white}\"]\n[Black \"{black}\"]\n[Result \"*\"]\n\n");
    for (i, san) in sans(moves).iter().enumerate() {
        if i % 2 == 0 {
            text.push_str(&format!("{}. ", i / 2 + 1));
        }
        text.push_str(san);
        text.push(' ');
    }
    text.push('*');
    text
}

/// Knights out and back, `rounds` times: 4 plies per round
pub fn knight_shuffle(rounds: usize) -> String {
    vec!["Nf3 Nf6 Ng1 Ng8"; rounds].join(" ")
}

pub fn game(id: &str, moves: &str) -> GameRecord {
    GameRecord::new(id, Platform::Lichess, &pgn("alice", "bob", moves))
}

fn rank(status: JobStatus) -> u8 {
    match status {
        JobStatus::Queued => 0,
        JobStatus::Running => 1,
        JobStatus::Completed | JobStatus::Failed => 2,
    }
}

/// Poll until the job is terminal, returning every distinct status seen
pub async fn wait_until_terminal(
    coordinator: &JobCoordinator,
    owner: &str,
    job_id: Uuid,
) -> (JobStatusView, Vec<JobStatus>) {
    let mut seen: Vec<JobStatus> = Vec::new();
    for _ in 0..500 {
        let view = coordinator
            .get_job_status(owner, job_id)
            .await
            .expect("job visible to its owner");
        if seen.last() != Some(&view.status) {
            if let Some(last) = seen.last() {
                assert!(
                    rank(view.status) > rank(*last),
                    "status went from {last} to {}",
                    view.status
                );
            }
            seen.push(view.status);
        }
        if view.status.is_terminal() {
            return (view, seen);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} never reached a terminal status");
}
