//! Worker configuration from environment variables

use std::env;
use std::str::FromStr;
use std::time::Duration;

use chess_puzzler::puzzle::extraction::DEFAULT_PUZZLE_TARGET;

use crate::error::WorkerError;

/// Swing (either direction) that marks a critical moment
pub const CRITICAL_SWING: i32 = 200;

/// Labels below this drop count as the engine's top choice
pub const GOOD_THRESHOLD: i32 = 10;

#[derive(Clone, Debug)]
pub struct WorkerConfig {
    /// Database connection URL; in-memory store when unset
    pub database_url: Option<String>,

    /// Path to the UCI engine binary
    pub stockfish_path: String,

    /// Maximum number of concurrent engine sessions
    pub pool_size: usize,

    pub engine_threads: u32,
    pub engine_hash_mb: u32,

    /// Longest silence tolerated from the engine during one search
    pub engine_timeout_secs: u64,

    pub analysis: AnalysisSettings,
    pub puzzles: PuzzleSettings,
}

/// Per-game analysis knobs
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnalysisSettings {
    pub depth: u32,
    pub mistake_threshold: i32,
    pub blunder_threshold: i32,
    pub inaccuracy_threshold: i32,
    pub critical_threshold: i32,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            depth: 15,
            mistake_threshold: 100,
            blunder_threshold: 200,
            inaccuracy_threshold: 50,
            critical_threshold: CRITICAL_SWING,
        }
    }
}

impl AnalysisSettings {
    /// Same thresholds, different search depth
    pub fn with_depth(&self, depth: u32) -> Self {
        Self {
            depth,
            ..self.clone()
        }
    }
}

/// Puzzle synthesis knobs
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PuzzleSettings {
    /// Stop once this many puzzles exist
    pub target: usize,
    /// Confirmation depth = analysis depth + bonus
    pub depth_bonus: u32,
    pub prescan_depth: u32,
}

impl Default for PuzzleSettings {
    fn default() -> Self {
        Self {
            target: DEFAULT_PUZZLE_TARGET,
            depth_bonus: 4,
            prescan_depth: 8,
        }
    }
}

impl WorkerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, WorkerError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, WorkerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let stockfish_path =
            lookup("STOCKFISH_PATH").unwrap_or_else(|| "/usr/local/bin/stockfish".to_string());

        let defaults = AnalysisSettings::default();
        let analysis = AnalysisSettings {
            depth: parse_var(&lookup, "ANALYSIS_DEPTH", defaults.depth)?,
            mistake_threshold: parse_var(&lookup, "MISTAKE_THRESHOLD", defaults.mistake_threshold)?,
            blunder_threshold: parse_var(&lookup, "BLUNDER_THRESHOLD", defaults.blunder_threshold)?,
            inaccuracy_threshold: parse_var(
                &lookup,
                "INACCURACY_THRESHOLD",
                defaults.inaccuracy_threshold,
            )?,
            critical_threshold: CRITICAL_SWING,
        };
        if analysis.blunder_threshold < analysis.mistake_threshold {
            return Err(WorkerError::Config(
                "BLUNDER_THRESHOLD must not be below MISTAKE_THRESHOLD".to_string(),
            ));
        }
        if analysis.depth == 0 {
            return Err(WorkerError::Config("ANALYSIS_DEPTH must be positive".to_string()));
        }

        let puzzle_defaults = PuzzleSettings::default();
        let puzzles = PuzzleSettings {
            target: parse_var(&lookup, "PUZZLE_TARGET", puzzle_defaults.target)?,
            depth_bonus: parse_var(&lookup, "PUZZLE_DEPTH_BONUS", puzzle_defaults.depth_bonus)?,
            prescan_depth: parse_var(&lookup, "PUZZLE_PRESCAN_DEPTH", puzzle_defaults.prescan_depth)?,
        };

        let pool_size = parse_var(&lookup, "ENGINE_POOL_SIZE", num_cpus::get())?.max(1);

        Ok(Self {
            database_url: lookup("DATABASE_URL").filter(|v| !v.is_empty()),
            stockfish_path,
            pool_size,
            engine_threads: parse_var(&lookup, "ENGINE_THREADS", 1)?,
            engine_hash_mb: parse_var(&lookup, "ENGINE_HASH_MB", 256)?,
            engine_timeout_secs: parse_var(&lookup, "ENGINE_TIMEOUT_SECS", 30)?,
            analysis,
            puzzles,
        })
    }

    pub fn engine_timeout(&self) -> Duration {
        Duration::from_secs(self.engine_timeout_secs)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T, WorkerError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| WorkerError::Config(format!("{key} is not a valid number: {raw}"))),
        None => Ok(default),
    }
}
