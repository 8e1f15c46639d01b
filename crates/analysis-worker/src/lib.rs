//! Game-analysis pipeline: engine sessions, per-game analysis, puzzle
//! synthesis and the job lifecycle around them.

pub mod analysis;
pub mod analyzer;
pub mod clients;
pub mod config;
pub mod coordinator;
pub mod db;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod jobs;
pub mod pool;
pub mod puzzles;
pub mod store;
pub mod uci;

pub use coordinator::JobCoordinator;
pub use error::WorkerError;
