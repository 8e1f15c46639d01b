//! Job model: status machine, request, progress and the summary written as
//! the job's result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;
use validator::Validate;

use crate::analyzer::{AnalysisStatus, GameAnalysis};
use crate::clients::Platform;
use crate::error::WorkerError;
use crate::puzzles::Puzzle;

pub const DEFAULT_GAME_LIMIT: usize = 10;
pub const DEFAULT_DEPTH: u32 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "QUEUED",
            JobStatus::Running => "RUNNING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }

    /// Position in QUEUED < RUNNING < {COMPLETED, FAILED}
    fn rank(&self) -> u8 {
        match self {
            JobStatus::Queued => 0,
            JobStatus::Running => 1,
            JobStatus::Completed | JobStatus::Failed => 2,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.rank() == 2
    }

    /// Status only moves forward. QUEUED may fail directly (fetch errors,
    /// cancellation before pickup); terminal states never change.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match (self, next) {
            (JobStatus::Queued, JobStatus::Completed) => false,
            _ => next.rank() > self.rank(),
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "QUEUED" => Some(JobStatus::Queued),
            "RUNNING" => Some(JobStatus::Running),
            "COMPLETED" => Some(JobStatus::Completed),
            "FAILED" => Some(JobStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_game_limit() -> usize {
    DEFAULT_GAME_LIMIT
}

fn default_depth() -> u32 {
    DEFAULT_DEPTH
}

/// What the caller asks for when starting a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    pub platform: String,
    #[validate(length(min = 1, max = 64))]
    pub username: String,
    #[serde(default = "default_game_limit")]
    #[validate(range(min = 1, max = 100))]
    pub game_limit: usize,
    #[serde(default = "default_depth")]
    #[validate(range(min = 1, max = 40))]
    pub depth: u32,
}

impl JobRequest {
    pub fn new(platform: Platform, username: &str) -> Self {
        Self {
            platform: platform.as_str().to_string(),
            username: username.to_string(),
            game_limit: DEFAULT_GAME_LIMIT,
            depth: DEFAULT_DEPTH,
        }
    }

    pub fn with_limit(mut self, game_limit: usize) -> Self {
        self.game_limit = game_limit;
        self
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    pub fn platform(&self) -> Result<Platform, WorkerError> {
        self.platform.parse()
    }

    /// Field rules plus a known platform
    pub fn check(&self) -> Result<Platform, WorkerError> {
        self.validate()
            .map_err(|e| WorkerError::InvalidRequest(e.to_string()))?;
        if self.username.trim().is_empty() {
            return Err(WorkerError::InvalidRequest("username must not be blank".into()));
        }
        self.platform()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobPhase {
    Queued,
    Fetching,
    Analyzing,
    Synthesizing,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgress {
    pub games_total: usize,
    pub games_done: usize,
    /// Games recorded as partial or failed; counted in `games_done` too
    pub games_failed: usize,
    pub phase: JobPhase,
}

impl Default for JobProgress {
    fn default() -> Self {
        Self {
            games_total: 0,
            games_done: 0,
            games_failed: 0,
            phase: JobPhase::Queued,
        }
    }
}

/// Per-game line of the job summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameDigest {
    pub game_id: String,
    pub status: AnalysisStatus,
    pub white: String,
    pub black: String,
    pub result: String,
    pub accuracy_white: f64,
    pub accuracy_black: f64,
    pub mistakes: usize,
    pub blunders: usize,
}

impl From<&GameAnalysis> for GameDigest {
    fn from(analysis: &GameAnalysis) -> Self {
        Self {
            game_id: analysis.game_id.clone(),
            status: analysis.status,
            white: analysis.white.clone(),
            black: analysis.black.clone(),
            result: analysis.result.clone(),
            accuracy_white: analysis.accuracy_white,
            accuracy_black: analysis.accuracy_black,
            mistakes: analysis.mistakes.len(),
            blunders: analysis.blunders.len(),
        }
    }
}

/// The job's `result`, rewritten as games complete
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub platform: String,
    pub username: String,
    pub total_games: usize,
    pub games: Vec<GameDigest>,
    pub puzzles: Vec<Puzzle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobSummary {
    pub fn new(request: &JobRequest) -> Self {
        Self {
            platform: request.platform.clone(),
            username: request.username.clone(),
            total_games: 0,
            games: Vec::new(),
            puzzles: Vec::new(),
            error: None,
        }
    }

    pub fn failed(request: &JobRequest, error: &str) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(request)
        }
    }

    pub fn to_value(&self) -> Result<JsonValue, WorkerError> {
        Ok(serde_json::to_value(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: Uuid,
    pub owner: String,
    pub status: JobStatus,
    pub request: JobRequest,
    pub result: Option<JsonValue>,
    pub progress: JobProgress,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(owner: &str, request: JobRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner: owner.to_string(),
            status: JobStatus::Queued,
            request,
            result: None,
            progress: JobProgress::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn view(&self) -> JobStatusView {
        JobStatusView {
            job_id: self.id,
            status: self.status,
            result: self.result.clone(),
            progress: self.progress.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// What a polling caller sees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusView {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub result: Option<JsonValue>,
    pub progress: JobProgress,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
