//! Job persistence. The coordinator only talks to `JobStore`; `MemoryStore`
//! backs tests and the CLI, `PgStore` (db.rs) backs the server.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::analyzer::GameAnalysis;
use crate::error::WorkerError;
use crate::jobs::{Job, JobProgress, JobStatus};

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create_job(&self, job: &Job) -> Result<Uuid, WorkerError>;

    async fn get_job(&self, job_id: Uuid) -> Result<Job, WorkerError>;

    /// Move the job forward. A regression fails with `InvalidTransition`;
    /// `result`, when given, replaces the stored result.
    async fn update_job_status(
        &self,
        job_id: Uuid,
        status: JobStatus,
        result: Option<JsonValue>,
    ) -> Result<Job, WorkerError>;

    /// Replace the partial result and progress without touching the status
    async fn update_job_result(
        &self,
        job_id: Uuid,
        result: JsonValue,
        progress: &JobProgress,
    ) -> Result<(), WorkerError>;

    async fn append_game_analysis(
        &self,
        job_id: Uuid,
        analysis: &GameAnalysis,
    ) -> Result<(), WorkerError>;

    /// In the order they were appended
    async fn list_game_analyses(&self, job_id: Uuid) -> Result<Vec<GameAnalysis>, WorkerError>;

    async fn list_jobs_by_status(&self, status: JobStatus) -> Result<Vec<Job>, WorkerError>;
}

/// Progress counters never go backwards, whatever order writes land in
pub(crate) fn merge_progress(current: &JobProgress, incoming: &JobProgress) -> JobProgress {
    JobProgress {
        games_total: current.games_total.max(incoming.games_total),
        games_done: current.games_done.max(incoming.games_done),
        games_failed: current.games_failed.max(incoming.games_failed),
        phase: incoming.phase,
    }
}

pub(crate) fn check_transition(from: JobStatus, to: JobStatus) -> Result<(), WorkerError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(WorkerError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

#[derive(Default)]
pub struct MemoryStore {
    jobs: RwLock<HashMap<Uuid, Job>>,
    analyses: RwLock<HashMap<Uuid, Vec<GameAnalysis>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn create_job(&self, job: &Job) -> Result<Uuid, WorkerError> {
        self.jobs.write().await.insert(job.id, job.clone());
        Ok(job.id)
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Job, WorkerError> {
        self.jobs
            .read()
            .await
            .get(&job_id)
            .cloned()
            .ok_or(WorkerError::JobNotFound)
    }

    async fn update_job_status(
        &self,
        job_id: Uuid,
        status: JobStatus,
        result: Option<JsonValue>,
    ) -> Result<Job, WorkerError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&job_id).ok_or(WorkerError::JobNotFound)?;
        check_transition(job.status, status)?;
        job.status = status;
        if let Some(result) = result {
            job.result = Some(result);
        }
        job.updated_at = Utc::now();
        Ok(job.clone())
    }

    async fn update_job_result(
        &self,
        job_id: Uuid,
        result: JsonValue,
        progress: &JobProgress,
    ) -> Result<(), WorkerError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&job_id).ok_or(WorkerError::JobNotFound)?;
        job.result = Some(result);
        job.progress = merge_progress(&job.progress, progress);
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn append_game_analysis(
        &self,
        job_id: Uuid,
        analysis: &GameAnalysis,
    ) -> Result<(), WorkerError> {
        if !self.jobs.read().await.contains_key(&job_id) {
            return Err(WorkerError::JobNotFound);
        }
        self.analyses
            .write()
            .await
            .entry(job_id)
            .or_default()
            .push(analysis.clone());
        Ok(())
    }

    async fn list_game_analyses(&self, job_id: Uuid) -> Result<Vec<GameAnalysis>, WorkerError> {
        if !self.jobs.read().await.contains_key(&job_id) {
            return Err(WorkerError::JobNotFound);
        }
        Ok(self
            .analyses
            .read()
            .await
            .get(&job_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_jobs_by_status(&self, status: JobStatus) -> Result<Vec<Job>, WorkerError> {
        let mut jobs: Vec<Job> = self
            .jobs
            .read()
            .await
            .values()
            .filter(|j| j.status == status)
            .cloned()
            .collect();
        jobs.sort_by_key(|j| j.created_at);
        Ok(jobs)
    }
}
