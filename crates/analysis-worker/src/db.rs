//! Postgres-backed job store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgPool, PgPoolOptions};
use uuid::Uuid;

use crate::analyzer::GameAnalysis;
use crate::error::WorkerError;
use crate::jobs::{Job, JobProgress, JobStatus};
use crate::store::{check_transition, merge_progress, JobStore};

/// Fold new progress into the stored column. Unreadable stored progress is
/// an error; resetting it would let counters go backwards.
fn merge_stored_progress(stored: JsonValue, progress: &JobProgress) -> Result<JobProgress, WorkerError> {
    let current: JobProgress = serde_json::from_value(stored)?;
    Ok(merge_progress(&current, progress))
}

pub async fn create_pool(database_url: &str) -> Result<PgPool, WorkerError> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    Ok(pool)
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS analysis_jobs (
    id          UUID PRIMARY KEY,
    owner       TEXT NOT NULL,
    status      TEXT NOT NULL,
    request     JSONB NOT NULL,
    result      JSONB,
    progress    JSONB NOT NULL,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_analysis_jobs_status ON analysis_jobs (status);
CREATE INDEX IF NOT EXISTS idx_analysis_jobs_owner  ON analysis_jobs (owner);

CREATE TABLE IF NOT EXISTS job_game_analyses (
    id          BIGSERIAL PRIMARY KEY,
    job_id      UUID NOT NULL REFERENCES analysis_jobs(id) ON DELETE CASCADE,
    game_id     TEXT NOT NULL,
    analysis    JSONB NOT NULL,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_job_game_analyses_job ON job_game_analyses (job_id);
"#;

type JobRow = (
    Uuid,
    String,
    String,
    JsonValue,
    Option<JsonValue>,
    JsonValue,
    DateTime<Utc>,
    DateTime<Utc>,
);

const JOB_COLUMNS: &str =
    "id, owner, status, request, result, progress, created_at, updated_at";

fn job_from_row(row: JobRow) -> Result<Job, WorkerError> {
    let (id, owner, status, request, result, progress, created_at, updated_at) = row;
    let status = parse_status(&status)?;
    Ok(Job {
        id,
        owner,
        status,
        request: serde_json::from_value(request)?,
        result,
        progress: serde_json::from_value(progress)?,
        created_at,
        updated_at,
    })
}

fn parse_status(status: &str) -> Result<JobStatus, WorkerError> {
    JobStatus::parse(status).ok_or_else(|| {
        WorkerError::Database(sqlx::Error::Decode(
            format!("unknown job status: {status}").into(),
        ))
    })
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, WorkerError> {
        let store = Self::new(create_pool(database_url).await?);
        store.run_migrations().await?;
        Ok(store)
    }

    /// Create the job tables if they do not exist yet
    pub async fn run_migrations(&self) -> Result<(), WorkerError> {
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn job_exists(&self, job_id: Uuid) -> Result<bool, WorkerError> {
        let row: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM analysis_jobs WHERE id = $1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }
}

#[async_trait]
impl JobStore for PgStore {
    async fn create_job(&self, job: &Job) -> Result<Uuid, WorkerError> {
        sqlx::query(
            r#"INSERT INTO analysis_jobs (id, owner, status, request, result, progress, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"#,
        )
        .bind(job.id)
        .bind(&job.owner)
        .bind(job.status.as_str())
        .bind(serde_json::to_value(&job.request)?)
        .bind(&job.result)
        .bind(serde_json::to_value(&job.progress)?)
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(job.id)
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Job, WorkerError> {
        let row: Option<JobRow> =
            sqlx::query_as(&format!("SELECT {JOB_COLUMNS} FROM analysis_jobs WHERE id = $1"))
                .bind(job_id)
                .fetch_optional(&self.pool)
                .await?;
        job_from_row(row.ok_or(WorkerError::JobNotFound)?)
    }

    async fn update_job_status(
        &self,
        job_id: Uuid,
        status: JobStatus,
        result: Option<JsonValue>,
    ) -> Result<Job, WorkerError> {
        let mut tx = self.pool.begin().await?;

        let current: Option<(String,)> =
            sqlx::query_as("SELECT status FROM analysis_jobs WHERE id = $1 FOR UPDATE")
                .bind(job_id)
                .fetch_optional(&mut *tx)
                .await?;
        let (current,) = current.ok_or(WorkerError::JobNotFound)?;
        check_transition(parse_status(&current)?, status)?;

        let row: JobRow = sqlx::query_as(&format!(
            r#"UPDATE analysis_jobs
               SET status = $2, result = COALESCE($3, result), updated_at = NOW()
               WHERE id = $1
               RETURNING {JOB_COLUMNS}"#
        ))
        .bind(job_id)
        .bind(status.as_str())
        .bind(result)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        job_from_row(row)
    }

    async fn update_job_result(
        &self,
        job_id: Uuid,
        result: JsonValue,
        progress: &JobProgress,
    ) -> Result<(), WorkerError> {
        let mut tx = self.pool.begin().await?;

        let current: Option<(JsonValue,)> =
            sqlx::query_as("SELECT progress FROM analysis_jobs WHERE id = $1 FOR UPDATE")
                .bind(job_id)
                .fetch_optional(&mut *tx)
                .await?;
        let (current,) = current.ok_or(WorkerError::JobNotFound)?;
        let merged = merge_stored_progress(current, progress)?;

        sqlx::query(
            "UPDATE analysis_jobs SET result = $2, progress = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(job_id)
        .bind(result)
        .bind(serde_json::to_value(&merged)?)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn append_game_analysis(
        &self,
        job_id: Uuid,
        analysis: &GameAnalysis,
    ) -> Result<(), WorkerError> {
        if !self.job_exists(job_id).await? {
            return Err(WorkerError::JobNotFound);
        }
        sqlx::query(
            "INSERT INTO job_game_analyses (job_id, game_id, analysis) VALUES ($1, $2, $3)",
        )
        .bind(job_id)
        .bind(&analysis.game_id)
        .bind(serde_json::to_value(analysis)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_game_analyses(&self, job_id: Uuid) -> Result<Vec<GameAnalysis>, WorkerError> {
        if !self.job_exists(job_id).await? {
            return Err(WorkerError::JobNotFound);
        }
        let rows: Vec<(JsonValue,)> = sqlx::query_as(
            "SELECT analysis FROM job_game_analyses WHERE job_id = $1 ORDER BY id",
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(value,)| serde_json::from_value(value).map_err(WorkerError::from))
            .collect()
    }

    async fn list_jobs_by_status(&self, status: JobStatus) -> Result<Vec<Job>, WorkerError> {
        let rows: Vec<JobRow> = sqlx::query_as(&format!(
            "SELECT {JOB_COLUMNS} FROM analysis_jobs WHERE status = $1 ORDER BY created_at"
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(job_from_row).collect()
    }
}
