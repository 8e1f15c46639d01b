//! Job Coordinator: owns the job lifecycle from submission to a terminal
//! status, writing partial results as games finish.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::stream::{self, StreamExt};
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::analyzer::{analyze_game, AnalysisStatus, GameAnalysis};
use crate::clients::GameSource;
use crate::config::{AnalysisSettings, PuzzleSettings};
use crate::engine::{cancelled, is_cancelled, CancelSignal};
use crate::error::WorkerError;
use crate::evaluator::PositionEvaluator;
use crate::jobs::{GameDigest, Job, JobPhase, JobProgress, JobRequest, JobStatus, JobStatusView, JobSummary};
use crate::puzzles::synthesize_puzzles;
use crate::store::JobStore;

pub const CANCELLED_REASON: &str = "cancelled";
pub const INTERRUPTED_REASON: &str = "interrupted";

/// Why a run stopped before completing
enum Stop {
    Cancelled,
    Failed(String),
}

impl From<WorkerError> for Stop {
    fn from(err: WorkerError) -> Self {
        if err.is_cancellation() {
            Stop::Cancelled
        } else {
            Stop::Failed(err.to_string())
        }
    }
}

pub struct JobCoordinator {
    store: Arc<dyn JobStore>,
    source: Arc<dyn GameSource>,
    evaluator: PositionEvaluator,
    analysis: AnalysisSettings,
    puzzles: PuzzleSettings,
    cancels: Mutex<HashMap<Uuid, watch::Sender<bool>>>,
}

impl JobCoordinator {
    pub fn new(
        store: Arc<dyn JobStore>,
        source: Arc<dyn GameSource>,
        evaluator: PositionEvaluator,
        analysis: AnalysisSettings,
        puzzles: PuzzleSettings,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            source,
            evaluator,
            analysis,
            puzzles,
            cancels: Mutex::new(HashMap::new()),
        })
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub fn evaluator(&self) -> &PositionEvaluator {
        &self.evaluator
    }

    /// Validate and persist a new QUEUED job owned by `owner`, then run it in
    /// the background
    pub async fn start_job(
        self: &Arc<Self>,
        owner: &str,
        request: JobRequest,
    ) -> Result<Uuid, WorkerError> {
        let (job_id, cancel) = self.submit(owner, request).await?;
        let this = Arc::clone(self);
        tokio::spawn(async move { this.run_job(job_id, cancel).await });
        Ok(job_id)
    }

    /// Submit a job and drive it to a terminal status on the caller's task
    pub async fn run_job_to_end(&self, owner: &str, request: JobRequest) -> Result<Job, WorkerError> {
        let (job_id, cancel) = self.submit(owner, request).await?;
        self.run_job(job_id, cancel).await;
        self.store.get_job(job_id).await
    }

    async fn submit(
        &self,
        owner: &str,
        request: JobRequest,
    ) -> Result<(Uuid, CancelSignal), WorkerError> {
        request.check()?;
        let job = Job::new(owner, request);
        let job_id = self.store.create_job(&job).await?;
        let cancel = self.register(job_id);
        info!(job_id = %job_id, owner, username = %job.request.username, "Job queued");
        Ok((job_id, cancel))
    }

    fn register(&self, job_id: Uuid) -> CancelSignal {
        let (tx, rx) = watch::channel(false);
        if let Ok(mut cancels) = self.cancels.lock() {
            cancels.insert(job_id, tx);
        }
        rx
    }

    fn unregister(&self, job_id: Uuid) {
        if let Ok(mut cancels) = self.cancels.lock() {
            cancels.remove(&job_id);
        }
    }

    /// The job, if `owner` owns it
    async fn owned_job(&self, owner: &str, job_id: Uuid) -> Result<Job, WorkerError> {
        let job = self.store.get_job(job_id).await?;
        if job.owner != owner {
            warn!(job_id = %job_id, "Job requested by a non-owner");
            return Err(WorkerError::OwnershipMismatch);
        }
        Ok(job)
    }

    pub async fn get_job_status(&self, owner: &str, job_id: Uuid) -> Result<JobStatusView, WorkerError> {
        Ok(self.owned_job(owner, job_id).await?.view())
    }

    pub async fn list_game_analyses(
        &self,
        owner: &str,
        job_id: Uuid,
    ) -> Result<Vec<GameAnalysis>, WorkerError> {
        self.owned_job(owner, job_id).await?;
        self.store.list_game_analyses(job_id).await
    }

    /// Ask a job to stop. A running job ends FAILED with reason "cancelled"
    /// once its in-flight searches return; a finished job is left as it is.
    pub async fn cancel_job(&self, owner: &str, job_id: Uuid) -> Result<JobStatusView, WorkerError> {
        let job = self.owned_job(owner, job_id).await?;
        if job.status.is_terminal() {
            return Ok(job.view());
        }

        let signalled = match self.cancels.lock() {
            Ok(cancels) => cancels
                .get(&job_id)
                .map(|tx| tx.send(true).is_ok())
                .unwrap_or(false),
            Err(_) => false,
        };
        info!(job_id = %job_id, signalled, "Cancel requested");

        if signalled {
            return Ok(self.store.get_job(job_id).await?.view());
        }

        // Nothing is running it: fail it here
        let summary = current_summary(&job, CANCELLED_REASON);
        match self
            .store
            .update_job_status(job_id, JobStatus::Failed, Some(summary.to_value()?))
            .await
        {
            Ok(job) => Ok(job.view()),
            Err(WorkerError::InvalidTransition { .. }) => Ok(self.store.get_job(job_id).await?.view()),
            Err(e) => Err(e),
        }
    }

    /// Resume jobs still QUEUED from a previous process and fail the ones it
    /// left RUNNING. Returns (resumed, failed).
    pub async fn recover_on_startup(self: &Arc<Self>) -> Result<(usize, usize), WorkerError> {
        let running = self.store.list_jobs_by_status(JobStatus::Running).await?;
        for job in &running {
            let summary = current_summary(job, INTERRUPTED_REASON);
            self.store
                .update_job_status(job.id, JobStatus::Failed, Some(summary.to_value()?))
                .await?;
            warn!(job_id = %job.id, "Interrupted job marked failed");
        }

        let queued = self.store.list_jobs_by_status(JobStatus::Queued).await?;
        for job in &queued {
            let cancel = self.register(job.id);
            let this = Arc::clone(self);
            let job_id = job.id;
            tokio::spawn(async move { this.run_job(job_id, cancel).await });
        }

        info!(resumed = queued.len(), failed = running.len(), "Job recovery done");
        Ok((queued.len(), running.len()))
    }

    /// Signal every running job to stop
    pub fn cancel_all(&self) {
        if let Ok(cancels) = self.cancels.lock() {
            for tx in cancels.values() {
                let _ = tx.send(true);
            }
        }
    }

    async fn run_job(&self, job_id: Uuid, cancel: CancelSignal) {
        let job = match self.store.get_job(job_id).await {
            Ok(job) => job,
            Err(e) => {
                error!(job_id = %job_id, error = %e, "Job vanished before it started");
                self.unregister(job_id);
                return;
            }
        };

        let mut summary = JobSummary::new(&job.request);
        let mut progress = JobProgress::default();

        let outcome = self.execute(&job, &cancel, &mut summary, &mut progress).await;
        let finished = match outcome {
            Ok(()) => {
                progress.phase = JobPhase::Done;
                self.finish(job_id, JobStatus::Completed, &summary, &progress).await
            }
            Err(stop) => {
                let reason = match stop {
                    Stop::Cancelled => CANCELLED_REASON.to_string(),
                    Stop::Failed(reason) => reason,
                };
                error!(job_id = %job_id, reason = %reason, "Job failed");
                summary.error = Some(reason);
                self.finish(job_id, JobStatus::Failed, &summary, &progress).await
            }
        };
        if let Err(e) = finished {
            error!(job_id = %job_id, error = %e, "Could not record job outcome");
        }
        self.unregister(job_id);
    }

    async fn finish(
        &self,
        job_id: Uuid,
        status: JobStatus,
        summary: &JobSummary,
        progress: &JobProgress,
    ) -> Result<(), WorkerError> {
        let value = summary.to_value()?;
        self.store
            .update_job_result(job_id, value.clone(), progress)
            .await?;
        match self.store.update_job_status(job_id, status, Some(value)).await {
            Ok(job) => {
                info!(job_id = %job_id, status = job.status.as_str(), "Job finished");
                Ok(())
            }
            // Already made terminal elsewhere (cancelled while queued)
            Err(WorkerError::InvalidTransition { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn execute(
        &self,
        job: &Job,
        cancel: &CancelSignal,
        summary: &mut JobSummary,
        progress: &mut JobProgress,
    ) -> Result<(), Stop> {
        let job_id = job.id;
        let request = &job.request;
        let platform = request.platform()?;
        let settings = self.analysis.with_depth(request.depth);

        if is_cancelled(cancel) {
            return Err(Stop::Cancelled);
        }

        progress.phase = JobPhase::Fetching;
        self.store
            .update_job_result(job_id, summary.to_value()?, progress)
            .await?;

        info!(job_id = %job_id, %platform, username = %request.username, limit = request.game_limit, "Fetching games");
        let fetched = tokio::select! {
            fetched = self.source.fetch_games(platform, &request.username, request.game_limit) => fetched,
            _ = cancelled(cancel.clone()) => return Err(Stop::Cancelled),
        };
        let mut games = fetched?;
        games.truncate(request.game_limit);
        if games.is_empty() {
            return Err(WorkerError::NoGamesFound.into());
        }

        self.store
            .update_job_status(job_id, JobStatus::Running, None)
            .await?;
        summary.total_games = games.len();
        progress.games_total = games.len();
        progress.phase = JobPhase::Analyzing;
        self.store
            .update_job_result(job_id, summary.to_value()?, progress)
            .await?;
        info!(job_id = %job_id, games = games.len(), "Analyzing games");

        // Games run in parallel up to the pool size; each game's plies stay in order
        let evaluator = &self.evaluator;
        let settings = &settings;
        let mut results = stream::iter(games.into_iter().enumerate())
            .map(|(index, game)| async move {
                (index, analyze_game(evaluator, &game, settings, cancel).await)
            })
            .buffer_unordered(evaluator.pool().size());

        let mut analyses: Vec<(usize, GameAnalysis)> = Vec::new();
        while let Some((index, result)) = results.next().await {
            if is_cancelled(cancel) {
                return Err(Stop::Cancelled);
            }
            let analysis = result?;

            self.store.append_game_analysis(job_id, &analysis).await?;
            progress.games_done += 1;
            if analysis.status != AnalysisStatus::Analyzed {
                progress.games_failed += 1;
            }
            summary.games.push(GameDigest::from(&analysis));
            self.store
                .update_job_result(job_id, summary.to_value()?, progress)
                .await?;
            info!(
                job_id = %job_id,
                game_id = %analysis.game_id,
                done = progress.games_done,
                total = progress.games_total,
                "Game recorded"
            );
            analyses.push((index, analysis));
        }
        drop(results);

        // Puzzle order ties break on game order, not completion order
        analyses.sort_by_key(|(index, _)| *index);
        let analyses: Vec<GameAnalysis> = analyses.into_iter().map(|(_, a)| a).collect();

        progress.phase = JobPhase::Synthesizing;
        self.store
            .update_job_result(job_id, summary.to_value()?, progress)
            .await?;
        summary.puzzles =
            synthesize_puzzles(&self.evaluator, &analyses, settings, &self.puzzles, cancel).await?;
        Ok(())
    }
}

/// The job's stored summary, or a fresh one, with the failure reason set
fn current_summary(job: &Job, reason: &str) -> JobSummary {
    let stored = job
        .result
        .clone()
        .and_then(|value| serde_json::from_value::<JobSummary>(value).ok());
    match stored {
        Some(summary) => JobSummary {
            error: Some(reason.to_string()),
            ..summary
        },
        None => JobSummary::failed(&job.request, reason),
    }
}
