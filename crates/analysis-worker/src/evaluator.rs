//! Position evaluation through the engine pool

use std::sync::Arc;

use tracing::{debug, warn};

use crate::engine::{CancelSignal, ProgressFn, SearchRequest};
use crate::error::WorkerError;
use crate::pool::EnginePool;
use crate::uci::EvaluationInfo;

/// Acquires a session per search and releases it afterwards, whatever the outcome
#[derive(Clone)]
pub struct PositionEvaluator {
    pool: Arc<EnginePool>,
}

impl PositionEvaluator {
    pub fn new(pool: Arc<EnginePool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<EnginePool> {
        &self.pool
    }

    /// Best line for a position at the given depth
    pub async fn evaluate(
        &self,
        fen: &str,
        depth: u32,
        cancel: &CancelSignal,
    ) -> Result<EvaluationInfo, WorkerError> {
        let request = SearchRequest::new(fen, depth);
        let lines = self.search(&request, cancel, None).await?;
        first_line(lines)
    }

    /// Same as `evaluate`, reporting every intermediate line
    pub async fn evaluate_with_progress(
        &self,
        fen: &str,
        depth: u32,
        cancel: &CancelSignal,
        progress: &ProgressFn<'_>,
    ) -> Result<EvaluationInfo, WorkerError> {
        let request = SearchRequest::new(fen, depth);
        let lines = self.search(&request, cancel, Some(progress)).await?;
        first_line(lines)
    }

    /// Up to `lines` best lines, ordered best first
    pub async fn evaluate_lines(
        &self,
        fen: &str,
        depth: u32,
        lines: u32,
        cancel: &CancelSignal,
    ) -> Result<Vec<EvaluationInfo>, WorkerError> {
        let request = SearchRequest::new(fen, depth).with_lines(lines);
        self.search(&request, cancel, None).await
    }

    /// Score of one specific root move (UCI), from the side to move
    pub async fn evaluate_move(
        &self,
        fen: &str,
        depth: u32,
        uci: &str,
        cancel: &CancelSignal,
    ) -> Result<EvaluationInfo, WorkerError> {
        let request = SearchRequest::new(fen, depth).restricted_to(uci);
        let lines = self.search(&request, cancel, None).await?;
        first_line(lines)
    }

    /// One search, retried once on a fresh session if the engine died
    async fn search(
        &self,
        request: &SearchRequest,
        cancel: &CancelSignal,
        progress: Option<&ProgressFn<'_>>,
    ) -> Result<Vec<EvaluationInfo>, WorkerError> {
        match self.search_once(request, cancel, progress).await {
            Err(e) if e.kills_session() => {
                warn!(fen = %request.fen, depth = request.depth, error = %e, "Engine failed, retrying once");
                self.search_once(request, cancel, progress).await
            }
            other => other,
        }
    }

    async fn search_once(
        &self,
        request: &SearchRequest,
        cancel: &CancelSignal,
        progress: Option<&ProgressFn<'_>>,
    ) -> Result<Vec<EvaluationInfo>, WorkerError> {
        let mut session = self.pool.acquire(cancel).await?;
        debug!(fen = %request.fen, depth = request.depth, "Searching");
        session.search(request, cancel.clone(), progress).await
    }
}

fn first_line(lines: Vec<EvaluationInfo>) -> Result<EvaluationInfo, WorkerError> {
    lines
        .into_iter()
        .next()
        .ok_or_else(|| WorkerError::Engine("Engine returned no evaluation".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::engine::{never_cancelled, EngineSession};
    use crate::pool::SessionFactory;

    /// Every other session crashes on its first search
    struct FlakySession {
        crash: bool,
        alive: bool,
    }

    #[async_trait]
    impl EngineSession for FlakySession {
        async fn search(
            &mut self,
            request: &SearchRequest,
            _cancel: CancelSignal,
            progress: Option<&ProgressFn<'_>>,
        ) -> Result<Vec<EvaluationInfo>, WorkerError> {
            if self.crash {
                self.alive = false;
                return Err(WorkerError::EngineCrashed);
            }
            let eval = EvaluationInfo {
                depth: request.depth,
                score_centipawns: 42,
                best_move: request.searchmoves.first().cloned().unwrap_or_else(|| "e2e4".into()),
                ..EvaluationInfo::default()
            };
            if let Some(callback) = progress {
                callback(&eval);
            }
            Ok(vec![eval; request.multipv as usize])
        }

        fn is_alive(&self) -> bool {
            self.alive
        }

        async fn quit(&mut self) {}
    }

    struct FlakyFactory {
        made: AtomicUsize,
    }

    #[async_trait]
    impl SessionFactory for FlakyFactory {
        async fn create(&self) -> Result<Box<dyn EngineSession>, WorkerError> {
            let n = self.made.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FlakySession {
                crash: n % 2 == 0,
                alive: true,
            }))
        }
    }

    fn evaluator() -> PositionEvaluator {
        let factory = Arc::new(FlakyFactory {
            made: AtomicUsize::new(0),
        });
        PositionEvaluator::new(Arc::new(EnginePool::new(factory, 1)))
    }

    #[tokio::test]
    async fn test_crash_is_retried_on_fresh_session() {
        let evaluator = evaluator();
        let eval = evaluator.evaluate("fen", 12, &never_cancelled()).await.unwrap();
        assert_eq!(eval.score_centipawns, 42);
        assert_eq!(evaluator.pool().created(), 2);
        assert_eq!(evaluator.pool().idle_count(), 1);
    }

    #[tokio::test]
    async fn test_lines_and_restricted_move() {
        let evaluator = evaluator();
        let cancel = never_cancelled();
        let lines = evaluator.evaluate_lines("fen", 8, 6, &cancel).await.unwrap();
        assert_eq!(lines.len(), 6);
        let eval = evaluator.evaluate_move("fen", 8, "g1f3", &cancel).await.unwrap();
        assert_eq!(eval.best_move, "g1f3");
    }

    #[tokio::test]
    async fn test_progress_reaches_caller() {
        let evaluator = evaluator();
        let seen = AtomicUsize::new(0);
        let on_progress = |_: &EvaluationInfo| {
            seen.fetch_add(1, Ordering::SeqCst);
        };
        evaluator
            .evaluate_with_progress("fen", 5, &never_cancelled(), &on_progress)
            .await
            .unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    /// Fails every search with an error a fresh process would repeat
    struct RefusingSession {
        searches: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EngineSession for RefusingSession {
        async fn search(
            &mut self,
            _request: &SearchRequest,
            _cancel: CancelSignal,
            _progress: Option<&ProgressFn<'_>>,
        ) -> Result<Vec<EvaluationInfo>, WorkerError> {
            self.searches.fetch_add(1, Ordering::SeqCst);
            Err(WorkerError::Engine("Unsupported option".into()))
        }

        fn is_alive(&self) -> bool {
            true
        }

        async fn quit(&mut self) {}
    }

    struct RefusingFactory {
        searches: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SessionFactory for RefusingFactory {
        async fn create(&self) -> Result<Box<dyn EngineSession>, WorkerError> {
            Ok(Box::new(RefusingSession {
                searches: self.searches.clone(),
            }))
        }
    }

    #[tokio::test]
    async fn test_non_fatal_engine_error_is_not_retried() {
        let searches = Arc::new(AtomicUsize::new(0));
        let factory = Arc::new(RefusingFactory {
            searches: searches.clone(),
        });
        let evaluator = PositionEvaluator::new(Arc::new(EnginePool::new(factory, 1)));

        let err = evaluator.evaluate("fen", 12, &never_cancelled()).await.unwrap_err();
        assert!(matches!(err, WorkerError::Engine(_)));
        assert_eq!(searches.load(Ordering::SeqCst), 1);
        assert_eq!(evaluator.pool().created(), 1);
    }

    #[tokio::test]
    async fn test_shut_down_pool_is_not_retried() {
        let evaluator = evaluator();
        evaluator.pool().shutdown().await;
        let err = evaluator.evaluate("fen", 12, &never_cancelled()).await.unwrap_err();
        assert!(!err.kills_session());
        assert_eq!(evaluator.pool().created(), 0);
    }
}
