//! Bounded pool of engine sessions

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use crate::engine::{
    cancelled, is_cancelled, CancelSignal, EngineOptions, EngineSession, ProgressFn, SearchRequest,
    UciSession,
};
use crate::error::WorkerError;
use crate::uci::EvaluationInfo;

/// Creates engine sessions on demand
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn create(&self) -> Result<Box<dyn EngineSession>, WorkerError>;
}

/// Spawns a UCI engine binary per session
pub struct StockfishFactory {
    path: String,
    options: EngineOptions,
}

impl StockfishFactory {
    pub fn new(path: &str, options: EngineOptions) -> Self {
        Self {
            path: path.to_string(),
            options,
        }
    }
}

#[async_trait]
impl SessionFactory for StockfishFactory {
    async fn create(&self) -> Result<Box<dyn EngineSession>, WorkerError> {
        let session = UciSession::spawn(&self.path, &self.options).await?;
        Ok(Box::new(session))
    }
}

type IdleSessions = Arc<Mutex<Vec<Box<dyn EngineSession>>>>;

/// At most `size` sessions exist; each is used by one search at a time
pub struct EnginePool {
    factory: Arc<dyn SessionFactory>,
    permits: Arc<Semaphore>,
    idle: IdleSessions,
    size: usize,
    created: AtomicUsize,
}

impl EnginePool {
    pub fn new(factory: Arc<dyn SessionFactory>, size: usize) -> Self {
        let size = size.max(1);
        info!(size, "Engine pool ready");
        Self {
            factory,
            permits: Arc::new(Semaphore::new(size)),
            idle: Arc::new(Mutex::new(Vec::new())),
            size,
            created: AtomicUsize::new(0),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Sessions created over the pool's lifetime
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().map(|idle| idle.len()).unwrap_or(0)
    }

    /// Wait for a free slot, then hand out an idle session or create one.
    /// Gives up with `SearchCancelled` if the signal fires while waiting.
    pub async fn acquire(&self, cancel: &CancelSignal) -> Result<PooledSession, WorkerError> {
        if is_cancelled(cancel) {
            return Err(WorkerError::SearchCancelled);
        }

        let permit = tokio::select! {
            permit = self.permits.clone().acquire_owned() => permit
                .map_err(|_| WorkerError::Engine("Engine pool is shut down".into()))?,
            _ = cancelled(cancel.clone()) => return Err(WorkerError::SearchCancelled),
        };

        let reused = self.idle.lock().ok().and_then(|mut idle| idle.pop());
        let session = match reused {
            Some(session) => session,
            None => {
                let session = self.factory.create().await?;
                let total = self.created.fetch_add(1, Ordering::SeqCst) + 1;
                debug!(total, "Engine session created");
                session
            }
        };

        Ok(PooledSession {
            session: Some(session),
            idle: self.idle.clone(),
            _permit: permit,
        })
    }

    /// Quit every idle session and refuse further acquisitions
    pub async fn shutdown(&self) {
        self.permits.close();
        let sessions: Vec<_> = match self.idle.lock() {
            Ok(mut idle) => idle.drain(..).collect(),
            Err(_) => Vec::new(),
        };
        let count = sessions.len();
        for mut session in sessions {
            session.quit().await;
        }
        info!(count, "Engine pool shut down");
    }
}

/// Exclusive use of one session; returned to the pool on drop
pub struct PooledSession {
    session: Option<Box<dyn EngineSession>>,
    idle: IdleSessions,
    _permit: OwnedSemaphorePermit,
}

impl PooledSession {
    pub async fn search(
        &mut self,
        request: &SearchRequest,
        cancel: CancelSignal,
        progress: Option<&ProgressFn<'_>>,
    ) -> Result<Vec<EvaluationInfo>, WorkerError> {
        match self.session.as_mut() {
            Some(session) => session.search(request, cancel, progress).await,
            None => Err(WorkerError::EngineCrashed),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.session.as_ref().map(|s| s.is_alive()).unwrap_or(false)
    }
}

impl Drop for PooledSession {
    fn drop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        if !session.is_alive() {
            warn!("Discarding dead engine session");
            return;
        }
        if let Ok(mut idle) = self.idle.lock() {
            idle.push(session);
        }
    }
}
