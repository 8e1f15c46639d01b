use std::sync::Arc;

use analysis_worker::clients::PlatformRouter;
use analysis_worker::config::WorkerConfig;
use analysis_worker::db::PgStore;
use analysis_worker::engine::EngineOptions;
use analysis_worker::evaluator::PositionEvaluator;
use analysis_worker::pool::{EnginePool, StockfishFactory};
use analysis_worker::store::{JobStore, MemoryStore};
use analysis_worker::JobCoordinator;
use server::config::Config;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env();
    let worker_config = WorkerConfig::from_env()?;

    let store: Arc<dyn JobStore> = match &worker_config.database_url {
        Some(url) => {
            tracing::info!("Connecting to database...");
            Arc::new(PgStore::connect(url).await?)
        }
        None => {
            tracing::warn!("DATABASE_URL not set - jobs are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let factory = Arc::new(StockfishFactory::new(
        &worker_config.stockfish_path,
        EngineOptions::from_config(&worker_config),
    ));
    let pool = Arc::new(EnginePool::new(factory, worker_config.pool_size));

    let coordinator = JobCoordinator::new(
        store,
        Arc::new(PlatformRouter::new()?),
        PositionEvaluator::new(pool.clone()),
        worker_config.analysis.clone(),
        worker_config.puzzles.clone(),
    );
    coordinator.recover_on_startup().await?;

    let app = server::router(coordinator.clone());

    let addr = config.addr();
    tracing::info!("Starting server on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;

    coordinator.cancel_all();
    pool.shutdown().await;
    Ok(())
}
