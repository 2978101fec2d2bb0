//! Montage-sheet pipeline worker binary.

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use montage_analyzer::{AnalyzerClient, AnalyzerPool};
use montage_persistence::repos::{EntryRepository, SheetRepository, VideoRepository};
use montage_persistence::DocumentStoreClient;
use montage_queue::JobQueue;
use montage_storage::ObjectStoreClient;
use montage_worker::{JobExecutor, Orchestrator, WorkerConfig};

#[tokio::main]
async fn main() {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(EnvFilter::from_default_env().add_directive("montage=info".parse().unwrap()))
        .init();

    info!("Starting montage-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    let queue = match JobQueue::from_env() {
        Ok(q) => q,
        Err(e) => {
            error!("Failed to create job queue: {}", e);
            std::process::exit(1);
        }
    };

    let docstore = match DocumentStoreClient::from_env().await {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to create document store client: {}", e);
            std::process::exit(1);
        }
    };
    let video_repo = VideoRepository::new(docstore.clone());
    let sheet_repo = SheetRepository::new(docstore.clone());
    let entry_repo = EntryRepository::new(docstore);

    let storage = match ObjectStoreClient::from_env().await {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to create object store client: {}", e);
            std::process::exit(1);
        }
    };

    let analyzer_pool = match AnalyzerPool::from_env() {
        Ok(p) => p,
        Err(e) => {
            error!("Failed to create analyzer pool: {}", e);
            std::process::exit(1);
        }
    };
    let analyzer_client = match AnalyzerClient::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to create analyzer client: {}", e);
            std::process::exit(1);
        }
    };

    let orchestrator = Orchestrator::new(
        video_repo,
        sheet_repo,
        entry_repo,
        storage,
        analyzer_pool,
        analyzer_client,
    );

    let executor = JobExecutor::new(config, queue, orchestrator);

    let shutdown_handle = tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
    });

    if let Err(e) = executor.run().await {
        error!("Executor error: {}", e);
        std::process::exit(1);
    }

    shutdown_handle.await.ok();

    info!("Worker shutdown complete");
}
