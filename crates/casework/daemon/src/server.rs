//! Server setup and lifecycle management

use crate::config::{DaemonConfig, StorageConfig};
use crate::error::DaemonResult;
use crate::handlers::PassThroughHandler;
use crate::queue::ChannelQueue;
use crate::worker::WorkerPool;
use casework_engine::{
    ApprovalDesk, CaseOrchestrator, HandlerRegistry, InMemoryRepository, Job, Queue,
    RecoverySweep, Repository,
};
use casework_postgres::PostgresRepository;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::Duration;

/// Casework daemon server
pub struct Server {
    config: DaemonConfig,
    repo: Arc<dyn Repository>,
    queue: Arc<dyn Queue>,
    jobs: mpsc::Receiver<Job>,
    orchestrator: CaseOrchestrator,
    recovery: RecoverySweep,
}

impl Server {
    /// Create a server running the pass-through handlers on every stage
    pub async fn new(config: DaemonConfig) -> DaemonResult<Self> {
        Self::with_handlers(config, PassThroughHandler::registry()).await
    }

    pub async fn with_handlers(config: DaemonConfig, handlers: HandlerRegistry) -> DaemonResult<Self> {
        let repo: Arc<dyn Repository> = match &config.storage {
            StorageConfig::Memory => {
                tracing::info!("Using in-memory storage");
                Arc::new(InMemoryRepository::new())
            }
            StorageConfig::Postgres {
                url,
                max_connections,
                connect_timeout_secs,
            } => {
                tracing::info!(max_connections, "Connecting to PostgreSQL storage");
                Arc::new(PostgresRepository::connect(url, *max_connections, *connect_timeout_secs).await?)
            }
        };

        let missing = handlers.missing_stages();
        if !missing.is_empty() {
            tracing::warn!(?missing, "Stages without a handler will fail any case that reaches them");
        }

        let (queue, jobs) = ChannelQueue::new(config.worker.queue_capacity);
        let queue: Arc<dyn Queue> = Arc::new(queue);

        let orchestrator = CaseOrchestrator::new(repo.clone(), queue.clone(), handlers);
        let recovery = RecoverySweep::new(
            repo.clone(),
            queue.clone(),
            chrono::Duration::seconds(config.recovery.stale_after_secs as i64),
            config.recovery.batch_size,
        );

        Ok(Self {
            config,
            repo,
            queue,
            jobs,
            orchestrator,
            recovery,
        })
    }

    pub fn repository(&self) -> Arc<dyn Repository> {
        self.repo.clone()
    }

    pub fn queue(&self) -> Arc<dyn Queue> {
        self.queue.clone()
    }

    /// Desk for recording human decisions against this server's storage and queue
    pub fn approval_desk(&self) -> ApprovalDesk {
        ApprovalDesk::new(self.repo.clone(), self.queue.clone())
    }

    /// Run until a shutdown signal arrives
    pub async fn run(self) -> DaemonResult<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Run until `shutdown` resolves, then drain in-flight deliveries
    pub async fn run_until(self, shutdown: impl std::future::Future<Output = ()>) -> DaemonResult<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let pool = WorkerPool::new(
            self.orchestrator,
            self.queue.clone(),
            self.config.worker.concurrency,
            Duration::from_millis(self.config.worker.retry_backoff_ms),
        );
        let workers = tokio::spawn(pool.run(self.jobs, shutdown_rx.clone()));

        let sweeper = tokio::spawn(recovery_loop(
            self.recovery,
            Duration::from_secs(self.config.recovery.interval_secs.max(1)),
            shutdown_rx,
        ));

        tracing::info!(
            concurrency = self.config.worker.concurrency,
            recovery_interval_secs = self.config.recovery.interval_secs,
            "Casework daemon running"
        );

        shutdown.await;
        tracing::info!("Casework daemon shutting down");

        let _ = shutdown_tx.send(true);
        if let Err(e) = sweeper.await {
            tracing::error!(error = %e, "Recovery loop terminated abnormally");
        }
        if let Err(e) = workers.await {
            tracing::error!(error = %e, "Worker pool terminated abnormally");
        }

        Ok(())
    }
}

/// Sweep once at startup, then every `interval`
async fn recovery_loop(sweep: RecoverySweep, interval: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = sweep.run_once().await {
                    tracing::error!(error = %e, "Recovery sweep failed");
                }
            }
            _ = shutdown.changed() => break,
        }
        if *shutdown.borrow() {
            break;
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casework_engine::CaseStorage;
    use casework_types::{Case, CaseStatus, OrgId, Stage};

    fn fast_config() -> DaemonConfig {
        let mut config = DaemonConfig::default();
        config.worker.retry_backoff_ms = 1;
        config.recovery.interval_secs = 1;
        config
    }

    #[tokio::test]
    async fn recovery_picks_up_seeded_case() {
        let server = Server::new(fast_config()).await.unwrap();
        let repo = server.repository();
        let case = Case::new(OrgId::new("acme"), "Nightly invoice export");
        repo.insert_case(case.clone()).await.unwrap();

        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let running = tokio::spawn(server.run_until(async move {
            let _ = stop_rx.await;
        }));

        let mut status = CaseStatus::Open;
        for _ in 0..300 {
            status = repo.get_case(&case.id).await.unwrap().unwrap().status;
            if status == CaseStatus::Completed {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(status, CaseStatus::Completed);

        let done = repo.get_case(&case.id).await.unwrap().unwrap();
        assert_eq!(done.stage, Stage::Close);

        stop_tx.send(()).unwrap();
        running.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn shuts_down_when_signalled() {
        let server = Server::new(fast_config()).await.unwrap();
        server.run_until(async {}).await.unwrap();
    }
}
