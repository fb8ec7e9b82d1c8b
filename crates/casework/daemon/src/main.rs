//! Casework daemon
//!
//! Runs the case orchestrator behind a bounded worker pool, with a
//! periodic recovery sweep for cases left unscheduled.

use casework_daemon::config::StorageConfig;
use casework_daemon::error::DaemonError;
use casework_daemon::{DaemonConfig, DaemonResult, Server};
use casework_engine::{CaseStorage, Queue};
use casework_types::{Case, OrgId, RiskFlag, Stage};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Casework daemon CLI
#[derive(Parser)]
#[command(name = "caseworkd")]
#[command(about = "Casework daemon - staged case orchestration worker", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "CASEWORK_CONFIG")]
    config: Option<String>,

    /// Log level (overrides configuration)
    #[arg(long, env = "CASEWORK_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "CASEWORK_LOG_JSON")]
    json: bool,

    /// Maximum concurrent deliveries (overrides configuration)
    #[arg(long)]
    concurrency: Option<usize>,

    /// Seed this many demo cases at startup (in-memory storage only)
    #[arg(long, default_value_t = 0)]
    seed: usize,
}

#[tokio::main]
async fn main() -> DaemonResult<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = DaemonConfig::load(cli.config.as_deref())?;

    // Override with CLI args
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if cli.json {
        config.logging.json = true;
    }
    if let Some(concurrency) = cli.concurrency {
        config.worker.concurrency = concurrency;
    }

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    if cli.seed > 0 && !matches!(config.storage, StorageConfig::Memory) {
        return Err(DaemonError::Config(
            "--seed is only supported with in-memory storage".to_string(),
        ));
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting caseworkd");

    let server = Server::new(config).await?;
    if cli.seed > 0 {
        seed_demo_cases(&server, cli.seed).await?;
    }
    server.run().await
}

/// Insert demo cases and schedule their first stage. Every third case
/// carries a sensitive flag so the review gates are exercised.
async fn seed_demo_cases(server: &Server, count: usize) -> DaemonResult<()> {
    let repo = server.repository();
    let queue = server.queue();
    let org = OrgId::new("demo");

    for n in 0..count {
        let mut case = Case::new(org.clone(), format!("Demo case {}", n + 1));
        if n % 3 == 2 {
            let flag = RiskFlag::new("billing").map_err(|e| DaemonError::Config(e.to_string()))?;
            case = case.with_risk_flag(flag);
        }
        repo.insert_case(case.clone()).await?;
        if let Err(e) = queue.enqueue(&case.id, Stage::FIRST).await {
            tracing::warn!(case_id = %case.id, error = %e, "Seed enqueue failed; recovery sweep will pick it up");
        }
    }

    tracing::info!(count, "Seeded demo cases");
    Ok(())
}
