//! Casework daemon library
//!
//! This module provides the runtime around the case orchestrator:
//! - Configuration loading
//! - A channel-backed job queue
//! - A bounded worker pool with redelivery on recoverable errors
//! - Periodic recovery sweeps
//! - Server lifecycle management

pub mod config;
pub mod error;
pub mod handlers;
pub mod queue;
pub mod server;
pub mod worker;

pub use config::DaemonConfig;
pub use error::{DaemonError, DaemonResult};
pub use handlers::PassThroughHandler;
pub use queue::ChannelQueue;
pub use server::Server;
pub use worker::WorkerPool;
