//! Error types for the casework engine

use casework_types::{ApprovalId, ApprovalStatus, CaseId};
use thiserror::Error;

/// Storage-specific errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Item not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Compare-and-swap lost, or the row is not in the expected state
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Invalid data
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query error
    #[error("Query error: {0}")]
    Query(String),
}

/// Job queue errors
#[derive(Debug, Error)]
pub enum QueueError {
    /// The broker could not be reached
    #[error("Queue unavailable: {0}")]
    Unavailable(String),

    /// The queue no longer accepts jobs
    #[error("Queue closed")]
    Closed,
}

/// Failure raised by a stage handler
///
/// The engine treats every handler error as fatal for the case. Handlers
/// that want a retry return [`casework_types::StageOutcome::Error`]
/// instead.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Errors from resolving a human approval
#[derive(Debug, Error)]
pub enum ApprovalError {
    #[error("Approval not found: {0}")]
    NotFound(ApprovalId),

    #[error("Approval {id} already decided: {status}")]
    AlreadyDecided { id: ApprovalId, status: ApprovalStatus },

    #[error("Case not found for approval: {0}")]
    CaseNotFound(CaseId),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type for a stage handler invocation
pub type HandlerResult = Result<casework_types::StageOutcome, HandlerError>;
