//! Errors raised while parsing casework values

use thiserror::Error;

/// Parse failures for the string forms of casework enums
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypesError {
    #[error("Unknown stage: {0}")]
    UnknownStage(String),

    #[error("Unknown case status: {0}")]
    UnknownStatus(String),

    #[error("Unknown approval status: {0}")]
    UnknownApprovalStatus(String),

    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    #[error("Invalid risk flag: {0:?}")]
    InvalidRiskFlag(String),
}
