//! What a stage handler reports back to the engine
//!
//! Handlers decide *what happened*; the engine decides what it means for
//! the case's workflow position. Exactly one variant applies per
//! invocation.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageOutcome {
    /// The stage's work is done; move to the next stage
    Advance { summary: String },
    /// A human must sign off before this stage can be re-run
    NeedsHuman { summary: String },
    /// A recoverable failure; the stage may be retried
    Error { error: String, summary: String },
    /// Nothing further to do; the case is complete
    Stop { summary: String },
}

impl StageOutcome {
    pub fn advance(summary: impl Into<String>) -> Self {
        StageOutcome::Advance {
            summary: summary.into(),
        }
    }

    pub fn needs_human(summary: impl Into<String>) -> Self {
        StageOutcome::NeedsHuman {
            summary: summary.into(),
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        let error = error.into();
        StageOutcome::Error {
            summary: error.clone(),
            error,
        }
    }

    pub fn stop(summary: impl Into<String>) -> Self {
        StageOutcome::Stop {
            summary: summary.into(),
        }
    }

    pub fn summary(&self) -> &str {
        match self {
            StageOutcome::Advance { summary }
            | StageOutcome::NeedsHuman { summary }
            | StageOutcome::Error { summary, .. }
            | StageOutcome::Stop { summary } => summary,
        }
    }
}
