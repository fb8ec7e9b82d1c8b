//! Default stage handlers

use async_trait::async_trait;
use casework_engine::{HandlerRegistry, HandlerResult, StageHandler};
use casework_types::{Case, Stage, StageOutcome};
use std::sync::Arc;

/// Advances every stage without doing any work, and stops at `close`
///
/// Lets the daemon run end-to-end before domain handlers are plugged in.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThroughHandler;

impl PassThroughHandler {
    pub fn registry() -> HandlerRegistry {
        HandlerRegistry::uniform(Arc::new(PassThroughHandler))
    }
}

#[async_trait]
impl StageHandler for PassThroughHandler {
    async fn handle(&self, case: &Case) -> HandlerResult {
        Ok(match case.stage {
            Stage::Close => StageOutcome::stop("case closed"),
            stage => StageOutcome::advance(format!("{} passed through", stage)),
        })
    }
}
