//! Stage handler contract and registry
//!
//! A handler receives an immutable snapshot of the case and reports a
//! [`StageOutcome`]. It may read and write its own domain data but never
//! the case's stage or status.

use crate::error::HandlerResult;
use async_trait::async_trait;
use casework_types::{Case, Stage};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

#[async_trait]
pub trait StageHandler: Send + Sync {
    /// Do the stage's work for `case`
    ///
    /// `Ok` carries the handler's verdict. `Err` (or a panic) is treated
    /// as an unrecoverable defect and fails the case.
    async fn handle(&self, case: &Case) -> HandlerResult;
}

/// Adapts an async closure into a [`StageHandler`]
pub struct FnHandler<F> {
    f: F,
}

impl<F, Fut> FnHandler<F>
where
    F: Fn(Case) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> StageHandler for FnHandler<F>
where
    F: Fn(Case) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn handle(&self, case: &Case) -> HandlerResult {
        (self.f)(case.clone()).await
    }
}

/// Maps each stage to its handler
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<Stage, Arc<dyn StageHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the same handler on every stage
    pub fn uniform(handler: Arc<dyn StageHandler>) -> Self {
        let mut registry = Self::new();
        for stage in Stage::ALL {
            registry.register(stage, handler.clone());
        }
        registry
    }

    /// Register (or replace) the handler for a stage
    pub fn register(&mut self, stage: Stage, handler: Arc<dyn StageHandler>) {
        self.handlers.insert(stage, handler);
    }

    pub fn with(mut self, stage: Stage, handler: Arc<dyn StageHandler>) -> Self {
        self.register(stage, handler);
        self
    }

    pub fn get(&self, stage: Stage) -> Option<Arc<dyn StageHandler>> {
        self.handlers.get(&stage).cloned()
    }

    /// Stages that have no handler, in table order
    pub fn missing_stages(&self) -> Vec<Stage> {
        Stage::ALL
            .into_iter()
            .filter(|s| !self.handlers.contains_key(s))
            .collect()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut stages: Vec<_> = self.handlers.keys().copied().collect();
        stages.sort();
        f.debug_struct("HandlerRegistry")
            .field("stages", &stages)
            .finish()
    }
}
