//! Best-effort side effects
//!
//! Audit and approval writes never abort a transition. Every failure is
//! logged with the case and the name of the write.

use casework_types::CaseId;
use std::fmt::Display;
use std::future::Future;

/// Await `effect`, logging and discarding any error
pub async fn best_effort<T, E, F>(write: &'static str, case_id: &CaseId, effect: F) -> Option<T>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    match effect.await {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(
                case_id = %case_id,
                write,
                error = %e,
                "Best-effort write failed"
            );
            None
        }
    }
}
