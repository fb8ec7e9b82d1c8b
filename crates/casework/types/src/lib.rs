//! Casework domain types
//!
//! A case is a support or bug-fix request driven through ten ordered
//! stages by the casework engine. This crate holds the data model shared
//! by the engine, the storage backends and the daemon:
//!
//! - [`Stage`]: the closed, ordered stage table
//! - [`Case`] and [`CasePatch`]: the case snapshot and the typed update
//!   the engine applies to it
//! - [`CaseEvent`]: append-only audit records
//! - [`Approval`]: human gate instances
//! - [`StageOutcome`]: what a stage handler reports back
//!
//! Workflow position (`stage`, `status`) is owned by the engine. Nothing
//! in this crate advances a case on its own.

#![deny(unsafe_code)]

pub mod approval;
pub mod case;
pub mod error;
pub mod event;
pub mod outcome;
pub mod stage;

pub use approval::{Approval, ApprovalDecision, ApprovalId, ApprovalStatus};
pub use case::{Case, CaseId, CasePatch, CaseStatus, OrgId, RiskFlag};
pub use error::TypesError;
pub use event::{CaseEvent, EventId, EventType};
pub use outcome::StageOutcome;
pub use stage::Stage;
