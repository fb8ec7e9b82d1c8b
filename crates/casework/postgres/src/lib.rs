//! PostgreSQL storage for casework
//!
//! Cases, the audit log and approvals live in three tables. Case updates
//! are compare-and-swap on the `version` column.

#![deny(unsafe_code)]

mod repository;
mod rows;

pub use repository::PostgresRepository;
