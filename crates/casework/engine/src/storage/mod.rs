//! Storage layer for the casework engine
//!
//! The engine reaches the persistent store only through [`Repository`].

mod memory;
mod traits;

pub use memory::InMemoryRepository;
pub use traits::{ApprovalStorage, CaseStorage, EventStorage, Repository};
