//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for the user store and
//!   the document store.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository APIs return semantic outcomes (`NotFound`, `NoChange`,
//!   `Conflict`) separately from store faults.
//! - Document-store mutations run inside `db::session::run_in_session`.

pub mod event_repo;
pub mod photo_repo;
pub mod user_repo;
