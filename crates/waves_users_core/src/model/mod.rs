//! Domain model for user accounts and their per-user documents.
//!
//! # Responsibility
//! - Define canonical data structures used by repositories and services.
//! - Keep field rules next to the records they protect.
//!
//! # Invariants
//! - Every record is keyed by a stable `UserId`.
//! - Documents reference users by id only; there is no cross-store join.

pub mod document;
pub mod user;
