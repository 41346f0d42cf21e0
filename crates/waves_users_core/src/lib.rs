//! Core domain logic for the waves user-account backend.
//! This crate is the single source of truth for account and per-user
//! document invariants; transport layers only marshal into `UserService`.

pub mod config;
pub mod credential;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{AppConfig, ConfigError};
pub use credential::{CredentialError, CredentialManager};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::document::{
    DocumentId, EventCollection, EventIdsRequest, EventKind, MembershipUpdate, ProfilePhoto,
};
pub use model::user::{User, UserId, UserPatch, UserType, UserValidationError};
pub use repo::event_repo::{
    normalize_event_id, normalize_event_ids, EventMembershipStore, SqliteEventMembershipStore,
};
pub use repo::photo_repo::{ProfilePhotoStore, SqliteProfilePhotoStore};
pub use repo::user_repo::{RepoError, RepoResult, SqliteUserRepository, UserRepository};
pub use service::user_service::{
    Actor, PasswordChange, Resource, ServiceError, ServiceResult, UserPage, UserService,
    ValidationError,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
