//! Persistence plumbing shared by the user store and the document store.
//!
//! Two SQLite databases back the crate: `users` holds authoritative account
//! rows, `documents` holds profile photos and event collections. Each has its
//! own migration list tracked in `PRAGMA user_version`, and no repository
//! touches a connection that `open` has not fully migrated.
//!
//! Document-store writes go through [`session::run_in_session`].

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;
pub mod session;

pub use migrations::StoreKind;
pub use open::{open_document_db, open_document_db_in_memory, open_user_db, open_user_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// Document payload could not be encoded or decoded.
    Json(serde_json::Error),
    /// A stored column holds a value the model does not accept.
    InvalidData(String),
    UnsupportedSchemaVersion {
        store: StoreKind,
        db_version: u32,
        latest_supported: u32,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Json(err) => write!(f, "invalid document payload: {err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::UnsupportedSchemaVersion {
                store,
                db_version,
                latest_supported,
            } => write!(
                f,
                "{} schema version {db_version} is newer than supported {latest_supported}",
                store.as_str()
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Json(err) => Some(err),
            Self::InvalidData(_) | Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl DbError {
    /// Whether the fault is a `UNIQUE` or `PRIMARY KEY` violation.
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            Self::Sqlite(rusqlite::Error::SqliteFailure(failure, _))
                if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        )
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<serde_json::Error> for DbError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}
