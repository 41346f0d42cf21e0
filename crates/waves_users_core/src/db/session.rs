//! Scoped document-store sessions.
//!
//! # Responsibility
//! - Wrap one read-modify-write sequence in a single SQLite transaction.
//! - Commit on success and roll back on every other exit path.
//!
//! # Invariants
//! - Sessions start with `BEGIN IMMEDIATE`, so the write lock is held before
//!   the first read of the sequence.
//! - A typed abort or a store fault rolls the session back before the error
//!   is returned. Unwinding drops the transaction, which also rolls back.
//! - Nothing runs after a successful commit, so a committed session is never
//!   reported as failed.

use crate::db::DbError;
use log::{debug, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Named reasons a session body may decide not to commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAbort {
    /// The requested mutation would not change stored state.
    NoChange,
    /// The document the mutation targets does not exist.
    NotFound,
    /// The document revision moved between read and write.
    Conflict,
}

impl SessionAbort {
    fn as_str(self) -> &'static str {
        match self {
            Self::NoChange => "no_change",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
        }
    }
}

/// Error returned by a session that did not commit.
#[derive(Debug)]
pub enum SessionError {
    /// Body requested an abort; the session was rolled back.
    Aborted(SessionAbort),
    /// Store fault while starting, running or committing; rolled back.
    Store(DbError),
}

pub type SessionResult<T> = Result<T, SessionError>;

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Aborted(reason) => write!(f, "session aborted: {}", reason.as_str()),
            Self::Store(err) => write!(f, "session store fault: {err}"),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Aborted(_) => None,
            Self::Store(err) => Some(err),
        }
    }
}

impl From<DbError> for SessionError {
    fn from(value: DbError) -> Self {
        Self::Store(value)
    }
}

impl From<rusqlite::Error> for SessionError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Store(DbError::Sqlite(value))
    }
}

impl From<SessionAbort> for SessionError {
    fn from(value: SessionAbort) -> Self {
        Self::Aborted(value)
    }
}

/// Runs `body` inside one immediate transaction on `conn`.
///
/// `operation` is a static label used only for diagnostics.
///
/// # Errors
/// - `SessionError::Aborted` when `body` returned an abort.
/// - `SessionError::Store` when the transaction could not start, `body` hit a
///   store fault, or the commit itself failed.
pub fn run_in_session<T, F>(conn: &Connection, operation: &'static str, body: F) -> SessionResult<T>
where
    F: FnOnce(&Transaction<'_>) -> SessionResult<T>,
{
    let started_at = Instant::now();
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

    match body(&tx) {
        Ok(value) => {
            tx.commit()?;
            debug!(
                "event=doc_session module=db status=commit op={operation} duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(value)
        }
        Err(err) => {
            let reason = match &err {
                SessionError::Aborted(reason) => reason.as_str(),
                SessionError::Store(_) => "store_fault",
            };
            if let Err(rollback_err) = tx.rollback() {
                warn!(
                    "event=doc_session module=db status=rollback_failed op={operation} error={rollback_err}"
                );
            }
            debug!(
                "event=doc_session module=db status=abort op={operation} reason={reason} duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Err(err)
        }
    }
}
