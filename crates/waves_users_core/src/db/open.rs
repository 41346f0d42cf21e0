//! Connection bootstrap utilities for the user and document stores.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections for either store.
//! - Configure connection pragmas required by core behavior.
//! - Trigger store-specific migrations before returning a usable connection.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON` and a busy timeout.
//! - Returned connections have migrations fully applied.

use super::migrations::{apply_migrations, StoreKind};
use super::DbResult;
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens the relational user store at `path` and applies pending migrations.
pub fn open_user_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    open_store(StoreKind::Users, "file", || Connection::open(path))
}

/// Opens an in-memory relational user store.
pub fn open_user_db_in_memory() -> DbResult<Connection> {
    open_store(StoreKind::Users, "memory", Connection::open_in_memory)
}

/// Opens the document store at `path` and applies pending migrations.
pub fn open_document_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    open_store(StoreKind::Documents, "file", || Connection::open(path))
}

/// Opens an in-memory document store.
pub fn open_document_db_in_memory() -> DbResult<Connection> {
    open_store(StoreKind::Documents, "memory", Connection::open_in_memory)
}

/// # Side effects
/// - Emits `db_open` logging events with store, mode, duration and status.
fn open_store<F>(store: StoreKind, mode: &str, open: F) -> DbResult<Connection>
where
    F: FnOnce() -> rusqlite::Result<Connection>,
{
    let started_at = Instant::now();
    let store_name = store.as_str();
    info!("event=db_open module=db status=start store={store_name} mode={mode}");

    let mut conn = open().map_err(|err| {
        error!(
            "event=db_open module=db status=error store={store_name} mode={mode} duration_ms={} error_code=db_open_failed error={err}",
            started_at.elapsed().as_millis()
        );
        err
    })?;

    if let Err(err) = bootstrap_connection(&mut conn, store) {
        error!(
            "event=db_open module=db status=error store={store_name} mode={mode} duration_ms={} error_code=db_bootstrap_failed error={err}",
            started_at.elapsed().as_millis()
        );
        return Err(err);
    }

    info!(
        "event=db_open module=db status=ok store={store_name} mode={mode} duration_ms={}",
        started_at.elapsed().as_millis()
    );
    Ok(conn)
}

fn bootstrap_connection(conn: &mut Connection, store: StoreKind) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    apply_migrations(conn, store)?;
    Ok(())
}
