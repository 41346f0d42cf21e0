//! SQLite migration registry and executor for both stores.
//!
//! # Responsibility
//! - Register schema migrations per store in strictly increasing order.
//! - Apply pending migrations atomically.
//!
//! # Invariants
//! - `version` values must remain monotonic within one store.
//! - Applied migration version is mirrored to `PRAGMA user_version`.

use crate::db::{DbError, DbResult};
use rusqlite::Connection;

/// Which logical store a connection backs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// Authoritative relational user records.
    Users,
    /// Per-user documents: profile photos and event collections.
    Documents,
}

impl StoreKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Documents => "documents",
        }
    }

    fn migrations(self) -> &'static [Migration] {
        match self {
            Self::Users => USER_MIGRATIONS,
            Self::Documents => DOCUMENT_MIGRATIONS,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    sql: &'static str,
}

const USER_MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        sql: include_str!("users_0001_init.sql"),
    },
    Migration {
        version: 2,
        sql: include_str!("users_0002_revision.sql"),
    },
];

const DOCUMENT_MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: include_str!("documents_0001_init.sql"),
}];

/// Returns the latest migration version known by this binary for `store`.
pub fn latest_version(store: StoreKind) -> u32 {
    store
        .migrations()
        .last()
        .map_or(0, |migration| migration.version)
}

/// Applies all pending migrations of `store` on the provided connection.
pub fn apply_migrations(conn: &mut Connection, store: StoreKind) -> DbResult<()> {
    let current_version = schema_version(conn)?;
    let latest = latest_version(store);

    if current_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            store,
            db_version: current_version,
            latest_supported: latest,
        });
    }

    if current_version == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in store
        .migrations()
        .iter()
        .filter(|migration| migration.version > current_version)
    {
        tx.execute_batch(migration.sql)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
    }
    tx.commit()?;

    Ok(())
}

/// Reads the applied schema version of an open connection.
pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
