//! Event membership stores (saved / attended) over the document store.
//!
//! # Responsibility
//! - Keep one set of opaque event identifiers per `(user, kind)`.
//! - Apply set-union adds and set-difference removes inside one document
//!   session each.
//!
//! # Invariants
//! - Identifiers are normalized before every set operation; UUID-shaped
//!   identifiers compare in lowercase hyphenated form.
//! - A stored set never contains duplicates and is never stored empty: the
//!   document is created by the first add and deleted by the remove that
//!   empties it.
//! - Writes are conditional on the revision read in the same session.

use crate::db::session::{run_in_session, SessionAbort, SessionResult};
use crate::db::{DbError, DbResult};
use crate::model::document::{EventCollection, EventKind, MembershipUpdate};
use crate::model::user::UserId;
use crate::repo::user_repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Set-membership store for one event collection kind.
pub trait EventMembershipStore {
    fn kind(&self) -> EventKind;
    /// Returns the stored collection, or `None` when the user has none.
    fn get_events(&self, user_id: UserId) -> RepoResult<Option<EventCollection>>;
    /// Adds identifiers not yet present.
    ///
    /// `RepoError::NoChange` when every identifier is already stored.
    fn add_events(&self, user_id: UserId, event_ids: &[String]) -> RepoResult<MembershipUpdate>;
    /// Removes matching identifiers, deleting the document once empty.
    ///
    /// `RepoError::NotFound` when the user has no collection,
    /// `RepoError::NoChange` when nothing matched.
    fn remove_events(&self, user_id: UserId, event_ids: &[String])
        -> RepoResult<MembershipUpdate>;
}

/// SQLite-backed membership store bound to one collection kind.
pub struct SqliteEventMembershipStore<'conn> {
    conn: &'conn Connection,
    kind: EventKind,
}

impl<'conn> SqliteEventMembershipStore<'conn> {
    pub fn new(conn: &'conn Connection, kind: EventKind) -> Self {
        Self { conn, kind }
    }

    pub fn saved(conn: &'conn Connection) -> Self {
        Self::new(conn, EventKind::Saved)
    }

    pub fn attended(conn: &'conn Connection) -> Self {
        Self::new(conn, EventKind::Attended)
    }
}

impl EventMembershipStore for SqliteEventMembershipStore<'_> {
    fn kind(&self) -> EventKind {
        self.kind
    }

    fn get_events(&self, user_id: UserId) -> RepoResult<Option<EventCollection>> {
        Ok(load_collection(self.conn, user_id, self.kind)?)
    }

    fn add_events(&self, user_id: UserId, event_ids: &[String]) -> RepoResult<MembershipUpdate> {
        ensure_user_id(user_id)?;
        let requested = normalize_event_ids(event_ids);
        let kind = self.kind;

        run_in_session(self.conn, "events_add", |tx| {
            let current = load_collection(tx, user_id, kind)?;
            let newly: BTreeSet<String> = match &current {
                Some(collection) => requested.difference(&collection.events).cloned().collect(),
                None => requested.clone(),
            };
            if newly.is_empty() {
                return Err(SessionAbort::NoChange.into());
            }

            let events = match current {
                None => insert_collection(tx, user_id, kind, &requested)?.events,
                Some(collection) => {
                    let mut merged = collection.events.clone();
                    merged.extend(newly.iter().cloned());
                    write_events(tx, &collection, &merged)?;
                    merged
                }
            };

            Ok(MembershipUpdate {
                user_id,
                kind,
                changed: newly,
                events,
            })
        })
        .map_err(|err| RepoError::from_session(err, user_id))
    }

    fn remove_events(
        &self,
        user_id: UserId,
        event_ids: &[String],
    ) -> RepoResult<MembershipUpdate> {
        ensure_user_id(user_id)?;
        let requested = normalize_event_ids(event_ids);
        let kind = self.kind;

        run_in_session(self.conn, "events_remove", |tx| {
            let collection =
                load_collection(tx, user_id, kind)?.ok_or(SessionAbort::NotFound)?;

            let remaining: BTreeSet<String> =
                collection.events.difference(&requested).cloned().collect();
            if remaining.len() == collection.events.len() {
                return Err(SessionAbort::NoChange.into());
            }

            if remaining.is_empty() {
                delete_collection(tx, &collection)?;
            } else {
                write_events(tx, &collection, &remaining)?;
            }

            let removed = collection.events.intersection(&requested).cloned().collect();
            Ok(MembershipUpdate {
                user_id,
                kind,
                changed: removed,
                events: remaining,
            })
        })
        .map_err(|err| RepoError::from_session(err, user_id))
    }
}

/// Normalizes one event identifier to its canonical string form.
///
/// Blank input yields `None`. UUID-shaped input (any accepted spelling)
/// becomes lowercase hyphenated; anything else is kept trimmed.
pub fn normalize_event_id(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    match Uuid::parse_str(trimmed) {
        Ok(id) => Some(id.to_string()),
        Err(_) => Some(trimmed.to_string()),
    }
}

/// Normalizes and deduplicates event identifiers, dropping blanks.
pub fn normalize_event_ids(values: &[String]) -> BTreeSet<String> {
    values
        .iter()
        .filter_map(|value| normalize_event_id(value))
        .collect()
}

fn ensure_user_id(user_id: UserId) -> RepoResult<()> {
    if user_id.is_nil() {
        return Err(RepoError::InvalidInput("user id must not be nil"));
    }
    Ok(())
}

fn load_collection(
    conn: &Connection,
    user_id: UserId,
    kind: EventKind,
) -> DbResult<Option<EventCollection>> {
    let row = conn
        .query_row(
            "SELECT id, kind, events, revision
             FROM event_collections
             WHERE user_id = ?1
               AND kind = ?2;",
            params![user_id.to_string(), kind.as_str()],
            |row| {
                Ok((
                    row.get::<_, String>("id")?,
                    row.get::<_, String>("kind")?,
                    row.get::<_, String>("events")?,
                    row.get::<_, u64>("revision")?,
                ))
            },
        )
        .optional()?;

    let Some((id, kind_text, events_json, revision)) = row else {
        return Ok(None);
    };
    let stored_kind = EventKind::parse(&kind_text).ok_or_else(|| {
        DbError::InvalidData(format!(
            "invalid kind `{kind_text}` in event_collections.kind"
        ))
    })?;
    let events: BTreeSet<String> = serde_json::from_str(&events_json)?;

    Ok(Some(EventCollection {
        id,
        user_id,
        kind: stored_kind,
        events,
        revision,
    }))
}

fn insert_collection(
    conn: &Connection,
    user_id: UserId,
    kind: EventKind,
    events: &BTreeSet<String>,
) -> DbResult<EventCollection> {
    let collection = EventCollection {
        id: Uuid::new_v4().to_string(),
        user_id,
        kind,
        events: events.clone(),
        revision: 0,
    };
    conn.execute(
        "INSERT INTO event_collections (id, user_id, kind, events, revision)
         VALUES (?1, ?2, ?3, ?4, 0);",
        params![
            collection.id.as_str(),
            user_id.to_string(),
            kind.as_str(),
            serde_json::to_string(&collection.events)?,
        ],
    )?;
    Ok(collection)
}

fn write_events(
    conn: &Connection,
    collection: &EventCollection,
    events: &BTreeSet<String>,
) -> SessionResult<()> {
    let changed = conn.execute(
        "UPDATE event_collections
         SET
            events = ?3,
            revision = revision + 1
         WHERE id = ?1
           AND revision = ?2;",
        params![
            collection.id.as_str(),
            collection.revision,
            serde_json::to_string(events).map_err(DbError::from)?,
        ],
    )?;
    if changed == 0 {
        return Err(SessionAbort::Conflict.into());
    }
    Ok(())
}

fn delete_collection(conn: &Connection, collection: &EventCollection) -> SessionResult<()> {
    let changed = conn.execute(
        "DELETE FROM event_collections
         WHERE id = ?1
           AND revision = ?2;",
        params![collection.id.as_str(), collection.revision],
    )?;
    if changed == 0 {
        return Err(SessionAbort::Conflict.into());
    }
    Ok(())
}
