use rusqlite::Connection;
use std::collections::BTreeSet;
use std::thread;
use uuid::Uuid;
use waves_users_core::db::{open_document_db, open_document_db_in_memory};
use waves_users_core::{EventKind, EventMembershipStore, RepoError, SqliteEventMembershipStore};

const EVENT_A: &str = "0b5cfe3e-6f1f-4f0e-9d7a-3c2b1a0f9e8d";
const EVENT_B: &str = "7d0a7f02-2a3b-4c5d-8e9f-a0b1c2d3e4f5";
const EVENT_C: &str = "launch-party";

fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn set(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn collection_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM event_collections;", [], |row| {
        row.get(0)
    })
    .unwrap()
}

fn install_fault(conn: &Connection, timing: &str) {
    conn.execute_batch(&format!(
        "CREATE TRIGGER inject_{timing}_fault
         BEFORE {timing} ON event_collections
         BEGIN
            SELECT RAISE(ABORT, 'injected fault');
         END;"
    ))
    .unwrap();
}

#[test]
fn first_add_creates_collection_with_exactly_the_requested_ids() {
    let conn = open_document_db_in_memory().unwrap();
    let store = SqliteEventMembershipStore::saved(&conn);
    let owner = Uuid::new_v4();

    let update = store.add_events(owner, &ids(&[EVENT_A, EVENT_B])).unwrap();
    assert_eq!(update.kind, EventKind::Saved);
    assert_eq!(update.changed, set(&[EVENT_A, EVENT_B]));
    assert_eq!(update.events, set(&[EVENT_A, EVENT_B]));

    let stored = store.get_events(owner).unwrap().unwrap();
    assert_eq!(stored.user_id, owner);
    assert_eq!(stored.events, set(&[EVENT_A, EVENT_B]));
    assert_eq!(stored.revision, 0);
}

#[test]
fn adding_the_same_id_twice_reports_no_change() {
    let conn = open_document_db_in_memory().unwrap();
    let store = SqliteEventMembershipStore::saved(&conn);
    let owner = Uuid::new_v4();

    store.add_events(owner, &ids(&[EVENT_A])).unwrap();
    let err = store.add_events(owner, &ids(&[EVENT_A])).unwrap_err();
    assert!(matches!(err, RepoError::NoChange(id) if id == owner));

    let upper = EVENT_A.to_uppercase();
    let err = store
        .add_events(owner, &[format!("  {upper} ")])
        .unwrap_err();
    assert!(matches!(err, RepoError::NoChange(_)));

    let stored = store.get_events(owner).unwrap().unwrap();
    assert_eq!(stored.events, set(&[EVENT_A]));
    assert_eq!(stored.revision, 0);
}

#[test]
fn add_merges_only_new_ids() {
    let conn = open_document_db_in_memory().unwrap();
    let store = SqliteEventMembershipStore::attended(&conn);
    let owner = Uuid::new_v4();

    store.add_events(owner, &ids(&[EVENT_A])).unwrap();
    let update = store
        .add_events(owner, &ids(&[EVENT_A, EVENT_C, EVENT_C]))
        .unwrap();

    assert_eq!(update.changed, set(&[EVENT_C]));
    assert_eq!(update.events, set(&[EVENT_A, EVENT_C]));
    assert_eq!(store.get_events(owner).unwrap().unwrap().revision, 1);
}

#[test]
fn remove_leaves_the_rest_and_deletes_the_emptied_collection() {
    let conn = open_document_db_in_memory().unwrap();
    let store = SqliteEventMembershipStore::saved(&conn);
    let owner = Uuid::new_v4();
    store
        .add_events(owner, &ids(&[EVENT_A, EVENT_B, EVENT_C]))
        .unwrap();

    let update = store.remove_events(owner, &ids(&[EVENT_B])).unwrap();
    assert_eq!(update.changed, set(&[EVENT_B]));
    assert_eq!(update.events, set(&[EVENT_A, EVENT_C]));

    let update = store
        .remove_events(owner, &ids(&[EVENT_A, EVENT_C]))
        .unwrap();
    assert!(update.events.is_empty());
    assert!(store.get_events(owner).unwrap().is_none());
    assert_eq!(collection_count(&conn), 0);
}

#[test]
fn remove_without_collection_is_not_found() {
    let conn = open_document_db_in_memory().unwrap();
    let store = SqliteEventMembershipStore::saved(&conn);
    let owner = Uuid::new_v4();

    let err = store.remove_events(owner, &ids(&[EVENT_A])).unwrap_err();
    assert!(matches!(err, RepoError::NotFound(id) if id == owner));
}

#[test]
fn remove_of_absent_ids_reports_no_change() {
    let conn = open_document_db_in_memory().unwrap();
    let store = SqliteEventMembershipStore::saved(&conn);
    let owner = Uuid::new_v4();
    store.add_events(owner, &ids(&[EVENT_A])).unwrap();

    let err = store.remove_events(owner, &ids(&[EVENT_B])).unwrap_err();
    assert!(matches!(err, RepoError::NoChange(_)));
    assert_eq!(store.get_events(owner).unwrap().unwrap().events, set(&[EVENT_A]));
}

#[test]
fn saved_and_attended_collections_are_independent() {
    let conn = open_document_db_in_memory().unwrap();
    let saved = SqliteEventMembershipStore::saved(&conn);
    let attended = SqliteEventMembershipStore::attended(&conn);
    let owner = Uuid::new_v4();

    saved.add_events(owner, &ids(&[EVENT_A])).unwrap();
    attended.add_events(owner, &ids(&[EVENT_B])).unwrap();
    assert_eq!(
        attended.get_events(owner).unwrap().unwrap().kind,
        EventKind::Attended
    );

    assert_eq!(saved.get_events(owner).unwrap().unwrap().events, set(&[EVENT_A]));
    assert_eq!(
        attended.get_events(owner).unwrap().unwrap().events,
        set(&[EVENT_B])
    );

    attended.remove_events(owner, &ids(&[EVENT_B])).unwrap();
    assert!(attended.get_events(owner).unwrap().is_none());
    assert!(saved.get_events(owner).unwrap().is_some());
}

#[test]
fn nil_owner_is_rejected_before_touching_the_store() {
    let conn = open_document_db_in_memory().unwrap();
    let store = SqliteEventMembershipStore::saved(&conn);

    let err = store.add_events(Uuid::nil(), &ids(&[EVENT_A])).unwrap_err();
    assert!(matches!(err, RepoError::InvalidInput(_)));
    assert_eq!(collection_count(&conn), 0);
}

#[test]
fn failed_update_leaves_stored_set_untouched() {
    let conn = open_document_db_in_memory().unwrap();
    let store = SqliteEventMembershipStore::saved(&conn);
    let owner = Uuid::new_v4();
    store.add_events(owner, &ids(&[EVENT_A])).unwrap();

    install_fault(&conn, "UPDATE");
    let err = store.add_events(owner, &ids(&[EVENT_B])).unwrap_err();
    assert!(matches!(err, RepoError::Transaction(_)));

    let stored = store.get_events(owner).unwrap().unwrap();
    assert_eq!(stored.events, set(&[EVENT_A]));
    assert_eq!(stored.revision, 0);
    assert!(conn.is_autocommit());
}

#[test]
fn failed_first_insert_leaves_no_collection() {
    let conn = open_document_db_in_memory().unwrap();
    let store = SqliteEventMembershipStore::attended(&conn);
    let owner = Uuid::new_v4();

    install_fault(&conn, "INSERT");
    let err = store.add_events(owner, &ids(&[EVENT_A])).unwrap_err();
    assert!(matches!(err, RepoError::Transaction(_)));

    assert!(store.get_events(owner).unwrap().is_none());
    assert_eq!(collection_count(&conn), 0);
    assert!(conn.is_autocommit());
}

#[test]
fn failed_delete_keeps_the_last_id() {
    let conn = open_document_db_in_memory().unwrap();
    let store = SqliteEventMembershipStore::saved(&conn);
    let owner = Uuid::new_v4();
    store.add_events(owner, &ids(&[EVENT_A])).unwrap();

    install_fault(&conn, "DELETE");
    let err = store.remove_events(owner, &ids(&[EVENT_A])).unwrap_err();
    assert!(matches!(err, RepoError::Transaction(_)));

    assert_eq!(store.get_events(owner).unwrap().unwrap().events, set(&[EVENT_A]));
}

#[test]
fn concurrent_adds_from_two_connections_keep_every_id() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("documents.db");
    drop(open_document_db(&path).unwrap());
    let owner = Uuid::new_v4();

    thread::scope(|scope| {
        for writer in ["left", "right"] {
            let path = &path;
            scope.spawn(move || {
                let conn = open_document_db(path).unwrap();
                let store = SqliteEventMembershipStore::saved(&conn);
                for index in 0..20 {
                    store
                        .add_events(owner, &[format!("{writer}-{index}")])
                        .unwrap();
                }
            });
        }
    });

    let conn = open_document_db(&path).unwrap();
    let stored = SqliteEventMembershipStore::saved(&conn)
        .get_events(owner)
        .unwrap()
        .unwrap();
    let expected: BTreeSet<String> = ["left", "right"]
        .iter()
        .flat_map(|writer| (0..20).map(move |index| format!("{writer}-{index}")))
        .collect();
    assert_eq!(stored.events, expected);
    assert_eq!(stored.revision, 39);
    assert_eq!(collection_count(&conn), 1);
}
