use std::collections::BTreeSet;
use uuid::Uuid;
use waves_users_core::db::open_user_db_in_memory;
use waves_users_core::{
    RepoError, SqliteUserRepository, User, UserPatch, UserRepository, UserType,
    UserValidationError,
};

fn user(username: &str, email: &str) -> User {
    User::new(
        username,
        "$argon2id$placeholder",
        "Ada Lovelace",
        email,
        "5550100200",
        "GBR",
    )
}

#[test]
fn insert_and_lookup_by_id_and_username() {
    let conn = open_user_db_in_memory().unwrap();
    let repo = SqliteUserRepository::new(&conn);

    let ada = user("ada", "ada@gmail.com");
    let id = repo.insert_user(&ada).unwrap();

    let by_id = repo.get_by_id(id).unwrap().unwrap();
    assert_eq!(by_id, ada);
    let by_name = repo.get_by_username("ada").unwrap().unwrap();
    assert_eq!(by_name.user_id, id);

    assert!(repo.get_by_username("Ada").unwrap().is_none());
    assert!(repo.get_by_id(Uuid::new_v4()).unwrap().is_none());
}

#[test]
fn insert_rejects_invalid_records_before_sql() {
    let conn = open_user_db_in_memory().unwrap();
    let repo = SqliteUserRepository::new(&conn);

    let err = repo
        .insert_user(&user("ada", "ada@example.com"))
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(UserValidationError::Email(_))
    ));

    let mut nil = user("ada", "ada@gmail.com");
    nil.user_id = Uuid::nil();
    assert!(matches!(
        repo.insert_user(&nil).unwrap_err(),
        RepoError::Validation(UserValidationError::NilUserId)
    ));

    let (_, total) = repo.list_users(1, 10).unwrap();
    assert_eq!(total, 0);
}

#[test]
fn duplicate_username_is_rejected_as_input() {
    let conn = open_user_db_in_memory().unwrap();
    let repo = SqliteUserRepository::new(&conn);

    repo.insert_user(&user("ada", "ada@gmail.com")).unwrap();
    let err = repo
        .insert_user(&user("ada", "other@gmail.com"))
        .unwrap_err();
    assert!(matches!(err, RepoError::InvalidInput(_)));

    let (_, total) = repo.list_users(1, 10).unwrap();
    assert_eq!(total, 1);
}

#[test]
fn third_page_of_twenty_five_users_holds_five() {
    let conn = open_user_db_in_memory().unwrap();
    let repo = SqliteUserRepository::new(&conn);

    for index in 0..25 {
        let name = format!("user{index:02}");
        repo.insert_user(&user(&name, &format!("{name}@gmail.com")))
            .unwrap();
    }

    let (page, total) = repo.list_users(3, 10).unwrap();
    assert_eq!(total, 25);
    assert_eq!(page.len(), 5);
    let names: Vec<&str> = page.iter().map(|user| user.username.as_str()).collect();
    assert_eq!(names, vec!["user20", "user21", "user22", "user23", "user24"]);

    let (past_end, total) = repo.list_users(4, 10).unwrap();
    assert!(past_end.is_empty());
    assert_eq!(total, 25);
}

#[test]
fn partial_update_changes_only_non_empty_fields() {
    let conn = open_user_db_in_memory().unwrap();
    let repo = SqliteUserRepository::new(&conn);
    let ada = user("ada", "ada@gmail.com");
    repo.insert_user(&ada).unwrap();

    let patch = UserPatch {
        email: Some("x".to_string()),
        mobile_number: Some(String::new()),
        ..UserPatch::default()
    };
    let updated = repo.update_partial(ada.user_id, &patch).unwrap().unwrap();

    assert_eq!(updated.email, "x");
    assert_eq!(updated.mobile_number, ada.mobile_number);
    assert_eq!(updated.legal_name, ada.legal_name);
    assert_eq!(updated.revision, 1);

    let stored = repo.get_by_id(ada.user_id).unwrap().unwrap();
    assert_eq!(stored, updated);
}

#[test]
fn partial_update_without_differences_does_not_bump_revision() {
    let conn = open_user_db_in_memory().unwrap();
    let repo = SqliteUserRepository::new(&conn);
    let ada = user("ada", "ada@gmail.com");
    repo.insert_user(&ada).unwrap();

    let patch = UserPatch {
        legal_name: Some(ada.legal_name.clone()),
        kind: Some(UserType::User),
        ..UserPatch::default()
    };
    let unchanged = repo.update_partial(ada.user_id, &patch).unwrap().unwrap();
    assert_eq!(unchanged.revision, 0);
}

#[test]
fn partial_update_of_missing_user_returns_none() {
    let conn = open_user_db_in_memory().unwrap();
    let repo = SqliteUserRepository::new(&conn);

    let patch = UserPatch {
        legal_name: Some("Grace Hopper".to_string()),
        ..UserPatch::default()
    };
    assert!(repo.update_partial(Uuid::new_v4(), &patch).unwrap().is_none());
}

#[test]
fn stale_revision_is_rejected_as_conflict() {
    let conn = open_user_db_in_memory().unwrap();
    let repo = SqliteUserRepository::new(&conn);
    let ada = user("ada", "ada@gmail.com");
    repo.insert_user(&ada).unwrap();

    let first = UserPatch {
        legal_name: Some("Ada King".to_string()),
        expected_revision: Some(0),
        ..UserPatch::default()
    };
    repo.update_partial(ada.user_id, &first).unwrap().unwrap();

    let stale = UserPatch {
        legal_name: Some("Ada Byron".to_string()),
        expected_revision: Some(0),
        ..UserPatch::default()
    };
    let err = repo.update_partial(ada.user_id, &stale).unwrap_err();
    assert!(matches!(err, RepoError::Conflict(id) if id == ada.user_id));

    let stored = repo.get_by_id(ada.user_id).unwrap().unwrap();
    assert_eq!(stored.legal_name, "Ada King");
    assert_eq!(stored.revision, 1);
}

#[test]
fn save_matching_no_row_is_a_conflict() {
    let conn = open_user_db_in_memory().unwrap();
    let repo = SqliteUserRepository::new(&conn);
    let ada = user("ada", "ada@gmail.com");
    repo.insert_user(&ada).unwrap();

    conn.execute_batch(
        "CREATE TRIGGER swallow_user_updates
         BEFORE UPDATE ON users
         BEGIN
            SELECT RAISE(IGNORE);
         END;",
    )
    .unwrap();

    let patch = UserPatch {
        legal_name: Some("Ada King".to_string()),
        ..UserPatch::default()
    };
    let err = repo.update_partial(ada.user_id, &patch).unwrap_err();
    assert!(matches!(err, RepoError::Conflict(id) if id == ada.user_id));

    let stored = repo.get_by_id(ada.user_id).unwrap().unwrap();
    assert_eq!(stored.legal_name, "Ada Lovelace");
    assert_eq!(stored.revision, 0);
}

#[test]
fn password_update_replaces_hash_and_bumps_revision() {
    let conn = open_user_db_in_memory().unwrap();
    let repo = SqliteUserRepository::new(&conn);
    let ada = user("ada", "ada@gmail.com");
    repo.insert_user(&ada).unwrap();

    assert!(repo.update_password(ada.user_id, "$argon2id$next").unwrap());
    let stored = repo.get_by_id(ada.user_id).unwrap().unwrap();
    assert_eq!(stored.password, "$argon2id$next");
    assert_eq!(stored.revision, 1);

    assert!(!repo.update_password(Uuid::new_v4(), "$argon2id$next").unwrap());
}

#[test]
fn delete_is_idempotent() {
    let conn = open_user_db_in_memory().unwrap();
    let repo = SqliteUserRepository::new(&conn);
    let ada = user("ada", "ada@gmail.com");
    repo.insert_user(&ada).unwrap();

    assert!(repo.delete_user(ada.user_id).unwrap());
    assert!(!repo.delete_user(ada.user_id).unwrap());
    assert!(repo.get_by_id(ada.user_id).unwrap().is_none());
}

#[test]
fn roles_are_collected_across_accounts_sharing_an_email() {
    let conn = open_user_db_in_memory().unwrap();
    let repo = SqliteUserRepository::new(&conn);

    repo.insert_user(&user("ada", "ada@gmail.com")).unwrap();
    let mut admin = user("ada_admin", "ada@gmail.com");
    admin.kind = UserType::Admin;
    repo.insert_user(&admin).unwrap();
    repo.insert_user(&user("grace", "grace@gmail.com")).unwrap();

    let roles = repo.roles_for_email("ada@gmail.com").unwrap();
    assert_eq!(roles, BTreeSet::from([UserType::Admin, UserType::User]));

    let roles = repo.roles_for_email("grace@gmail.com").unwrap();
    assert_eq!(roles, BTreeSet::from([UserType::User]));

    assert!(repo.roles_for_email("nobody@gmail.com").unwrap().is_empty());
}
