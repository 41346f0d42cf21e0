//! User repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide lookup, paged listing, partial update and delete over the
//!   authoritative `users` table.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - Inserts validate the record before any SQL runs.
//! - Partial updates persist only when a field actually changed, and only
//!   against the revision that was read (optimistic concurrency).
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::session::{SessionAbort, SessionError};
use crate::db::DbError;
use crate::model::user::{User, UserId, UserPatch, UserType, UserValidationError};
use rusqlite::{params, Connection, Row};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const USER_SELECT_SQL: &str = "SELECT
    user_id,
    username,
    password,
    legal_name,
    email,
    mobile_number,
    country,
    type,
    revision
FROM users";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error shared by the user and document stores.
#[derive(Debug)]
pub enum RepoError {
    /// Store fault outside a document session.
    Db(DbError),
    /// Store fault inside a document session; the session was rolled back.
    Transaction(DbError),
    /// No record or document exists for this user.
    NotFound(UserId),
    /// Requested mutation would not change stored state.
    NoChange(UserId),
    /// Stored revision moved between read and write.
    Conflict(UserId),
    /// Caller input rejected before touching the store.
    InvalidInput(&'static str),
    Validation(UserValidationError),
    InvalidData(String),
}

impl RepoError {
    /// Maps a session outcome for the document owned by `user_id`.
    pub fn from_session(err: SessionError, user_id: UserId) -> Self {
        match err {
            SessionError::Aborted(SessionAbort::NoChange) => Self::NoChange(user_id),
            SessionError::Aborted(SessionAbort::NotFound) => Self::NotFound(user_id),
            SessionError::Aborted(SessionAbort::Conflict) => Self::Conflict(user_id),
            SessionError::Store(err) => Self::Transaction(err),
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Transaction(err) => write!(f, "transaction aborted: {err}"),
            Self::NotFound(id) => write!(f, "not found for user: {id}"),
            Self::NoChange(id) => write!(f, "no change for user: {id}"),
            Self::Conflict(id) => write!(f, "concurrent modification for user: {id}"),
            Self::InvalidInput(reason) => write!(f, "invalid input: {reason}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) | Self::Transaction(err) => Some(err),
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<UserValidationError> for RepoError {
    fn from(value: UserValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Repository interface over authoritative user records.
pub trait UserRepository {
    /// Persists a new account. Used by registration and seeding callers.
    /// A taken username or id is `RepoError::InvalidInput`.
    fn insert_user(&self, user: &User) -> RepoResult<UserId>;
    fn get_by_id(&self, id: UserId) -> RepoResult<Option<User>>;
    fn get_by_username(&self, username: &str) -> RepoResult<Option<User>>;
    /// Returns one page plus the total row count. Both arguments are 1-based
    /// and expected to be validated by the caller.
    fn list_users(&self, page_number: u32, page_size: u32) -> RepoResult<(Vec<User>, u64)>;
    /// Distinct roles held by accounts registered under `email`.
    fn roles_for_email(&self, email: &str) -> RepoResult<BTreeSet<UserType>>;
    /// Merges non-empty, differing patch fields. `None` when the user is
    /// missing; `RepoError::Conflict` when the save matched no row.
    fn update_partial(&self, id: UserId, patch: &UserPatch) -> RepoResult<Option<User>>;
    /// Replaces the stored hash. Returns whether a row was updated.
    fn update_password(&self, id: UserId, password_hash: &str) -> RepoResult<bool>;
    /// Returns whether a row was removed.
    fn delete_user(&self, id: UserId) -> RepoResult<bool>;
}

/// SQLite-backed user repository.
pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn get_one(&self, filter: &str, key: &str) -> RepoResult<Option<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} WHERE {filter} = ?1;"))?;
        let mut rows = stmt.query([key])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_user_row(row)?)),
            None => Ok(None),
        }
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn insert_user(&self, user: &User) -> RepoResult<UserId> {
        user.validate()?;

        let inserted = self.conn.execute(
            "INSERT INTO users (
                user_id,
                username,
                password,
                legal_name,
                email,
                mobile_number,
                country,
                type,
                revision
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                user.user_id.to_string(),
                user.username.as_str(),
                user.password.as_str(),
                user.legal_name.as_str(),
                user.email.as_str(),
                user.mobile_number.as_str(),
                user.country.as_str(),
                user.kind.as_str(),
                revision_to_db(user.revision)?,
            ],
        );

        match inserted.map_err(DbError::from) {
            Ok(_) => Ok(user.user_id),
            Err(err) if err.is_unique_violation() => {
                Err(RepoError::InvalidInput("username or user id already exists"))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn get_by_id(&self, id: UserId) -> RepoResult<Option<User>> {
        self.get_one("user_id", &id.to_string())
    }

    fn get_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        self.get_one("username", username)
    }

    fn list_users(&self, page_number: u32, page_size: u32) -> RepoResult<(Vec<User>, u64)> {
        let total: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM users;", [], |row| row.get(0))?;
        let total = u64::try_from(total)
            .map_err(|_| RepoError::InvalidData(format!("negative user count `{total}`")))?;

        let offset = i64::from(page_number.saturating_sub(1)) * i64::from(page_size);
        let mut stmt = self.conn.prepare(&format!(
            "{USER_SELECT_SQL}
             ORDER BY username ASC, user_id ASC
             LIMIT ?1 OFFSET ?2;"
        ))?;
        let mut rows = stmt.query(params![i64::from(page_size), offset])?;
        let mut users = Vec::new();
        while let Some(row) = rows.next()? {
            users.push(parse_user_row(row)?);
        }

        Ok((users, total))
    }

    fn roles_for_email(&self, email: &str) -> RepoResult<BTreeSet<UserType>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT type
             FROM users
             WHERE email = ?1
               AND type IN ('Admin', 'User');",
        )?;
        let mut rows = stmt.query([email])?;
        let mut roles = BTreeSet::new();
        while let Some(row) = rows.next()? {
            let value: String = row.get(0)?;
            roles.insert(parse_user_type(&value)?);
        }
        Ok(roles)
    }

    fn update_partial(&self, id: UserId, patch: &UserPatch) -> RepoResult<Option<User>> {
        let Some(mut user) = self.get_by_id(id)? else {
            return Ok(None);
        };

        if let Some(expected) = patch.expected_revision {
            if expected != user.revision {
                return Err(RepoError::Conflict(id));
            }
        }

        if !user.apply_patch(patch) {
            return Ok(Some(user));
        }

        let changed = self.conn.execute(
            "UPDATE users
             SET
                legal_name = ?2,
                email = ?3,
                mobile_number = ?4,
                type = ?5,
                revision = revision + 1
             WHERE user_id = ?1
               AND revision = ?6;",
            params![
                id.to_string(),
                user.legal_name.as_str(),
                user.email.as_str(),
                user.mobile_number.as_str(),
                user.kind.as_str(),
                revision_to_db(user.revision)?,
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::Conflict(id));
        }

        user.revision += 1;
        Ok(Some(user))
    }

    fn update_password(&self, id: UserId, password_hash: &str) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE users
             SET
                password = ?2,
                revision = revision + 1
             WHERE user_id = ?1;",
            params![id.to_string(), password_hash],
        )?;
        Ok(changed > 0)
    }

    fn delete_user(&self, id: UserId) -> RepoResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM users WHERE user_id = ?1;", [id.to_string()])?;
        Ok(changed > 0)
    }
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<User> {
    let id_text: String = row.get("user_id")?;
    let user_id = parse_uuid(&id_text, "users.user_id")?;

    let type_text: String = row.get("type")?;
    let kind = parse_user_type(&type_text)?;

    let revision: i64 = row.get("revision")?;
    let revision = u64::try_from(revision).map_err(|_| {
        RepoError::InvalidData(format!("invalid revision `{revision}` in users.revision"))
    })?;

    Ok(User {
        user_id,
        username: row.get("username")?,
        password: row.get("password")?,
        legal_name: row.get("legal_name")?,
        email: row.get("email")?,
        mobile_number: row.get("mobile_number")?,
        country: row.get("country")?,
        kind,
        revision,
    })
}

fn parse_user_type(value: &str) -> RepoResult<UserType> {
    UserType::parse(value)
        .ok_or_else(|| RepoError::InvalidData(format!("invalid user type `{value}` in users.type")))
}

pub(crate) fn parse_uuid(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

pub(crate) fn revision_to_db(revision: u64) -> RepoResult<i64> {
    i64::try_from(revision)
        .map_err(|_| RepoError::InvalidData(format!("revision `{revision}` exceeds store range")))
}

