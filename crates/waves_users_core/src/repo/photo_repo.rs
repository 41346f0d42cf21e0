//! Profile photo store over the document store.
//!
//! # Invariants
//! - At most one photo document per user (unique `user_id`).
//! - `set_photo` inserts or overwrites inside one document session.

use crate::db::session::run_in_session;
use crate::db::DbResult;
use crate::model::document::ProfilePhoto;
use crate::model::user::UserId;
use crate::repo::user_repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

pub trait ProfilePhotoStore {
    /// Stores `photo` for `user_id`, replacing any previous payload.
    fn set_photo(&self, user_id: UserId, photo: &str) -> RepoResult<ProfilePhoto>;
    fn get_photo(&self, user_id: UserId) -> RepoResult<Option<ProfilePhoto>>;
    /// Returns whether a photo document existed.
    fn delete_photo(&self, user_id: UserId) -> RepoResult<bool>;
}

/// SQLite-backed profile photo store.
pub struct SqliteProfilePhotoStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteProfilePhotoStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ProfilePhotoStore for SqliteProfilePhotoStore<'_> {
    fn set_photo(&self, user_id: UserId, photo: &str) -> RepoResult<ProfilePhoto> {
        if user_id.is_nil() {
            return Err(RepoError::InvalidInput("user id must not be nil"));
        }
        if photo.is_empty() {
            return Err(RepoError::InvalidInput("photo must not be empty"));
        }

        run_in_session(self.conn, "photo_set", |tx| {
            match load_photo(tx, user_id)? {
                None => {
                    let stored = ProfilePhoto {
                        id: Uuid::new_v4().to_string(),
                        user_id,
                        photo: photo.to_string(),
                    };
                    tx.execute(
                        "INSERT INTO profile_photos (id, user_id, photo) VALUES (?1, ?2, ?3);",
                        params![stored.id.as_str(), user_id.to_string(), photo],
                    )?;
                    Ok(stored)
                }
                Some(mut stored) => {
                    tx.execute(
                        "UPDATE profile_photos SET photo = ?2 WHERE id = ?1;",
                        params![stored.id.as_str(), photo],
                    )?;
                    stored.photo = photo.to_string();
                    Ok(stored)
                }
            }
        })
        .map_err(|err| RepoError::from_session(err, user_id))
    }

    fn get_photo(&self, user_id: UserId) -> RepoResult<Option<ProfilePhoto>> {
        Ok(load_photo(self.conn, user_id)?)
    }

    fn delete_photo(&self, user_id: UserId) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM profile_photos WHERE user_id = ?1;",
            [user_id.to_string()],
        )?;
        Ok(changed > 0)
    }
}

fn load_photo(conn: &Connection, user_id: UserId) -> DbResult<Option<ProfilePhoto>> {
    let photo = conn
        .query_row(
            "SELECT id, photo FROM profile_photos WHERE user_id = ?1;",
            [user_id.to_string()],
            |row| {
                Ok(ProfilePhoto {
                    id: row.get("id")?,
                    user_id,
                    photo: row.get("photo")?,
                })
            },
        )
        .optional()?;
    Ok(photo)
}
