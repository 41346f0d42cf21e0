//! User account use-case service.
//!
//! # Responsibility
//! - Validate caller identity and request payloads above the stores.
//! - Orchestrate the user repository, the two event membership stores, the
//!   profile photo store and credential checks.
//! - Translate store outcomes into one error taxonomy for transport callers.
//!
//! # Invariants
//! - Every operation rejects a nil caller identity before touching a store.
//! - A password is only replaced after the presented old password verifies.
//! - Errors are returned, never logged and dropped. The single exception is
//!   `get_roles`, which answers with an empty set when the caller does not
//!   hold both roles.

use crate::credential::{CredentialError, CredentialManager};
use crate::db::DbError;
use crate::model::document::{
    EventCollection, EventIdsRequest, EventKind, MembershipUpdate, ProfilePhoto,
};
use crate::model::user::{
    validate_password, User, UserId, UserPatch, UserType, UserValidationError,
};
use crate::repo::event_repo::EventMembershipStore;
use crate::repo::photo_repo::ProfilePhotoStore;
use crate::repo::user_repo::{RepoError, UserRepository};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Authenticated caller, as resolved by the transport layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    pub email: String,
}

impl Actor {
    pub fn new(user_id: UserId, email: impl Into<String>) -> Self {
        Self {
            user_id,
            email: email.into(),
        }
    }

    pub fn from_user(user: &User) -> Self {
        Self::new(user.user_id, user.email.clone())
    }
}

/// Password change payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChange {
    pub old_password: String,
    pub new_password: String,
}

impl PasswordChange {
    pub fn new(old_password: impl Into<String>, new_password: impl Into<String>) -> Self {
        Self {
            old_password: old_password.into(),
            new_password: new_password.into(),
        }
    }
}

/// One page of users plus the totals needed to render pagination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPage {
    #[serde(rename = "numberOfUsers")]
    pub total: u64,
    pub page_size: u32,
    pub page_number: u32,
    pub number_of_pages: u64,
    pub users: Vec<User>,
}

/// What an operation was looking at when it failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    User(UserId),
    Username(String),
    ProfilePhoto(UserId),
    Events(EventKind, UserId),
}

impl Display for Resource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User(id) => write!(f, "user {id}"),
            Self::Username(name) => write!(f, "user `{name}`"),
            Self::ProfilePhoto(id) => write!(f, "profile photo of user {id}"),
            Self::Events(kind, id) => write!(f, "{} events of user {id}", kind.as_str()),
        }
    }
}

/// Caller-correctable input problems.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Caller identity or owner id is missing or nil.
    MissingUserId,
    InvalidPage { page_number: u32, page_size: u32 },
    EmptyQuery(&'static str),
    EmptyPhoto,
    EmptyEventIds,
    BlankEventId,
    Field(UserValidationError),
    /// Rejected by a store before any write.
    Input(&'static str),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingUserId => write!(f, "no user id provided"),
            Self::InvalidPage {
                page_number,
                page_size,
            } => write!(
                f,
                "page number and size must be greater than 0, got {page_number}/{page_size}"
            ),
            Self::EmptyQuery(what) => write!(f, "{what} query cannot be empty"),
            Self::EmptyPhoto => write!(f, "photo cannot be empty"),
            Self::EmptyEventIds => write!(f, "no event ids provided"),
            Self::BlankEventId => write!(f, "event ids must not be blank"),
            Self::Field(err) => write!(f, "{err}"),
            Self::Input(reason) => write!(f, "{reason}"),
        }
    }
}

/// Service error taxonomy.
#[derive(Debug)]
pub enum ServiceError {
    Validation(ValidationError),
    NotFound(Resource),
    /// The mutation was already satisfied; nothing was written.
    NoChange(Resource),
    /// Presented password does not verify for this user.
    Authentication(UserId),
    /// Store fault inside a document session; the session was rolled back.
    Transaction(DbError),
    /// Optimistic revision check failed.
    Conflict(Resource),
    Credential(CredentialError),
    /// Store fault or corrupt data outside a session.
    Store(RepoError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "validation failed: {err}"),
            Self::NotFound(resource) => write!(f, "{resource} not found"),
            Self::NoChange(resource) => write!(f, "no change to {resource}"),
            Self::Authentication(id) => write!(f, "incorrect password provided for user {id}"),
            Self::Transaction(err) => write!(f, "transaction aborted: {err}"),
            Self::Conflict(resource) => write!(f, "{resource} was modified concurrently"),
            Self::Credential(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Transaction(err) => Some(err),
            Self::Credential(err) => Some(err),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<UserValidationError> for ServiceError {
    fn from(value: UserValidationError) -> Self {
        Self::Validation(ValidationError::Field(value))
    }
}

impl From<CredentialError> for ServiceError {
    fn from(value: CredentialError) -> Self {
        Self::Credential(value)
    }
}

fn map_repo(err: RepoError, resource: Resource) -> ServiceError {
    match err {
        RepoError::NotFound(_) => ServiceError::NotFound(resource),
        RepoError::NoChange(_) => ServiceError::NoChange(resource),
        RepoError::Conflict(_) => ServiceError::Conflict(resource),
        RepoError::Transaction(err) => ServiceError::Transaction(err),
        RepoError::InvalidInput(reason) => ServiceError::Validation(ValidationError::Input(reason)),
        RepoError::Validation(err) => ServiceError::Validation(ValidationError::Field(err)),
        other => ServiceError::Store(other),
    }
}

fn require_user_id(user_id: UserId) -> ServiceResult<UserId> {
    if user_id.is_nil() {
        return Err(ValidationError::MissingUserId.into());
    }
    Ok(user_id)
}

/// Account facade over injected stores.
pub struct UserService<U, E, P>
where
    U: UserRepository,
    E: EventMembershipStore,
    P: ProfilePhotoStore,
{
    users: U,
    saved: E,
    attended: E,
    photos: P,
    credentials: CredentialManager,
}

impl<U, E, P> UserService<U, E, P>
where
    U: UserRepository,
    E: EventMembershipStore,
    P: ProfilePhotoStore,
{
    /// `saved` and `attended` must be bound to their matching kinds.
    pub fn new(users: U, saved: E, attended: E, photos: P, credentials: CredentialManager) -> Self {
        debug_assert_eq!(saved.kind(), EventKind::Saved);
        debug_assert_eq!(attended.kind(), EventKind::Attended);
        Self {
            users,
            saved,
            attended,
            photos,
            credentials,
        }
    }

    fn events(&self, kind: EventKind) -> &E {
        match kind {
            EventKind::Saved => &self.saved,
            EventKind::Attended => &self.attended,
        }
    }

    /// Returns the caller's roles only when they hold both Admin and User.
    ///
    /// Otherwise the answer is an empty set, not an error.
    pub fn get_roles(&self, actor: &Actor) -> ServiceResult<BTreeSet<UserType>> {
        let user_id = require_user_id(actor.user_id)?;
        let roles = self
            .users
            .roles_for_email(&actor.email)
            .map_err(|err| map_repo(err, Resource::User(user_id)))?;

        if roles.contains(&UserType::Admin) && roles.contains(&UserType::User) {
            Ok(roles)
        } else {
            Ok(BTreeSet::new())
        }
    }

    /// Lists one 1-based page of users.
    pub fn list_users(
        &self,
        actor: &Actor,
        page_number: u32,
        page_size: u32,
    ) -> ServiceResult<UserPage> {
        let user_id = require_user_id(actor.user_id)?;
        if page_number < 1 || page_size < 1 {
            return Err(ValidationError::InvalidPage {
                page_number,
                page_size,
            }
            .into());
        }

        let (users, total) = self
            .users
            .list_users(page_number, page_size)
            .map_err(|err| map_repo(err, Resource::User(user_id)))?;

        Ok(UserPage {
            total,
            page_size,
            page_number,
            number_of_pages: total.div_ceil(u64::from(page_size)),
            users,
        })
    }

    pub fn get_user_by_id(&self, actor: &Actor, id: UserId) -> ServiceResult<User> {
        require_user_id(actor.user_id)?;
        if id.is_nil() {
            return Err(ValidationError::EmptyQuery("user id").into());
        }
        self.users
            .get_by_id(id)
            .map_err(|err| map_repo(err, Resource::User(id)))?
            .ok_or(ServiceError::NotFound(Resource::User(id)))
    }

    /// Resolves many ids, skipping nil ids and ids with no account.
    ///
    /// Result order follows `ids`.
    pub fn get_users_by_ids(&self, actor: &Actor, ids: &[UserId]) -> ServiceResult<Vec<User>> {
        require_user_id(actor.user_id)?;
        let mut users = Vec::with_capacity(ids.len());
        for id in ids.iter().copied().filter(|id| !id.is_nil()) {
            if let Some(user) = self
                .users
                .get_by_id(id)
                .map_err(|err| map_repo(err, Resource::User(id)))?
            {
                users.push(user);
            }
        }
        Ok(users)
    }

    pub fn get_user_by_username(&self, actor: &Actor, username: &str) -> ServiceResult<User> {
        require_user_id(actor.user_id)?;
        if username.is_empty() {
            return Err(ValidationError::EmptyQuery("username").into());
        }
        let resource = || Resource::Username(username.to_string());
        self.users
            .get_by_username(username)
            .map_err(|err| map_repo(err, resource()))?
            .ok_or_else(|| ServiceError::NotFound(resource()))
    }

    /// Replaces the caller's password after verifying the old one.
    pub fn update_password(&self, actor: &Actor, change: &PasswordChange) -> ServiceResult<User> {
        let user_id = require_user_id(actor.user_id)?;
        validate_password(&change.new_password)?;

        let not_found = || ServiceError::NotFound(Resource::User(user_id));
        let user = self
            .users
            .get_by_id(user_id)
            .map_err(|err| map_repo(err, Resource::User(user_id)))?
            .ok_or_else(not_found)?;

        if !self.credentials.verify(&change.old_password, &user.password) {
            return Err(ServiceError::Authentication(user_id));
        }

        let new_hash = self.credentials.hash(&change.new_password)?;
        let updated = self
            .users
            .update_password(user_id, &new_hash)
            .map_err(|err| map_repo(err, Resource::User(user_id)))?;
        if !updated {
            return Err(not_found());
        }

        self.users
            .get_by_id(user_id)
            .map_err(|err| map_repo(err, Resource::User(user_id)))?
            .ok_or_else(not_found)
    }

    /// Merges `patch` into the caller's record.
    pub fn update_user(&self, actor: &Actor, patch: &UserPatch) -> ServiceResult<User> {
        let user_id = require_user_id(actor.user_id)?;
        patch.validate()?;
        self.users
            .update_partial(user_id, patch)
            .map_err(|err| map_repo(err, Resource::User(user_id)))?
            .ok_or(ServiceError::NotFound(Resource::User(user_id)))
    }

    /// Deletes the caller's account record.
    pub fn delete_user(&self, actor: &Actor) -> ServiceResult<()> {
        let user_id = require_user_id(actor.user_id)?;
        let removed = self
            .users
            .delete_user(user_id)
            .map_err(|err| map_repo(err, Resource::User(user_id)))?;
        if !removed {
            return Err(ServiceError::NotFound(Resource::User(user_id)));
        }
        Ok(())
    }

    pub fn set_profile_photo(&self, actor: &Actor, photo: &str) -> ServiceResult<ProfilePhoto> {
        let user_id = require_user_id(actor.user_id)?;
        if photo.is_empty() {
            return Err(ValidationError::EmptyPhoto.into());
        }
        self.photos
            .set_photo(user_id, photo)
            .map_err(|err| map_repo(err, Resource::ProfilePhoto(user_id)))
    }

    pub fn get_profile_photo(&self, actor: &Actor) -> ServiceResult<ProfilePhoto> {
        let user_id = require_user_id(actor.user_id)?;
        self.photos
            .get_photo(user_id)
            .map_err(|err| map_repo(err, Resource::ProfilePhoto(user_id)))?
            .ok_or(ServiceError::NotFound(Resource::ProfilePhoto(user_id)))
    }

    /// Idempotent. Returns whether a photo existed.
    pub fn delete_profile_photo(&self, actor: &Actor) -> ServiceResult<bool> {
        let user_id = require_user_id(actor.user_id)?;
        self.photos
            .delete_photo(user_id)
            .map_err(|err| map_repo(err, Resource::ProfilePhoto(user_id)))
    }

    pub fn get_events(&self, actor: &Actor, kind: EventKind) -> ServiceResult<EventCollection> {
        let user_id = require_user_id(actor.user_id)?;
        let resource = Resource::Events(kind, user_id);
        match self.events(kind).get_events(user_id) {
            Ok(Some(collection)) => Ok(collection),
            Ok(None) => Err(ServiceError::NotFound(resource)),
            Err(err) => Err(map_repo(err, resource)),
        }
    }

    pub fn add_events(
        &self,
        request: &EventIdsRequest,
        kind: EventKind,
    ) -> ServiceResult<MembershipUpdate> {
        let user_id = validate_event_request(request)?;
        self.events(kind)
            .add_events(user_id, &request.event_ids)
            .map_err(|err| map_repo(err, Resource::Events(kind, user_id)))
    }

    pub fn remove_events(
        &self,
        request: &EventIdsRequest,
        kind: EventKind,
    ) -> ServiceResult<MembershipUpdate> {
        let user_id = validate_event_request(request)?;
        self.events(kind)
            .remove_events(user_id, &request.event_ids)
            .map_err(|err| map_repo(err, Resource::Events(kind, user_id)))
    }

    pub fn get_saved_events(&self, actor: &Actor) -> ServiceResult<EventCollection> {
        self.get_events(actor, EventKind::Saved)
    }

    pub fn add_to_saved_events(&self, request: &EventIdsRequest) -> ServiceResult<MembershipUpdate> {
        self.add_events(request, EventKind::Saved)
    }

    pub fn remove_from_saved_events(
        &self,
        request: &EventIdsRequest,
    ) -> ServiceResult<MembershipUpdate> {
        self.remove_events(request, EventKind::Saved)
    }

    pub fn get_attended_events(&self, actor: &Actor) -> ServiceResult<EventCollection> {
        self.get_events(actor, EventKind::Attended)
    }

    pub fn add_to_attended_events(
        &self,
        request: &EventIdsRequest,
    ) -> ServiceResult<MembershipUpdate> {
        self.add_events(request, EventKind::Attended)
    }

    pub fn remove_from_attended_events(
        &self,
        request: &EventIdsRequest,
    ) -> ServiceResult<MembershipUpdate> {
        self.remove_events(request, EventKind::Attended)
    }
}

fn validate_event_request(request: &EventIdsRequest) -> ServiceResult<UserId> {
    let user_id = require_user_id(request.user_id)?;
    if request.event_ids.is_empty() {
        return Err(ValidationError::EmptyEventIds.into());
    }
    if request.event_ids.iter().any(|id| id.trim().is_empty()) {
        return Err(ValidationError::BlankEventId.into());
    }
    Ok(user_id)
}
