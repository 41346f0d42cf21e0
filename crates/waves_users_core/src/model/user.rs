//! User account domain model.
//!
//! # Responsibility
//! - Define the authoritative user record and its partial-update patch.
//! - Own field rules shared by registration, profile update and password
//!   change paths.
//!
//! # Invariants
//! - `user_id` is stable and never reassigned.
//! - `password` only ever holds a credential hash, never plaintext.
//! - `revision` increases by one on every persisted change.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable account identity.
pub type UserId = Uuid;

static GMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9.+_%$#&-]+@gmail\.com$").expect("valid email regex")
});

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum UserType {
    Admin,
    User,
}

impl UserType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "Admin",
            Self::User => "User",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Admin" => Some(Self::Admin),
            "User" => Some(Self::User),
            _ => None,
        }
    }
}

/// Authoritative user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: UserId,
    pub username: String,
    /// Credential hash. Never serialized outward.
    #[serde(skip_serializing, default)]
    pub password: String,
    pub legal_name: String,
    pub email: String,
    pub mobile_number: String,
    /// Three-letter country code.
    pub country: String,
    #[serde(rename = "type")]
    pub kind: UserType,
    /// Optimistic-concurrency token, bumped by every persisted update.
    pub revision: u64,
}

impl User {
    /// Creates a new `User`-role account with a generated identity.
    ///
    /// `password_hash` must already be a credential hash.
    pub fn new(
        username: impl Into<String>,
        password_hash: impl Into<String>,
        legal_name: impl Into<String>,
        email: impl Into<String>,
        mobile_number: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        Self {
            user_id: Uuid::new_v4(),
            username: username.into(),
            password: password_hash.into(),
            legal_name: legal_name.into(),
            email: email.into(),
            mobile_number: mobile_number.into(),
            country: country.into(),
            kind: UserType::User,
            revision: 0,
        }
    }

    /// Checks every stored field rule except the password, which is a hash
    /// by the time a record exists.
    pub fn validate(&self) -> Result<(), UserValidationError> {
        if self.user_id.is_nil() {
            return Err(UserValidationError::NilUserId);
        }
        check_length(UserField::Username, &self.username)?;
        check_length(UserField::LegalName, &self.legal_name)?;
        validate_email(&self.email)?;
        check_length(UserField::MobileNumber, &self.mobile_number)?;
        check_length(UserField::Country, &self.country)?;
        Ok(())
    }

    /// Merges non-empty, differing patch fields into this record.
    ///
    /// Returns whether any field changed. `revision` is left untouched.
    pub fn apply_patch(&mut self, patch: &UserPatch) -> bool {
        let mut changed = false;
        changed |= merge_text(&mut self.legal_name, patch.legal_name.as_deref());
        changed |= merge_text(&mut self.email, patch.email.as_deref());
        changed |= merge_text(&mut self.mobile_number, patch.mobile_number.as_deref());
        if let Some(kind) = patch.kind {
            if self.kind != kind {
                self.kind = kind;
                changed = true;
            }
        }
        changed
    }
}

fn merge_text(stored: &mut String, incoming: Option<&str>) -> bool {
    match incoming {
        Some(value) if !value.is_empty() && stored.as_str() != value => {
            *stored = value.to_string();
            true
        }
        _ => false,
    }
}

/// Partial profile update. `None` and empty strings leave fields untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    pub legal_name: Option<String>,
    pub email: Option<String>,
    pub mobile_number: Option<String>,
    /// `""` on the wire means "leave the role alone".
    #[serde(rename = "type", default, deserialize_with = "blank_as_none_user_type")]
    pub kind: Option<UserType>,
    /// When set, the update only applies if the stored revision matches.
    pub expected_revision: Option<u64>,
}

impl UserPatch {
    /// Validates only the fields that would be written.
    pub fn validate(&self) -> Result<(), UserValidationError> {
        if let Some(value) = non_empty(self.legal_name.as_deref()) {
            check_length(UserField::LegalName, value)?;
        }
        if let Some(value) = non_empty(self.email.as_deref()) {
            validate_email(value)?;
        }
        if let Some(value) = non_empty(self.mobile_number.as_deref()) {
            check_length(UserField::MobileNumber, value)?;
        }
        Ok(())
    }
}

fn blank_as_none_user_type<'de, D>(deserializer: D) -> Result<Option<UserType>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref() {
        None | Some("") => Ok(None),
        Some(value) => UserType::parse(value).map(Some).ok_or_else(|| {
            serde::de::Error::custom(format!("unknown user type `{value}`, expected Admin|User"))
        }),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.is_empty())
}

/// User fields with length rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserField {
    Username,
    Password,
    LegalName,
    Email,
    MobileNumber,
    Country,
}

impl UserField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Username => "username",
            Self::Password => "password",
            Self::LegalName => "legal_name",
            Self::Email => "email",
            Self::MobileNumber => "mobile_number",
            Self::Country => "country",
        }
    }

    /// Inclusive character-count bounds.
    pub fn length_bounds(self) -> (usize, usize) {
        match self {
            Self::Username => (3, 20),
            Self::Password => (8, 120),
            Self::LegalName => (4, 20),
            Self::Email => (4, 30),
            Self::MobileNumber => (7, 15),
            Self::Country => (3, 3),
        }
    }
}

/// Field rule violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserValidationError {
    NilUserId,
    Length {
        field: UserField,
        min: usize,
        max: usize,
        actual: usize,
    },
    /// Email is not an allowed Gmail address.
    Email(String),
}

impl Display for UserValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilUserId => write!(f, "user id must not be nil"),
            Self::Length {
                field,
                min,
                max,
                actual,
            } => write!(
                f,
                "{} must be {min}..={max} characters, got {actual}",
                field.as_str()
            ),
            Self::Email(value) => write!(
                f,
                "email `{value}` must be a valid Gmail address with allowed symbols"
            ),
        }
    }
}

impl Error for UserValidationError {}

/// Checks the password field rule on plaintext input.
pub fn validate_password(plaintext: &str) -> Result<(), UserValidationError> {
    check_length(UserField::Password, plaintext)
}

fn validate_email(value: &str) -> Result<(), UserValidationError> {
    check_length(UserField::Email, value)?;
    if !GMAIL_RE.is_match(value) {
        return Err(UserValidationError::Email(value.to_string()));
    }
    Ok(())
}

fn check_length(field: UserField, value: &str) -> Result<(), UserValidationError> {
    let (min, max) = field.length_bounds();
    let actual = value.chars().count();
    if actual < min || actual > max {
        return Err(UserValidationError::Length {
            field,
            min,
            max,
            actual,
        });
    }
    Ok(())
}
