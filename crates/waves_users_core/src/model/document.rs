//! Per-user documents kept in the document store.
//!
//! # Invariants
//! - At most one `ProfilePhoto` per owning user.
//! - At most one `EventCollection` per `(user_id, kind)`.
//! - `EventCollection::events` never holds duplicates and is never empty
//!   while the document exists.

use crate::model::user::UserId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Document identity, independent of the owning user.
pub type DocumentId = String;

/// Single profile photo document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePhoto {
    pub id: DocumentId,
    pub user_id: UserId,
    /// Base64 payload, optionally as a `data:` URI.
    pub photo: String,
}

/// Which event collection a membership store manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Saved,
    Attended,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Saved => "saved",
            Self::Attended => "attended",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "saved" => Some(Self::Saved),
            "attended" => Some(Self::Attended),
            _ => None,
        }
    }
}

/// Set of opaque event identifiers owned by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventCollection {
    pub id: DocumentId,
    pub user_id: UserId,
    pub kind: EventKind,
    pub events: BTreeSet<String>,
    pub revision: u64,
}

/// Caller request naming the owner and the event ids to add or remove.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventIdsRequest {
    pub user_id: UserId,
    pub event_ids: Vec<String>,
}

impl EventIdsRequest {
    pub fn new<I, S>(user_id: UserId, event_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            user_id,
            event_ids: event_ids.into_iter().map(Into::into).collect(),
        }
    }
}

/// Result of an applied add/remove on an event collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipUpdate {
    pub user_id: UserId,
    pub kind: EventKind,
    /// Identifiers actually inserted or removed by this call.
    pub changed: BTreeSet<String>,
    /// Stored set after the call. Empty means the document was deleted.
    pub events: BTreeSet<String>,
}
