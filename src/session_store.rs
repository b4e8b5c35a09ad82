//! Persistence port
//!
//! Abstract key-addressed record store for session documents. Two
//! interchangeable implementations share this contract: a sled-backed
//! local single-tenant store and a remote multi-tenant document store.
//! Callers above the progression engine never touch this directly.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session_record::SessionRecord;

/// Failure taxonomy of the persistence port.
///
/// `Unavailable` is transient and may be retried by the caller; the
/// engine itself never retries. `Conflict` is only produced by the remote
/// implementation when a revision precondition fails and means "re-read
/// and retry", never "overwrite".
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("no session found for id '{session_id}'")]
    NotFound { session_id: String },

    #[error("backend unavailable: {message}")]
    Unavailable { message: String },

    #[error("write conflict for session '{session_id}': {message}")]
    Conflict { session_id: String, message: String },

    #[error("session record serialization failed: {message}")]
    Serialization { message: String },
}

impl StoreError {
    pub fn not_found(session_id: impl Into<String>) -> Self {
        StoreError::NotFound {
            session_id: session_id.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        StoreError::Unavailable {
            message: message.into(),
        }
    }

    pub fn conflict(session_id: impl Into<String>, message: impl Into<String>) -> Self {
        StoreError::Conflict {
            session_id: session_id.into(),
            message: message.into(),
        }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        StoreError::Serialization {
            message: message.into(),
        }
    }
}

/// Narrow update touching only the fields it carries.
///
/// Used where a full-document overwrite would be wasteful or racy: the
/// guardian device updating `friend_names` must never clobber fields the
/// child device is mutating concurrently. `crisis_status` entries merge
/// per key rather than replacing the map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_names: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub friend_names: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewed_emails: Option<BTreeSet<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewed_bonus_emails: Option<BTreeSet<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crisis_status: Option<BTreeMap<String, bool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl SessionPatch {
    pub fn is_empty(&self) -> bool {
        self.player_names.is_none()
            && self.friend_names.is_none()
            && self.viewed_emails.is_none()
            && self.viewed_bonus_emails.is_none()
            && self.crisis_status.is_none()
            && self.last_updated.is_none()
    }

    pub fn with_friend_names(names: Vec<String>) -> Self {
        SessionPatch {
            friend_names: Some(names),
            last_updated: Some(Utc::now()),
            ..SessionPatch::default()
        }
    }

    pub fn with_crisis_flag(key: impl Into<String>, resolved: bool) -> Self {
        let mut crisis = BTreeMap::new();
        crisis.insert(key.into(), resolved);
        SessionPatch {
            crisis_status: Some(crisis),
            last_updated: Some(Utc::now()),
            ..SessionPatch::default()
        }
    }

    /// Merge this patch into a record. Only fields present in the patch
    /// are touched; crisis entries merge key by key.
    pub fn apply_to(&self, record: &mut SessionRecord) {
        if let Some(names) = &self.player_names {
            record.player_names = names.clone();
        }
        if let Some(names) = &self.friend_names {
            record.friend_names = names.clone();
        }
        if let Some(days) = &self.viewed_emails {
            record.viewed_emails.extend(days.iter().copied());
        }
        if let Some(days) = &self.viewed_bonus_emails {
            record.viewed_bonus_emails.extend(days.iter().copied());
        }
        if let Some(crisis) = &self.crisis_status {
            for (key, resolved) in crisis {
                record.crisis_status.insert(key.clone(), *resolved);
            }
        }
        if let Some(at) = self.last_updated {
            record.last_updated = at;
        }
    }
}

/// Session-record store keyed by session id.
///
/// `write_session` is a full-state upsert; the remote implementation
/// performs it as a single atomic document write. `patch_session_fields`
/// must only set the fields carried by the patch.
pub trait SessionStore: Send + Sync {
    fn read_session(&self, session_id: &str) -> Result<Option<SessionRecord>, StoreError>;

    fn write_session(&self, session_id: &str, record: &SessionRecord) -> Result<(), StoreError>;

    fn patch_session_fields(
        &self,
        session_id: &str,
        patch: &SessionPatch,
    ) -> Result<(), StoreError>;
}
