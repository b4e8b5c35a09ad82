//! Credential records and access-code lookup
//!
//! Identity/authorization data mapping access codes to a session. Owned
//! by an external identity component; this core consumes it only as a
//! lookup at authentication time. Codes are stored as SHA-256 digests,
//! never plaintext.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Which of the two per-family access codes matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AccessRole {
    Child,
    Guardian,
}

/// Result of a successful access-code lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGrant {
    pub session_id: String,
    pub role: AccessRole,
}

/// One family's identity record, 1:1 with a session record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub session_id: String,
    pub child_code_digest: String,
    pub guardian_code_digest: String,
    pub email: String,
    pub subscribed: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub calendar_notes: Option<String>,
}

/// Hex SHA-256 digest used for code storage and lookup.
pub fn hash_access_code(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.trim().to_lowercase().as_bytes());
    format!("{:x}", hasher.finalize())
}

const CODE_ALPHABET: &[u8] = b"abcdefghjkmnpqrstuvwxyz23456789";
const CODE_LEN: usize = 8;

/// Generate a fresh access code for registration tooling. Ambiguous
/// glyphs (0/O, 1/l) are excluded from the alphabet.
pub fn generate_access_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Display metadata exposed to external collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialMetadata {
    pub email: String,
    pub subscribed: bool,
    pub created_at: DateTime<Utc>,
    pub calendar_notes: Option<String>,
}

/// Lookup contract used at authentication time.
pub trait CredentialDirectory: Send + Sync {
    fn find_session_id_by_access_code(&self, code: &str) -> Option<AccessGrant>;

    fn metadata_for_session(&self, session_id: &str) -> Option<CredentialMetadata>;
}

/// In-memory directory keyed by code digest.
#[derive(Default)]
pub struct InMemoryCredentialDirectory {
    by_digest: RwLock<HashMap<String, AccessGrant>>,
    by_session: RwLock<HashMap<String, Credential>>,
}

impl InMemoryCredentialDirectory {
    pub fn new() -> Self {
        InMemoryCredentialDirectory::default()
    }

    pub fn register(&self, credential: Credential) {
        if let Ok(mut digests) = self.by_digest.write() {
            digests.insert(
                credential.child_code_digest.clone(),
                AccessGrant {
                    session_id: credential.session_id.clone(),
                    role: AccessRole::Child,
                },
            );
            digests.insert(
                credential.guardian_code_digest.clone(),
                AccessGrant {
                    session_id: credential.session_id.clone(),
                    role: AccessRole::Guardian,
                },
            );
        }
        if let Ok(mut sessions) = self.by_session.write() {
            sessions.insert(credential.session_id.clone(), credential);
        }
    }
}

impl CredentialDirectory for InMemoryCredentialDirectory {
    fn find_session_id_by_access_code(&self, code: &str) -> Option<AccessGrant> {
        let digest = hash_access_code(code);
        self.by_digest
            .read()
            .ok()
            .and_then(|map| map.get(&digest).cloned())
    }

    fn metadata_for_session(&self, session_id: &str) -> Option<CredentialMetadata> {
        self.by_session.read().ok().and_then(|map| {
            map.get(session_id).map(|c| CredentialMetadata {
                email: c.email.clone(),
                subscribed: c.subscribed,
                created_at: c.created_at,
                calendar_notes: c.calendar_notes.clone(),
            })
        })
    }
}
