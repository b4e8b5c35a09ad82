//! Remote multi-tenant session store
//!
//! HTTP client for the shared document store. One document per session,
//! addressed by session id under the configured tenant. Full writes are
//! single atomic document PUTs guarded by a revision precondition; narrow
//! patches send only the fields they carry and the backend merges nested
//! maps per key.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use base64::Engine;
use log::{debug, warn};
use reqwest::blocking::Client;
use reqwest::StatusCode;

use crate::runtime_config::RemoteStoreConfig;
use crate::session_record::SessionRecord;
use crate::session_store::{SessionPatch, SessionStore, StoreError};

pub struct RemoteSessionStore {
    client: Client,
    base_url: String,
    tenant: String,
    auth_header: String,
    // session id -> last revision seen, replayed as If-Match on full writes
    revisions: Mutex<HashMap<String, String>>,
}

impl RemoteSessionStore {
    pub fn new(config: &RemoteStoreConfig) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| StoreError::unavailable(format!("failed to build HTTP client: {e}")))?;

        let credentials = format!("{}:{}", config.tenant, config.auth_token);
        let auth_header = format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(credentials)
        );

        Ok(RemoteSessionStore {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            tenant: config.tenant.clone(),
            auth_header,
            revisions: Mutex::new(HashMap::new()),
        })
    }

    fn document_url(&self, session_id: &str) -> String {
        format!(
            "{}/tenants/{}/sessions/{}",
            self.base_url, self.tenant, session_id
        )
    }

    fn cached_revision(&self, session_id: &str) -> Option<String> {
        self.revisions
            .lock()
            .ok()
            .and_then(|map| map.get(session_id).cloned())
    }

    fn remember_revision(&self, session_id: &str, revision: Option<String>) {
        if let Ok(mut map) = self.revisions.lock() {
            match revision {
                Some(rev) => {
                    map.insert(session_id.to_string(), rev);
                }
                None => {
                    map.remove(session_id);
                }
            }
        }
    }

    fn revision_from(response: &reqwest::blocking::Response) -> Option<String> {
        response
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string())
    }

    fn transport_error(context: &str, err: reqwest::Error) -> StoreError {
        StoreError::unavailable(format!("{context}: {err}"))
    }
}

impl SessionStore for RemoteSessionStore {
    fn read_session(&self, session_id: &str) -> Result<Option<SessionRecord>, StoreError> {
        let response = self
            .client
            .get(self.document_url(session_id))
            .header(reqwest::header::AUTHORIZATION, &self.auth_header)
            .send()
            .map_err(|e| Self::transport_error("session read", e))?;

        match response.status() {
            StatusCode::OK => {
                self.remember_revision(session_id, Self::revision_from(&response));
                let record: SessionRecord = response
                    .json()
                    .map_err(|e| StoreError::serialization(e.to_string()))?;
                debug!("read remote session {session_id}");
                Ok(Some(record))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_server_error() => Err(StoreError::unavailable(format!(
                "session read returned {status}"
            ))),
            status => Err(StoreError::unavailable(format!(
                "unexpected status {status} reading session {session_id}"
            ))),
        }
    }

    fn write_session(&self, session_id: &str, record: &SessionRecord) -> Result<(), StoreError> {
        let mut request = self
            .client
            .put(self.document_url(session_id))
            .header(reqwest::header::AUTHORIZATION, &self.auth_header)
            .json(record);

        if let Some(revision) = self.cached_revision(session_id) {
            request = request.header(reqwest::header::IF_MATCH, revision);
        }

        let response = request
            .send()
            .map_err(|e| Self::transport_error("session write", e))?;

        match response.status() {
            status if status.is_success() => {
                self.remember_revision(session_id, Self::revision_from(&response));
                debug!("wrote remote session {session_id}");
                Ok(())
            }
            StatusCode::PRECONDITION_FAILED | StatusCode::CONFLICT => {
                // Stale revision: the caller must re-read and retry.
                warn!("revision conflict writing session {session_id}");
                self.remember_revision(session_id, None);
                Err(StoreError::conflict(
                    session_id,
                    "document revision precondition failed",
                ))
            }
            status if status.is_server_error() => Err(StoreError::unavailable(format!(
                "session write returned {status}"
            ))),
            status => Err(StoreError::unavailable(format!(
                "unexpected status {status} writing session {session_id}"
            ))),
        }
    }

    fn patch_session_fields(
        &self,
        session_id: &str,
        patch: &SessionPatch,
    ) -> Result<(), StoreError> {
        if patch.is_empty() {
            return Ok(());
        }
        let response = self
            .client
            .patch(self.document_url(session_id))
            .header(reqwest::header::AUTHORIZATION, &self.auth_header)
            .json(patch)
            .send()
            .map_err(|e| Self::transport_error("session patch", e))?;

        match response.status() {
            status if status.is_success() => {
                debug!("patched remote session {session_id}");
                Ok(())
            }
            StatusCode::NOT_FOUND => Err(StoreError::not_found(session_id)),
            status if status.is_server_error() => Err(StoreError::unavailable(format!(
                "session patch returned {status}"
            ))),
            status => Err(StoreError::unavailable(format!(
                "unexpected status {status} patching session {session_id}"
            ))),
        }
    }
}
