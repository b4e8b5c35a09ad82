//! Local single-tenant session store backed by sled.

use std::sync::Mutex;

use log::debug;
use sled::Db;

use crate::session_record::SessionRecord;
use crate::session_store::{SessionPatch, SessionStore, StoreError};

/// A sled-backed implementation of `SessionStore`.
///
/// One process owns the database; patches are serialized through an
/// instance lock so interleaved narrow updates never lose fields.
pub struct SledSessionStore {
    db: Db,
    patch_lock: Mutex<()>,
}

impl SledSessionStore {
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let db = sled::open(path)
            .map_err(|e| StoreError::unavailable(format!("failed to open sled DB at {path}: {e}")))?;
        Ok(SledSessionStore {
            db,
            patch_lock: Mutex::new(()),
        })
    }

    fn serialize_record(record: &SessionRecord) -> Result<Vec<u8>, StoreError> {
        serde_json::to_vec(record).map_err(|e| StoreError::serialization(e.to_string()))
    }

    fn deserialize_record(bytes: &[u8]) -> Result<SessionRecord, StoreError> {
        serde_json::from_slice(bytes).map_err(|e| StoreError::serialization(e.to_string()))
    }

    fn tree(&self) -> Result<sled::Tree, StoreError> {
        self.db
            .open_tree("sessions")
            .map_err(|e| StoreError::unavailable(format!("failed to open sessions tree: {e}")))
    }
}

impl SessionStore for SledSessionStore {
    fn read_session(&self, session_id: &str) -> Result<Option<SessionRecord>, StoreError> {
        let tree = self.tree()?;
        match tree
            .get(session_id.as_bytes())
            .map_err(|e| StoreError::unavailable(e.to_string()))?
        {
            Some(bytes) => {
                let record = Self::deserialize_record(&bytes)?;
                debug!("read session {session_id}");
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn write_session(&self, session_id: &str, record: &SessionRecord) -> Result<(), StoreError> {
        let data = Self::serialize_record(record)?;
        let tree = self.tree()?;
        tree.insert(session_id.as_bytes(), data)
            .map_err(|e| StoreError::unavailable(e.to_string()))?;
        tree.flush()
            .map_err(|e| StoreError::unavailable(e.to_string()))?;
        debug!("wrote session {session_id}");
        Ok(())
    }

    fn patch_session_fields(
        &self,
        session_id: &str,
        patch: &SessionPatch,
    ) -> Result<(), StoreError> {
        if patch.is_empty() {
            return Ok(());
        }
        // Read-merge-write under the patch lock; only patched fields move.
        let _guard = self
            .patch_lock
            .lock()
            .map_err(|_| StoreError::unavailable("patch lock poisoned"))?;

        let mut record = self
            .read_session(session_id)?
            .ok_or_else(|| StoreError::not_found(session_id))?;
        patch.apply_to(&mut record);
        self.write_session(session_id, &record)
    }
}
