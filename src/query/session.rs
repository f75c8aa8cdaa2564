//! Session lifecycle, window correlation and the dirty flag.

use crate::error::StorageError;
use crate::store::schema::{
    EndpointRecord, EndpointTypeRecord, SessionRecord, Table, ATTRIBUTE_STATE, CLUSTER_STATE,
    COMMAND_STATE, ENDPOINTS, ENDPOINT_TYPES, KEY_VALUES, SESSIONS, SESSION_KEYS, SESSION_PACKAGES,
    SESSION_WINDOWS,
};
use crate::store::{now_millis, Store};
use crate::types::SessionId;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// What a window knows about its session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: SessionId,
    pub session_key: String,
    pub creation_time_ms: i64,
}

impl From<&SessionRecord> for SessionInfo {
    fn from(record: &SessionRecord) -> Self {
        Self {
            session_id: record.id,
            session_key: record.session_key.clone(),
            creation_time_ms: record.created_at_ms,
        }
    }
}

impl Store {
    /// Return the session for `session_key`, creating it (bound to
    /// `window_id`) if it does not exist. New sessions start dirty.
    pub fn ensure_session(
        &self,
        session_key: &str,
        window_id: Option<u64>,
    ) -> Result<SessionId, StorageError> {
        let writer = self.writer();
        if let Some(existing) = self.get::<SessionId>(SESSION_KEYS, session_key.as_bytes())? {
            return Ok(existing);
        }
        if let Some(window) = window_id {
            if let Some(other) = self.get::<SessionId>(SESSION_WINDOWS, &window.to_be_bytes())? {
                return Err(StorageError::constraint(
                    SESSION_WINDOWS.name,
                    format!("window {} is already bound to session {}", window, other),
                ));
            }
        }

        let id = SessionId(writer.next_id()?);
        let record = SessionRecord {
            id,
            session_key: session_key.to_string(),
            window_id,
            created_at_ms: now_millis(),
            dirty: true,
        };
        writer.transaction(|tx| {
            tx.put(SESSIONS, &id.to_key(), &record)?;
            tx.put(SESSION_KEYS, session_key.as_bytes(), &id)?;
            if let Some(window) = window_id {
                tx.put(SESSION_WINDOWS, &window.to_be_bytes(), &id)?;
            }
            Ok(())
        })?;
        info!(session = %id, session_key, "Session created");
        Ok(id)
    }

    pub fn get_session(&self, session: SessionId) -> Result<Option<SessionRecord>, StorageError> {
        self.get(SESSIONS, &session.to_key())
    }

    pub fn get_session_by_key(&self, session_key: &str) -> Result<Option<SessionRecord>, StorageError> {
        match self.get::<SessionId>(SESSION_KEYS, session_key.as_bytes())? {
            Some(id) => self.get_session(id),
            None => Ok(None),
        }
    }

    pub fn session_info_from_window(
        &self,
        window_id: u64,
    ) -> Result<Option<SessionInfo>, StorageError> {
        let Some(id) = self.get::<SessionId>(SESSION_WINDOWS, &window_id.to_be_bytes())? else {
            return Ok(None);
        };
        Ok(self.get_session(id)?.as_ref().map(SessionInfo::from))
    }

    pub fn list_sessions(&self) -> Result<Vec<SessionRecord>, StorageError> {
        self.scan(SESSIONS, &[])
    }

    /// Dirty flag of a session; `None` when the session does not exist.
    pub fn get_dirty_flag(&self, session: SessionId) -> Result<Option<bool>, StorageError> {
        Ok(self.get_session(session)?.map(|s| s.dirty))
    }

    /// The only way to clear the dirty flag. Returns the number of sessions
    /// updated (0 when the session does not exist).
    pub fn set_session_clean(&self, session: SessionId) -> Result<usize, StorageError> {
        let writer = self.writer();
        let Some(mut record) = self.get_session(session)? else {
            return Ok(0);
        };
        record.dirty = false;
        writer.transaction(|tx| tx.put(SESSIONS, &session.to_key(), &record))?;
        debug!(session = %session, "Session marked clean");
        Ok(1)
    }

    /// Tear a session down: the session row, its indexes, its package links
    /// and every session-owned row, in one transaction. Returns 1 if the
    /// session existed, 0 otherwise.
    pub fn delete_session(&self, session: SessionId) -> Result<usize, StorageError> {
        let writer = self.writer();
        let Some(record) = self.get_session(session)? else {
            return Ok(0);
        };

        let owned = self.session_owned_keys(session)?;
        let links = self.scan_keys(SESSION_PACKAGES, &session.to_key())?;

        writer.unrestricted_tx(|tx| {
            for (table, key) in &owned {
                tx.remove(*table, key)?;
            }
            for key in &links {
                tx.remove(SESSION_PACKAGES, key)?;
            }
            tx.remove(SESSION_KEYS, record.session_key.as_bytes())?;
            if let Some(window) = record.window_id {
                tx.remove(SESSION_WINDOWS, &window.to_be_bytes())?;
            }
            tx.remove(SESSIONS, &session.to_key())
        })?;
        info!(session = %session, rows = owned.len(), "Session deleted");
        Ok(1)
    }

    /// Keys of every session-owned row belonging to `session`.
    fn session_owned_keys(&self, session: SessionId) -> Result<Vec<(Table, Vec<u8>)>, StorageError> {
        let mut keys = Vec::new();
        let endpoint_types: Vec<(Vec<u8>, EndpointTypeRecord)> =
            self.scan_entries(ENDPOINT_TYPES, &[])?;
        for (key, et) in endpoint_types.into_iter().filter(|(_, et)| et.session == session) {
            for table in [CLUSTER_STATE, ATTRIBUTE_STATE, COMMAND_STATE] {
                for state in self.scan_keys(table, &et.id.to_key())? {
                    keys.push((table, state));
                }
            }
            keys.push((ENDPOINT_TYPES, key));
        }
        let endpoints: Vec<(Vec<u8>, EndpointRecord)> = self.scan_entries(ENDPOINTS, &[])?;
        keys.extend(
            endpoints
                .into_iter()
                .filter(|(_, ep)| ep.session == session)
                .map(|(key, _)| (ENDPOINTS, key)),
        );
        for key in self.scan_keys(KEY_VALUES, &session.to_key())? {
            keys.push((KEY_VALUES, key));
        }
        Ok(keys)
    }
}
