//! Versioned upgrade of a persisted store.
//!
//! The schema version lives in the `meta` tree. Opening a store runs every
//! upgrade step between the recorded version and [`CURRENT_SCHEMA_VERSION`];
//! a store written by a newer build is refused.

use crate::error::StorageError;
use crate::store::schema::{SessionRecord, SESSIONS, SESSION_WINDOWS};
use crate::store::{to_storage_io, Store};
use tracing::info;

pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// Version assumed for a non-empty store with no recorded version.
const LEGACY_SCHEMA_VERSION: u32 = 1;
const KEY_SCHEMA_VERSION: &[u8] = b"schema_version";

struct UpgradeStep {
    from: u32,
    description: &'static str,
    apply: fn(&Store) -> Result<(), StorageError>,
}

const UPGRADES: &[UpgradeStep] = &[UpgradeStep {
    from: 1,
    description: "index sessions by window id",
    apply: rebuild_window_index,
}];

/// Bring `store` to the current schema version and return it.
pub(crate) fn ensure_schema(store: &Store) -> Result<u32, StorageError> {
    let recorded = read_version(store)?;
    let mut version = match recorded {
        Some(v) => v,
        None if store.is_empty() => {
            write_version(store, CURRENT_SCHEMA_VERSION)?;
            return Ok(CURRENT_SCHEMA_VERSION);
        }
        None => LEGACY_SCHEMA_VERSION,
    };

    if version > CURRENT_SCHEMA_VERSION {
        return Err(StorageError::UnsupportedSchema {
            found: version,
            supported: CURRENT_SCHEMA_VERSION,
        });
    }

    let start = version;
    for step in UPGRADES.iter().filter(|s| s.from >= start) {
        info!(
            from = step.from,
            to = step.from + 1,
            step = step.description,
            "Upgrading store schema"
        );
        (step.apply)(store)?;
        version = step.from + 1;
        write_version(store, version)?;
    }

    if recorded != Some(version) {
        write_version(store, version)?;
    }
    Ok(version)
}

pub fn read_version(store: &Store) -> Result<Option<u32>, StorageError> {
    let Some(raw) = store.meta().get(KEY_SCHEMA_VERSION).map_err(to_storage_io)? else {
        return Ok(None);
    };
    let bytes: [u8; 4] = raw.as_ref().try_into().map_err(|_| {
        StorageError::InvalidData(format!("Malformed schema version ({} bytes)", raw.len()))
    })?;
    Ok(Some(u32::from_be_bytes(bytes)))
}

pub(crate) fn write_version(store: &Store, version: u32) -> Result<(), StorageError> {
    store
        .meta()
        .insert(KEY_SCHEMA_VERSION, version.to_be_bytes().to_vec())
        .map_err(to_storage_io)?;
    Ok(())
}

fn rebuild_window_index(store: &Store) -> Result<(), StorageError> {
    let sessions: Vec<SessionRecord> = store.scan(SESSIONS, &[])?;
    let writer = store.writer();
    writer.unrestricted_tx(|tx| {
        for session in &sessions {
            if let Some(window) = session.window_id {
                tx.put(SESSION_WINDOWS, &window.to_be_bytes(), &session.id)?;
            }
        }
        Ok(())
    })
}
