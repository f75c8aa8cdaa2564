//! Process-wide rows that belong to no session: last-used file locations and
//! settings.

use crate::error::StorageError;
use crate::store::schema::{pair_key, FileLocationRecord, SettingRecord, FILE_LOCATIONS, SETTINGS};
use crate::store::{now_millis, Store};

impl Store {
    /// Record the last path used for `category`. Last write wins.
    pub fn insert_file_location(&self, path: &str, category: &str) -> Result<(), StorageError> {
        let writer = self.writer();
        let record = FileLocationRecord {
            category: category.to_string(),
            path: path.to_string(),
            access_time_ms: now_millis(),
        };
        writer.transaction(|tx| tx.put(FILE_LOCATIONS, category.as_bytes(), &record))
    }

    pub fn select_file_location(&self, category: &str) -> Result<Option<String>, StorageError> {
        Ok(self
            .get::<FileLocationRecord>(FILE_LOCATIONS, category.as_bytes())?
            .map(|r| r.path))
    }

    pub fn put_setting(&self, category: &str, key: &str, value: &str) -> Result<(), StorageError> {
        if category.contains('\0') {
            return Err(StorageError::constraint(SETTINGS.name, "category contains NUL"));
        }
        let writer = self.writer();
        let record = SettingRecord {
            category: category.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        };
        writer.transaction(|tx| {
            tx.put(SETTINGS, &pair_key(category.as_bytes(), key.as_bytes()), &record)
        })
    }

    pub fn get_setting(&self, category: &str, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self
            .get::<SettingRecord>(SETTINGS, &pair_key(category.as_bytes(), key.as_bytes()))?
            .map(|r| r.value))
    }

    pub fn get_settings(&self, category: &str) -> Result<Vec<SettingRecord>, StorageError> {
        self.scan(SETTINGS, &pair_key(category.as_bytes(), &[]))
    }
}
