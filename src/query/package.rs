//! Package queries: fingerprint-deduplicated package rows, the packages a
//! session uses, and per-package option lists.

use crate::error::StorageError;
use crate::store::schema::{
    pair_key, OptionRecord, PackageRecord, SessionPackageRecord, OPTIONS, PACKAGES,
    PACKAGE_FINGERPRINTS, SESSIONS, SESSION_PACKAGES,
};
use crate::store::{now_millis, Store};
use crate::types::{PackageId, PackageType, SessionId};
use tracing::debug;

fn fingerprint_key(path: &str, crc: u32) -> Vec<u8> {
    pair_key(path.as_bytes(), &crc.to_be_bytes())
}

fn option_prefix(package: PackageId, category: &str) -> Vec<u8> {
    let mut prefix = package.to_key().to_vec();
    prefix.extend_from_slice(category.as_bytes());
    prefix.push(0);
    prefix
}

impl Store {
    /// Insert a package keyed by its (path, crc) fingerprint. Loading the
    /// same fingerprint again returns the existing id and changes nothing.
    pub fn insert_package(
        &self,
        path: &str,
        crc: u32,
        package_type: PackageType,
        version: Option<&str>,
    ) -> Result<PackageId, StorageError> {
        let writer = self.writer();
        let fp = fingerprint_key(path, crc);
        if let Some(existing) = self.get::<PackageId>(PACKAGE_FINGERPRINTS, &fp)? {
            debug!(path, crc, package = %existing, "Package fingerprint already loaded");
            return Ok(existing);
        }

        let id = PackageId(writer.next_id()?);
        let record = PackageRecord {
            id,
            path: path.to_string(),
            crc,
            package_type,
            version: version.map(str::to_string),
            created_at_ms: now_millis(),
        };
        writer.transaction(|tx| {
            tx.put(PACKAGES, &id.to_key(), &record)?;
            tx.put(PACKAGE_FINGERPRINTS, &fp, &id)
        })?;
        debug!(path, crc, package = %id, "Package inserted");
        Ok(id)
    }

    pub fn get_package(&self, id: PackageId) -> Result<Option<PackageRecord>, StorageError> {
        self.get(PACKAGES, &id.to_key())
    }

    /// Most recently loaded package for `path`, whatever its checksum.
    pub fn get_package_by_path(&self, path: &str) -> Result<Option<PackageRecord>, StorageError> {
        let prefix = pair_key(path.as_bytes(), &[]);
        let mut latest: Option<PackageId> = None;
        for id in self.scan::<PackageId>(PACKAGE_FINGERPRINTS, &prefix)? {
            if latest.map_or(true, |l| id > l) {
                latest = Some(id);
            }
        }
        match latest {
            Some(id) => self.get_package(id),
            None => Ok(None),
        }
    }

    /// Checksum recorded for a loaded file path.
    pub fn get_path_crc(&self, path: &str) -> Result<Option<u32>, StorageError> {
        Ok(self.get_package_by_path(path)?.map(|p| p.crc))
    }

    pub fn get_all_packages(&self) -> Result<Vec<PackageRecord>, StorageError> {
        self.scan(PACKAGES, &[])
    }

    /// Attach a package to a session. Attaching twice is a no-op.
    pub fn insert_session_package(
        &self,
        session: SessionId,
        package: PackageId,
        required: bool,
    ) -> Result<(), StorageError> {
        let writer = self.writer();
        if !self.contains(SESSIONS, &session.to_key())? {
            return Err(StorageError::constraint(
                SESSION_PACKAGES.name,
                format!("session {} does not exist", session),
            ));
        }
        if !self.contains(PACKAGES, &package.to_key())? {
            return Err(StorageError::constraint(
                SESSION_PACKAGES.name,
                format!("package {} does not exist", package),
            ));
        }
        let mut key = session.to_key().to_vec();
        key.extend_from_slice(&package.to_key());
        if self.contains(SESSION_PACKAGES, &key)? {
            return Ok(());
        }
        let record = SessionPackageRecord {
            session,
            package,
            required,
        };
        writer.transaction(|tx| tx.put(SESSION_PACKAGES, &key, &record))
    }

    /// Packages referenced by a session, in attach order of package id.
    pub fn get_session_packages(
        &self,
        session: SessionId,
    ) -> Result<Vec<PackageRecord>, StorageError> {
        let links: Vec<SessionPackageRecord> = self.scan(SESSION_PACKAGES, &session.to_key())?;
        let mut out = Vec::with_capacity(links.len());
        for link in links {
            if let Some(pkg) = self.get_package(link.package)? {
                out.push(pkg);
            }
        }
        Ok(out)
    }

    /// Catalog packages a session reads from: its `spec-properties`
    /// packages, or every loaded one when it references none.
    pub fn catalog_packages(&self, session: SessionId) -> Result<Vec<PackageId>, StorageError> {
        let own: Vec<PackageId> = self
            .get_session_packages(session)?
            .into_iter()
            .filter(|p| p.package_type == PackageType::SpecProperties)
            .map(|p| p.id)
            .collect();
        if !own.is_empty() {
            return Ok(own);
        }
        Ok(self
            .get_all_packages()?
            .into_iter()
            .filter(|p| p.package_type == PackageType::SpecProperties)
            .map(|p| p.id)
            .collect())
    }

    /// Append option values under `category`. Values already present are
    /// skipped; order of first insertion is kept.
    pub fn insert_options(
        &self,
        package: PackageId,
        category: &str,
        values: &[String],
    ) -> Result<usize, StorageError> {
        let writer = self.writer();
        if !self.contains(PACKAGES, &package.to_key())? {
            return Err(StorageError::constraint(
                OPTIONS.name,
                format!("package {} does not exist", package),
            ));
        }
        if category.contains('\0') {
            return Err(StorageError::constraint(OPTIONS.name, "category contains NUL"));
        }
        let prefix = option_prefix(package, category);
        let mut rows = Vec::new();
        for value in values {
            let mut key = prefix.clone();
            key.extend_from_slice(value.as_bytes());
            if self.contains(OPTIONS, &key)? || rows.iter().any(|(k, _)| k == &key) {
                continue;
            }
            let record = OptionRecord {
                id: writer.next_id()?,
                package,
                category: category.to_string(),
                value: value.clone(),
            };
            rows.push((key, record));
        }
        writer.transaction(|tx| {
            for (key, record) in &rows {
                tx.put(OPTIONS, key, record)?;
            }
            Ok(())
        })?;
        Ok(rows.len())
    }

    /// Option values for a category, in insertion order.
    pub fn select_all_options(
        &self,
        package: PackageId,
        category: &str,
    ) -> Result<Vec<OptionRecord>, StorageError> {
        let mut rows: Vec<OptionRecord> = self.scan(OPTIONS, &option_prefix(package, category))?;
        rows.sort_by_key(|r| r.id);
        Ok(rows)
    }

    pub fn select_option_categories(&self, package: PackageId) -> Result<Vec<String>, StorageError> {
        let mut categories: Vec<String> = Vec::new();
        let mut rows: Vec<OptionRecord> = self.scan(OPTIONS, &package.to_key())?;
        rows.sort_by_key(|r| r.id);
        for row in rows {
            if !categories.contains(&row.category) {
                categories.push(row.category);
            }
        }
        Ok(categories)
    }
}

/// Validation helper used by writers that reference a package.
pub(crate) fn require_package(
    store: &Store,
    table: &'static str,
    package: PackageId,
) -> Result<(), StorageError> {
    if store.contains(PACKAGES, &package.to_key())? {
        Ok(())
    } else {
        Err(StorageError::constraint(
            table,
            format!("package {} does not exist", package),
        ))
    }
}
