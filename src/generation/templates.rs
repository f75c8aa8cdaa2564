//! Template resolution and the process-wide compilation cache.
//!
//! Compiled templates are keyed by their resolved path and kept until the
//! template directory changes. Changing the directory clears the cache
//! before the next lookup, so every template recompiles on next use.

use crate::error::{ApiError, GenerationError};
use crate::generation::engine::{CompiledTemplate, TemplateEngine};
use crate::generation::options::{GenerationConfig, GenerationOptions};
use crate::generation::plan::TemplateId;
use crate::loader::{canonical_path, content_checksum};
use crate::store::Store;
use crate::types::{PackageId, PackageType};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info};

#[derive(Debug, Default)]
pub struct TemplateCache {
    directory: Mutex<Option<PathBuf>>,
    entries: Mutex<HashMap<PathBuf, CompiledTemplate>>,
    compilations: Mutex<usize>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache shared by every run in the process.
    pub fn global() -> &'static TemplateCache {
        static CACHE: OnceLock<TemplateCache> = OnceLock::new();
        CACHE.get_or_init(TemplateCache::new)
    }

    /// Point the cache at `directory`. A different directory drops every
    /// cached compilation.
    pub fn set_directory(&self, directory: &Path) {
        let mut current = self.directory.lock();
        if current.as_deref() != Some(directory) {
            let mut entries = self.entries.lock();
            if !entries.is_empty() {
                info!(
                    directory = %directory.display(),
                    dropped = entries.len(),
                    "Template directory changed, clearing compiled templates"
                );
            }
            entries.clear();
            *current = Some(directory.to_path_buf());
        }
    }

    pub fn directory(&self) -> Option<PathBuf> {
        self.directory.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Number of compilations performed since creation.
    pub fn compilations(&self) -> usize {
        *self.compilations.lock()
    }

    /// Compiled template for `path`, compiling it on first use.
    pub async fn get_or_compile(
        &self,
        engine: &dyn TemplateEngine,
        path: &Path,
    ) -> Result<CompiledTemplate, GenerationError> {
        if let Some(hit) = self.entries.lock().get(path) {
            return Ok(hit.clone());
        }
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            GenerationError::TemplateResolution {
                template: path.display().to_string(),
                message: e.to_string(),
            }
        })?;
        let name = path.display().to_string();
        let compiled = engine
            .compile(&name, &text)
            .map_err(|message| GenerationError::Render {
                template: name.clone(),
                message,
            })?;

        let mut entries = self.entries.lock();
        let entry = entries.entry(path.to_path_buf()).or_insert_with(|| {
            *self.compilations.lock() += 1;
            compiled
        });
        debug!(template = %name, "Template compiled");
        Ok(entry.clone())
    }
}

/// Resolve template identifiers against `directory`. A missing directory or
/// template is a resolution failure.
pub async fn resolve_templates<'a>(
    directory: &Path,
    templates: impl IntoIterator<Item = &'a TemplateId>,
) -> Result<Vec<(TemplateId, PathBuf)>, GenerationError> {
    let is_dir = tokio::fs::metadata(directory)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);
    if !is_dir {
        return Err(GenerationError::TemplateResolution {
            template: directory.display().to_string(),
            message: "template directory does not exist".to_string(),
        });
    }
    let mut resolved = Vec::new();
    for id in templates {
        let path = directory.join(&id.0);
        let exists = tokio::fs::metadata(&path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !exists {
            return Err(GenerationError::TemplateResolution {
                template: id.0.clone(),
                message: format!("not found in {}", directory.display()),
            });
        }
        resolved.push((id.clone(), path));
    }
    Ok(resolved)
}

/// Record the options descriptor and every template file it names as
/// packages, returning the descriptor's package id.
pub async fn register_template_packages(
    store: &Store,
    config: &GenerationConfig,
) -> Result<(PackageId, Vec<PackageId>), ApiError> {
    let options = GenerationOptions::load(&config.options_file).await?;
    let descriptor = register_file(store, &config.options_file, PackageType::GenTemplatesJson)?;
    let mut templates = Vec::new();
    for unit in &options.units {
        let directory = config.unit_template_directory(unit);
        for row in &unit.templates {
            let path = directory.join(&row.template_file);
            if path.is_file() {
                let id = register_file(store, &path, PackageType::GenTemplate)?;
                if !templates.contains(&id) {
                    templates.push(id);
                }
            }
        }
    }
    Ok((descriptor, templates))
}

fn register_file(store: &Store, path: &Path, package_type: PackageType) -> Result<PackageId, ApiError> {
    let bytes = std::fs::read(path)
        .map_err(|e| ApiError::ConfigError(format!("Cannot read {}: {}", path.display(), e)))?;
    let canonical = canonical_path(path)?;
    Ok(store.insert_package(&canonical, content_checksum(&bytes), package_type, None)?)
}
