//! Output collaborators for rendered files.

use crate::error::GenerationError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

#[async_trait]
pub trait OutputSink: Send + Sync {
    /// Directory bound into the render context as `generationDirectory`.
    fn directory(&self) -> &Path;

    /// Write `contents` to `relative` under the sink's directory and return
    /// the written path.
    async fn write(&self, relative: &str, contents: &str) -> Result<PathBuf, GenerationError>;
}

/// Rejects absolute paths and `..` so a unit cannot write outside its
/// directory.
fn checked_relative(relative: &str) -> Result<&Path, GenerationError> {
    let path = Path::new(relative);
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes || relative.is_empty() {
        return Err(GenerationError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "output file must be a relative path inside the output directory",
            ),
        });
    }
    Ok(path)
}

/// Writes files under a directory, atomically per file (temp file + rename).
#[derive(Debug, Clone)]
pub struct FsOutput {
    root: PathBuf,
}

impl FsOutput {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl OutputSink for FsOutput {
    fn directory(&self) -> &Path {
        &self.root
    }

    async fn write(&self, relative: &str, contents: &str) -> Result<PathBuf, GenerationError> {
        let target = self.root.join(checked_relative(relative)?);
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source: std::io::Error| GenerationError::Io { path, source }
        };
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(io_err(parent))?;
        }
        let file_name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp = target.with_file_name(format!(".{}.tmp", file_name));
        tokio::fs::write(&temp, contents)
            .await
            .map_err(io_err(&temp))?;
        tokio::fs::rename(&temp, &target)
            .await
            .map_err(io_err(&target))?;
        Ok(target)
    }
}

/// In-memory sink, used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryOutput {
    root: PathBuf,
    files: Mutex<BTreeMap<PathBuf, String>>,
}

impl MemoryOutput {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            files: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn get(&self, relative: &str) -> Option<String> {
        self.files.lock().get(&self.root.join(relative)).cloned()
    }

    pub fn files(&self) -> Vec<PathBuf> {
        self.files.lock().keys().cloned().collect()
    }
}

#[async_trait]
impl OutputSink for MemoryOutput {
    fn directory(&self) -> &Path {
        &self.root
    }

    async fn write(&self, relative: &str, contents: &str) -> Result<PathBuf, GenerationError> {
        let target = self.root.join(checked_relative(relative)?);
        self.files.lock().insert(target.clone(), contents.to_string());
        Ok(target)
    }
}
