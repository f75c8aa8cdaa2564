//! Generation options descriptor and the per-run configuration value.

use crate::error::GenerationError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name looked up in the template directory when no options file is
/// configured.
pub const DEFAULT_OPTIONS_FILE: &str = "generation-options.json";

/// Parsed `generation-options.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationOptions {
    #[serde(rename = "generation-options")]
    pub units: Vec<UnitOptions>,
}

/// One configured output of a generation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitOptions {
    pub filename: String,
    #[serde(rename = "helper-api-name")]
    pub helper_api_name: String,
    #[serde(rename = "group-info-into-db-row-type", default)]
    pub group_info: Vec<GroupInfo>,
    #[serde(rename = "handlebar-templates-per-data-row", default)]
    pub templates: Vec<TemplateRow>,
    /// Overrides the run's template directory for this unit. Relative paths
    /// resolve against the options file's directory.
    #[serde(
        rename = "template-directory",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub template_directory: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    #[serde(rename = "dbType")]
    pub db_type: String,
    #[serde(rename = "groupKey")]
    pub group_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRow {
    #[serde(rename = "hTemplateFile")]
    pub template_file: String,
    #[serde(rename = "dbRowType")]
    pub db_row_type: String,
    /// Output file for this template; defaults to the unit's `filename`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl GenerationOptions {
    pub fn from_json(text: &str) -> Result<Self, GenerationError> {
        serde_json::from_str(text).map_err(|e| GenerationError::Options(e.to_string()))
    }

    pub async fn load(path: &Path) -> Result<Self, GenerationError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| GenerationError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_json(&text).map_err(|e| match e {
            GenerationError::Options(msg) => {
                GenerationError::Options(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }
}

/// Directories and descriptor for one generation run. Passed explicitly to
/// every run instead of living in process state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationConfig {
    pub template_directory: PathBuf,
    pub output_directory: PathBuf,
    pub options_file: PathBuf,
}

impl GenerationConfig {
    /// Config whose options file is `generation-options.json` inside the
    /// template directory.
    pub fn new(template_directory: impl Into<PathBuf>, output_directory: impl Into<PathBuf>) -> Self {
        let template_directory = template_directory.into();
        let options_file = template_directory.join(DEFAULT_OPTIONS_FILE);
        Self {
            template_directory,
            output_directory: output_directory.into(),
            options_file,
        }
    }

    pub fn with_options_file(mut self, options_file: impl Into<PathBuf>) -> Self {
        self.options_file = options_file.into();
        self
    }

    /// Template directory a unit reads from.
    pub fn unit_template_directory(&self, unit: &UnitOptions) -> PathBuf {
        match &unit.template_directory {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => self
                .options_file
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(dir),
            None => self.template_directory.clone(),
        }
    }
}
