//! Session-state file model.
//!
//! Catalog rows are referenced by protocol code, never by store id, so a
//! file written from one store imports into another.

use crate::error::ApiError;
use crate::types::{PackageType, Side};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Newest state-file format this build reads and the one it writes.
pub const STATE_FILE_VERSION: u32 = 2;

pub const CREATOR: &str = "zclgen";

/// Key-value the saved file path is recorded under.
pub const FILE_PATH_KEY: &str = "filePath";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateFile {
    #[serde(default)]
    pub creator: String,
    #[serde(default)]
    pub write_time: String,
    /// Files written before versioning carry no version and read as 1.
    #[serde(default = "first_version")]
    pub version: u32,
    #[serde(default)]
    pub key_value_pairs: Vec<StateKeyValue>,
    #[serde(default)]
    pub endpoint_types: Vec<StateEndpointType>,
    #[serde(default)]
    pub endpoints: Vec<StateEndpoint>,
    #[serde(default)]
    pub package: Vec<StatePackage>,
}

fn first_version() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateKeyValue {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateEndpointType {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_type_code: Option<u32>,
    #[serde(default)]
    pub clusters: Vec<StateCluster>,
    /// Included attributes that belong to no cluster.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub global_attributes: Vec<StateAttribute>,
}

/// One side of a cluster with the attribute and command state nested under
/// it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateCluster {
    pub code: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mfg_code: Option<u32>,
    #[serde(default)]
    pub name: String,
    pub side: Side,
    /// `None` when only attribute or command rows exist for this side.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub attributes: Vec<StateAttribute>,
    #[serde(default)]
    pub commands: Vec<StateCommand>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateAttribute {
    pub code: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mfg_code: Option<u32>,
    #[serde(default)]
    pub name: String,
    pub side: Side,
    pub included: bool,
    #[serde(default)]
    pub reportable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateCommand {
    pub code: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mfg_code: Option<u32>,
    #[serde(default)]
    pub name: String,
    pub source: Side,
    pub incoming: bool,
    pub outgoing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateEndpoint {
    /// Position of the endpoint's type in `endpointTypes`.
    pub endpoint_type_index: usize,
    pub endpoint_id: u16,
    pub network_id: u16,
    pub profile_id: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatePackage {
    #[serde(rename = "type")]
    pub package_type: PackageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub path: String,
}

impl StateFile {
    /// Parse a state file, rejecting formats newer than this build.
    pub fn from_json(text: &str) -> Result<Self, ApiError> {
        let state: StateFile = serde_json::from_str(text)
            .map_err(|e| ApiError::ImportExport(format!("Invalid state file: {}", e)))?;
        if state.version > STATE_FILE_VERSION {
            return Err(ApiError::ImportExport(format!(
                "State file version {} is newer than supported version {}",
                state.version, STATE_FILE_VERSION
            )));
        }
        Ok(state)
    }

    pub fn to_json(&self) -> Result<String, ApiError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ApiError::ImportExport(format!("Cannot encode state file: {}", e)))
    }

    pub fn key_value(&self, key: &str) -> Option<&str> {
        self.key_value_pairs
            .iter()
            .find(|kv| kv.key == key)
            .map(|kv| kv.value.as_str())
    }
}

/// Read and parse a state file from disk.
pub fn read_state_from_file(path: &Path) -> Result<StateFile, ApiError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        ApiError::ImportExport(format!("Cannot read {}: {}", path.display(), e))
    })?;
    StateFile::from_json(&text)
}
