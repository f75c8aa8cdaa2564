//! Table definitions and row records.
//!
//! Every table lives in the single `tables` tree under a one-byte tag, so a
//! write touching several tables is one sled transaction. Integer key parts
//! are big-endian; scanning a prefix yields rows in id order.

use crate::types::{
    AttributeId, ClusterId, CommandId, DeviceTypeId, EndpointId, EndpointTypeId, PackageId,
    PackageType, SessionId, Side, StateRowId,
};
use serde::{Deserialize, Serialize};

/// Who may write a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    /// Catalog and process-wide rows.
    Global,
    /// Rows owned by a session; only written through a session transaction,
    /// which also marks the session dirty.
    Session,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Table {
    pub tag: u8,
    pub name: &'static str,
    pub owner: Owner,
}

impl Table {
    const fn global(tag: u8, name: &'static str) -> Self {
        Self {
            tag,
            name,
            owner: Owner::Global,
        }
    }

    const fn session(tag: u8, name: &'static str) -> Self {
        Self {
            tag,
            name,
            owner: Owner::Session,
        }
    }

    /// Full key inside the `tables` tree.
    pub fn key(&self, key: &[u8]) -> Vec<u8> {
        let mut full = Vec::with_capacity(key.len() + 1);
        full.push(self.tag);
        full.extend_from_slice(key);
        full
    }
}

pub const PACKAGES: Table = Table::global(0x01, "packages");
/// path \0 crc -> PackageId
pub const PACKAGE_FINGERPRINTS: Table = Table::global(0x02, "package_fingerprints");
/// package ++ category \0 value -> OptionRecord
pub const OPTIONS: Table = Table::global(0x03, "options");
pub const SESSIONS: Table = Table::global(0x10, "sessions");
/// session key -> SessionId
pub const SESSION_KEYS: Table = Table::global(0x11, "session_keys");
/// window id -> SessionId
pub const SESSION_WINDOWS: Table = Table::global(0x12, "session_windows");
/// session ++ package -> SessionPackageRecord
pub const SESSION_PACKAGES: Table = Table::global(0x13, "session_packages");
pub const ENDPOINT_TYPES: Table = Table::session(0x20, "endpoint_types");
/// endpoint type ++ cluster ++ side -> ClusterStateRecord
pub const CLUSTER_STATE: Table = Table::session(0x21, "endpoint_type_clusters");
/// endpoint type ++ attribute ++ side -> AttributeStateRecord
pub const ATTRIBUTE_STATE: Table = Table::session(0x22, "endpoint_type_attributes");
/// endpoint type ++ command ++ side -> CommandStateRecord
pub const COMMAND_STATE: Table = Table::session(0x23, "endpoint_type_commands");
pub const ENDPOINTS: Table = Table::session(0x24, "endpoints");
/// session ++ key -> KeyValueRecord
pub const KEY_VALUES: Table = Table::session(0x25, "session_key_values");
/// category -> FileLocationRecord
pub const FILE_LOCATIONS: Table = Table::global(0x30, "file_locations");
/// category \0 key -> SettingRecord
pub const SETTINGS: Table = Table::global(0x31, "settings");
pub const CLUSTERS: Table = Table::global(0x40, "clusters");
pub const ATTRIBUTES: Table = Table::global(0x41, "attributes");
pub const COMMANDS: Table = Table::global(0x42, "commands");
pub const DEVICE_TYPES: Table = Table::global(0x43, "device_types");
/// package ++ name -> AtomicRecord
pub const ATOMICS: Table = Table::global(0x44, "atomics");

/// Key for a state row: endpoint type ++ item ++ side.
pub fn state_key(endpoint_type: EndpointTypeId, item: u64, side: Side) -> Vec<u8> {
    let mut key = Vec::with_capacity(17);
    key.extend_from_slice(&endpoint_type.to_key());
    key.extend_from_slice(&item.to_be_bytes());
    key.push(side.key_byte());
    key
}

/// Two-part key used for composite string keys.
pub fn pair_key(first: &[u8], second: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(first.len() + second.len() + 1);
    key.extend_from_slice(first);
    key.push(0);
    key.extend_from_slice(second);
    key
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub id: PackageId,
    pub path: String,
    pub crc: u32,
    pub package_type: PackageType,
    #[serde(default)]
    pub version: Option<String>,
    pub created_at_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionRecord {
    pub id: u64,
    pub package: PackageId,
    pub category: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: SessionId,
    pub session_key: String,
    #[serde(default)]
    pub window_id: Option<u64>,
    pub created_at_ms: i64,
    #[serde(default = "default_dirty")]
    pub dirty: bool,
}

fn default_dirty() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPackageRecord {
    pub session: SessionId,
    pub package: PackageId,
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointTypeRecord {
    pub id: EndpointTypeId,
    pub session: SessionId,
    pub name: String,
    #[serde(default)]
    pub device_type: Option<DeviceTypeId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterStateRecord {
    pub id: StateRowId,
    pub endpoint_type: EndpointTypeId,
    pub cluster: ClusterId,
    pub side: Side,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeStateRecord {
    pub id: StateRowId,
    pub endpoint_type: EndpointTypeId,
    pub attribute: AttributeId,
    #[serde(default)]
    pub cluster: Option<ClusterId>,
    pub side: Side,
    pub included: bool,
    #[serde(default)]
    pub reportable: bool,
    /// Session override; `None` falls back to the catalog default.
    #[serde(default)]
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandStateRecord {
    pub id: StateRowId,
    pub endpoint_type: EndpointTypeId,
    pub command: CommandId,
    #[serde(default)]
    pub cluster: Option<ClusterId>,
    pub side: Side,
    pub incoming: bool,
    pub outgoing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointRecord {
    pub id: EndpointId,
    pub session: SessionId,
    pub endpoint_type: EndpointTypeId,
    pub endpoint_identifier: u16,
    pub profile_id: u16,
    pub network_id: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValueRecord {
    /// First-insertion sequence; updates keep it so export order is stable.
    pub seq: u64,
    pub session: SessionId,
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLocationRecord {
    pub category: String,
    pub path: String,
    pub access_time_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingRecord {
    pub category: String,
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterRecord {
    pub id: ClusterId,
    pub package: PackageId,
    pub code: u32,
    #[serde(default)]
    pub manufacturer_code: Option<u32>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub define: String,
    #[serde(default)]
    pub domain: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeRecord {
    pub id: AttributeId,
    pub package: PackageId,
    /// `None` for global attributes shared by every cluster.
    #[serde(default)]
    pub cluster: Option<ClusterId>,
    pub code: u32,
    #[serde(default)]
    pub manufacturer_code: Option<u32>,
    pub name: String,
    pub side: Side,
    pub type_name: String,
    #[serde(default)]
    pub define: String,
    #[serde(default)]
    pub default_value: Option<String>,
    #[serde(default)]
    pub is_writable: bool,
    #[serde(default)]
    pub is_optional: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandArgRecord {
    pub name: String,
    pub type_name: String,
    #[serde(default)]
    pub is_array: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRecord {
    pub id: CommandId,
    pub package: PackageId,
    #[serde(default)]
    pub cluster: Option<ClusterId>,
    pub code: u32,
    #[serde(default)]
    pub manufacturer_code: Option<u32>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Side that sends the command.
    pub source: Side,
    #[serde(default)]
    pub is_optional: bool,
    #[serde(default)]
    pub args: Vec<CommandArgRecord>,
}

/// Cluster a device type enables by default, with the attributes and
/// commands it requires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceTypeClusterRecord {
    pub cluster: ClusterId,
    pub include_client: bool,
    pub include_server: bool,
    #[serde(default)]
    pub required_attributes: Vec<AttributeId>,
    #[serde(default)]
    pub required_commands: Vec<CommandId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceTypeRecord {
    pub id: DeviceTypeId,
    pub package: PackageId,
    pub code: u32,
    pub profile_id: u16,
    #[serde(default)]
    pub domain: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub clusters: Vec<DeviceTypeClusterRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomicRecord {
    pub package: PackageId,
    pub name: String,
    pub atomic_id: u32,
    #[serde(default)]
    pub size: Option<u32>,
    #[serde(default)]
    pub is_discrete: bool,
}
