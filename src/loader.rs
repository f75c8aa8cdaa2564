//! Catalog loader
//!
//! Reads a JSON catalog definition (clusters with their attributes and
//! commands, global attributes, device types, atomic types and option lists)
//! and stores it as a `spec-properties` package. The package fingerprint is
//! the canonical path plus a checksum of the file contents, so loading an
//! unchanged file again returns the package that is already there.

use crate::error::ApiError;
use crate::query::{AtomicDef, AttributeDef, ClusterDef, CommandDef, DeviceTypeDef};
use crate::store::schema::{CommandArgRecord, DeviceTypeClusterRecord};
use crate::store::Store;
use crate::types::{
    parse_code, AttributeId, CommandId, PackageId, PackageType, Side,
    DEFAULT_PROFILE_ID,
};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Protocol code written either as a number or as a `0x` string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Code {
    Number(u32),
    Text(String),
}

impl Code {
    fn value(&self) -> Result<u32, ApiError> {
        match self {
            Code::Number(n) => Ok(*n),
            Code::Text(s) => parse_code(s).map_err(ApiError::CatalogLoad),
        }
    }
}

fn optional_code(code: &Option<Code>) -> Result<Option<u32>, ApiError> {
    code.as_ref().map(Code::value).transpose()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogFile {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    clusters: Vec<CatalogCluster>,
    #[serde(default)]
    global_attributes: Vec<CatalogAttribute>,
    #[serde(default)]
    device_types: Vec<CatalogDeviceType>,
    #[serde(default)]
    atomics: Vec<CatalogAtomic>,
    #[serde(default)]
    options: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogCluster {
    code: Code,
    #[serde(default)]
    manufacturer_code: Option<Code>,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    define: String,
    #[serde(default)]
    domain: Option<String>,
    #[serde(default)]
    attributes: Vec<CatalogAttribute>,
    #[serde(default)]
    commands: Vec<CatalogCommand>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogAttribute {
    code: Code,
    #[serde(default)]
    manufacturer_code: Option<Code>,
    name: String,
    side: Side,
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default)]
    define: String,
    #[serde(default)]
    default: Option<String>,
    #[serde(default)]
    writable: bool,
    #[serde(default)]
    optional: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogCommand {
    code: Code,
    #[serde(default)]
    manufacturer_code: Option<Code>,
    name: String,
    #[serde(default)]
    description: String,
    source: Side,
    #[serde(default)]
    optional: bool,
    #[serde(default)]
    args: Vec<CatalogArg>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogArg {
    name: String,
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default)]
    array: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogDeviceType {
    code: Code,
    #[serde(default)]
    profile_id: Option<Code>,
    #[serde(default)]
    domain: Option<String>,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    clusters: Vec<CatalogDeviceTypeCluster>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogDeviceTypeCluster {
    code: Code,
    #[serde(default)]
    client: bool,
    #[serde(default)]
    server: bool,
    #[serde(default)]
    required_attributes: Vec<RequiredAttribute>,
    #[serde(default)]
    required_commands: Vec<Code>,
}

/// A required attribute names its side when the cluster defines the code on
/// both sides. A bare code prefers the server attribute.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RequiredAttribute {
    Sided { code: Code, side: Side },
    Code(Code),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogAtomic {
    name: String,
    id: Code,
    #[serde(default)]
    size: Option<u32>,
    #[serde(default)]
    discrete: bool,
}

/// Checksum stored in the package fingerprint: the first four bytes of the
/// blake3 digest.
pub fn content_checksum(bytes: &[u8]) -> u32 {
    let digest = blake3::hash(bytes);
    let mut first = [0u8; 4];
    first.copy_from_slice(&digest.as_bytes()[..4]);
    u32::from_be_bytes(first)
}

/// Canonical string form of a file path used in package fingerprints.
pub fn canonical_path(path: &Path) -> Result<String, ApiError> {
    let canonical = dunce::canonicalize(path).map_err(|e| {
        ApiError::CatalogLoad(format!("Cannot resolve {}: {}", path.display(), e))
    })?;
    Ok(canonical.to_string_lossy().into_owned())
}

/// Load a catalog file into `store`.
///
/// Every definition and cross reference is checked before the package row
/// is written, so a file that fails to load leaves no fingerprint behind.
pub fn load_catalog(store: &Store, path: &Path) -> Result<PackageId, ApiError> {
    let canonical = canonical_path(path)?;
    let bytes = fs::read(path)
        .map_err(|e| ApiError::CatalogLoad(format!("Cannot read {}: {}", path.display(), e)))?;
    let crc = content_checksum(&bytes);

    if let Some(existing) = store.get_package_by_path(&canonical)? {
        if existing.crc == crc {
            debug!(path = %canonical, package = %existing.id, "Catalog unchanged");
            return Ok(existing.id);
        }
    }

    let catalog: CatalogFile = serde_json::from_slice(&bytes)
        .map_err(|e| ApiError::CatalogLoad(format!("{}: {}", path.display(), e)))?;
    let prepared = PreparedCatalog::build(&catalog)?;

    let package = store.insert_package(
        &canonical,
        crc,
        PackageType::SpecProperties,
        catalog.version.as_deref(),
    )?;
    prepared.write(store, package)?;
    info!(
        path = %canonical,
        package = %package,
        clusters = prepared.clusters.len(),
        device_types = prepared.device_types.len(),
        "Catalog loaded"
    );
    Ok(package)
}

struct PreparedCluster {
    def: ClusterDef,
    attributes: Vec<AttributeDef>,
    commands: Vec<CommandDef>,
    attribute_index: HashMap<(u32, Side), usize>,
    command_index: HashMap<u32, usize>,
}

impl PreparedCluster {
    fn required_attribute(&self, code: u32, side: Option<Side>) -> Option<usize> {
        match side {
            Some(side) => self.attribute_index.get(&(code, side)).copied(),
            None => self
                .attribute_index
                .get(&(code, Side::Server))
                .or_else(|| self.attribute_index.get(&(code, Side::Client)))
                .copied(),
        }
    }
}

/// Device type cluster whose references are positions in the prepared
/// catalog; ids are assigned at write time.
struct PreparedDeviceTypeCluster {
    cluster: usize,
    include_client: bool,
    include_server: bool,
    required_attributes: Vec<usize>,
    required_commands: Vec<usize>,
}

struct PreparedDeviceType {
    def: DeviceTypeDef,
    clusters: Vec<PreparedDeviceTypeCluster>,
}

/// A parsed catalog with every code converted and every reference resolved.
struct PreparedCatalog<'a> {
    clusters: Vec<PreparedCluster>,
    globals: Vec<AttributeDef>,
    device_types: Vec<PreparedDeviceType>,
    atomics: Vec<AtomicDef>,
    options: &'a BTreeMap<String, Vec<String>>,
}

impl<'a> PreparedCatalog<'a> {
    fn build(catalog: &'a CatalogFile) -> Result<Self, ApiError> {
        let mut clusters = Vec::with_capacity(catalog.clusters.len());
        let mut by_code: HashMap<u32, usize> = HashMap::new();
        for c in &catalog.clusters {
            let def = ClusterDef {
                code: c.code.value()?,
                manufacturer_code: optional_code(&c.manufacturer_code)?,
                name: c.name.clone(),
                description: c.description.clone(),
                define: c.define.clone(),
                domain: c.domain.clone(),
            };
            let attributes = attribute_defs(&c.attributes)?;
            let commands = command_defs(&c.commands)?;
            let mut attribute_index = HashMap::new();
            for (i, a) in attributes.iter().enumerate() {
                attribute_index.entry((a.code, a.side)).or_insert(i);
            }
            let mut command_index = HashMap::new();
            for (i, cmd) in commands.iter().enumerate() {
                command_index.entry(cmd.code).or_insert(i);
            }
            by_code.entry(def.code).or_insert(clusters.len());
            clusters.push(PreparedCluster {
                def,
                attributes,
                commands,
                attribute_index,
                command_index,
            });
        }

        let mut device_types = Vec::with_capacity(catalog.device_types.len());
        for dt in &catalog.device_types {
            device_types.push(prepare_device_type(dt, &clusters, &by_code)?);
        }

        let mut atomics = Vec::with_capacity(catalog.atomics.len());
        for a in &catalog.atomics {
            atomics.push(AtomicDef {
                name: a.name.clone(),
                atomic_id: a.id.value()?,
                size: a.size,
                is_discrete: a.discrete,
            });
        }

        Ok(PreparedCatalog {
            clusters,
            globals: attribute_defs(&catalog.global_attributes)?,
            device_types,
            atomics,
            options: &catalog.options,
        })
    }

    fn write(&self, store: &Store, package: PackageId) -> Result<(), ApiError> {
        let cluster_defs: Vec<ClusterDef> = self.clusters.iter().map(|c| c.def.clone()).collect();
        let cluster_ids = store.insert_clusters(package, &cluster_defs)?;

        let mut attribute_ids: Vec<Vec<AttributeId>> = Vec::with_capacity(self.clusters.len());
        let mut command_ids: Vec<Vec<CommandId>> = Vec::with_capacity(self.clusters.len());
        for (cluster, id) in self.clusters.iter().zip(&cluster_ids) {
            let attributes: Vec<AttributeDef> = cluster
                .attributes
                .iter()
                .cloned()
                .map(|a| AttributeDef {
                    cluster: Some(*id),
                    ..a
                })
                .collect();
            attribute_ids.push(store.insert_attributes(package, &attributes)?);
            let commands: Vec<CommandDef> = cluster
                .commands
                .iter()
                .cloned()
                .map(|c| CommandDef {
                    cluster: Some(*id),
                    ..c
                })
                .collect();
            command_ids.push(store.insert_commands(package, &commands)?);
        }

        store.insert_attributes(package, &self.globals)?;

        for dt in &self.device_types {
            let clusters = dt
                .clusters
                .iter()
                .map(|dtc| DeviceTypeClusterRecord {
                    cluster: cluster_ids[dtc.cluster],
                    include_client: dtc.include_client,
                    include_server: dtc.include_server,
                    required_attributes: dtc
                        .required_attributes
                        .iter()
                        .map(|i| attribute_ids[dtc.cluster][*i])
                        .collect(),
                    required_commands: dtc
                        .required_commands
                        .iter()
                        .map(|i| command_ids[dtc.cluster][*i])
                        .collect(),
                })
                .collect();
            store.insert_device_type(
                package,
                &DeviceTypeDef {
                    clusters,
                    ..dt.def.clone()
                },
            )?;
        }

        store.insert_atomics(package, &self.atomics)?;
        for (category, values) in self.options {
            store.insert_options(package, category, values)?;
        }
        Ok(())
    }
}

fn attribute_defs(attributes: &[CatalogAttribute]) -> Result<Vec<AttributeDef>, ApiError> {
    attributes
        .iter()
        .map(|a| {
            Ok(AttributeDef {
                cluster: None,
                code: a.code.value()?,
                manufacturer_code: optional_code(&a.manufacturer_code)?,
                name: a.name.clone(),
                side: a.side,
                type_name: a.type_name.clone(),
                define: a.define.clone(),
                default_value: a.default.clone(),
                is_writable: a.writable,
                is_optional: a.optional,
            })
        })
        .collect()
}

fn command_defs(commands: &[CatalogCommand]) -> Result<Vec<CommandDef>, ApiError> {
    commands
        .iter()
        .map(|c| {
            Ok(CommandDef {
                cluster: None,
                code: c.code.value()?,
                manufacturer_code: optional_code(&c.manufacturer_code)?,
                name: c.name.clone(),
                description: c.description.clone(),
                source: c.source,
                is_optional: c.optional,
                args: c
                    .args
                    .iter()
                    .map(|arg| CommandArgRecord {
                        name: arg.name.clone(),
                        type_name: arg.type_name.clone(),
                        is_array: arg.array,
                    })
                    .collect(),
            })
        })
        .collect()
}

fn prepare_device_type(
    dt: &CatalogDeviceType,
    clusters: &[PreparedCluster],
    by_code: &HashMap<u32, usize>,
) -> Result<PreparedDeviceType, ApiError> {
    let mut prepared = Vec::with_capacity(dt.clusters.len());
    for dtc in &dt.clusters {
        let code = dtc.code.value()?;
        let position = *by_code.get(&code).ok_or_else(|| {
            ApiError::CatalogLoad(format!(
                "Device type '{}' references unknown cluster 0x{:04X}",
                dt.name, code
            ))
        })?;
        let cluster = &clusters[position];

        let mut required_attributes = Vec::with_capacity(dtc.required_attributes.len());
        for attr in &dtc.required_attributes {
            let (attr_code, side) = match attr {
                RequiredAttribute::Sided { code, side } => (code.value()?, Some(*side)),
                RequiredAttribute::Code(code) => (code.value()?, None),
            };
            let index = cluster.required_attribute(attr_code, side).ok_or_else(|| {
                ApiError::CatalogLoad(format!(
                    "Device type '{}' requires unknown attribute 0x{:04X} of cluster 0x{:04X}",
                    dt.name, attr_code, code
                ))
            })?;
            required_attributes.push(index);
        }
        let mut required_commands = Vec::with_capacity(dtc.required_commands.len());
        for cmd in &dtc.required_commands {
            let cmd_code = cmd.value()?;
            let index = *cluster.command_index.get(&cmd_code).ok_or_else(|| {
                ApiError::CatalogLoad(format!(
                    "Device type '{}' requires unknown command 0x{:02X} of cluster 0x{:04X}",
                    dt.name, cmd_code, code
                ))
            })?;
            required_commands.push(index);
        }
        prepared.push(PreparedDeviceTypeCluster {
            cluster: position,
            include_client: dtc.client,
            include_server: dtc.server,
            required_attributes,
            required_commands,
        });
    }
    let profile_id = match &dt.profile_id {
        Some(code) => u16::try_from(code.value()?)
            .map_err(|_| ApiError::CatalogLoad(format!("Profile id of '{}' out of range", dt.name)))?,
        None => DEFAULT_PROFILE_ID,
    };
    Ok(PreparedDeviceType {
        def: DeviceTypeDef {
            code: dt.code.value()?,
            profile_id,
            domain: dt.domain.clone(),
            name: dt.name.clone(),
            description: dt.description.clone(),
            clusters: Vec::new(),
        },
        clusters: prepared,
    })
}
