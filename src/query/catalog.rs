//! Catalog tables: clusters, attributes, commands, device types and atomic
//! types loaded from a `spec-properties` package. Catalog rows are written
//! once at load time and never change afterwards.

use crate::error::StorageError;
use crate::query::package::require_package;
use crate::store::schema::{
    pair_key, AtomicRecord, AttributeRecord, ClusterRecord, CommandArgRecord, CommandRecord,
    DeviceTypeClusterRecord, DeviceTypeRecord, ATOMICS, ATTRIBUTES, CLUSTERS, COMMANDS,
    DEVICE_TYPES,
};
use crate::store::Store;
use crate::types::{AttributeId, ClusterId, CommandId, DeviceTypeId, PackageId, Side};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterDef {
    pub code: u32,
    pub manufacturer_code: Option<u32>,
    pub name: String,
    pub description: String,
    pub define: String,
    pub domain: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDef {
    pub cluster: Option<ClusterId>,
    pub code: u32,
    pub manufacturer_code: Option<u32>,
    pub name: String,
    pub side: Side,
    pub type_name: String,
    pub define: String,
    pub default_value: Option<String>,
    pub is_writable: bool,
    pub is_optional: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandDef {
    pub cluster: Option<ClusterId>,
    pub code: u32,
    pub manufacturer_code: Option<u32>,
    pub name: String,
    pub description: String,
    pub source: Side,
    pub is_optional: bool,
    pub args: Vec<CommandArgRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTypeDef {
    pub code: u32,
    pub profile_id: u16,
    pub domain: Option<String>,
    pub name: String,
    pub description: String,
    pub clusters: Vec<DeviceTypeClusterRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomicDef {
    pub name: String,
    pub atomic_id: u32,
    pub size: Option<u32>,
    pub is_discrete: bool,
}

fn by_package<T>(rows: Vec<T>, package: PackageId, pkg: impl Fn(&T) -> PackageId) -> Vec<T> {
    rows.into_iter().filter(|r| pkg(r) == package).collect()
}

impl Store {
    pub fn insert_clusters(
        &self,
        package: PackageId,
        clusters: &[ClusterDef],
    ) -> Result<Vec<ClusterId>, StorageError> {
        let writer = self.writer();
        require_package(self, CLUSTERS.name, package)?;
        let mut rows = Vec::with_capacity(clusters.len());
        for def in clusters {
            rows.push(ClusterRecord {
                id: ClusterId(writer.next_id()?),
                package,
                code: def.code,
                manufacturer_code: def.manufacturer_code,
                name: def.name.clone(),
                description: def.description.clone(),
                define: def.define.clone(),
                domain: def.domain.clone(),
            });
        }
        writer.transaction(|tx| {
            for row in &rows {
                tx.put(CLUSTERS, &row.id.to_key(), row)?;
            }
            Ok(())
        })?;
        debug!(package = %package, count = rows.len(), "Clusters inserted");
        Ok(rows.into_iter().map(|r| r.id).collect())
    }

    pub fn insert_attributes(
        &self,
        package: PackageId,
        attributes: &[AttributeDef],
    ) -> Result<Vec<AttributeId>, StorageError> {
        let writer = self.writer();
        require_package(self, ATTRIBUTES.name, package)?;
        let mut rows = Vec::with_capacity(attributes.len());
        for def in attributes {
            if let Some(cluster) = def.cluster {
                self.require_cluster(ATTRIBUTES.name, cluster)?;
            }
            rows.push(AttributeRecord {
                id: AttributeId(writer.next_id()?),
                package,
                cluster: def.cluster,
                code: def.code,
                manufacturer_code: def.manufacturer_code,
                name: def.name.clone(),
                side: def.side,
                type_name: def.type_name.clone(),
                define: def.define.clone(),
                default_value: def.default_value.clone(),
                is_writable: def.is_writable,
                is_optional: def.is_optional,
            });
        }
        writer.transaction(|tx| {
            for row in &rows {
                tx.put(ATTRIBUTES, &row.id.to_key(), row)?;
            }
            Ok(())
        })?;
        Ok(rows.into_iter().map(|r| r.id).collect())
    }

    pub fn insert_commands(
        &self,
        package: PackageId,
        commands: &[CommandDef],
    ) -> Result<Vec<CommandId>, StorageError> {
        let writer = self.writer();
        require_package(self, COMMANDS.name, package)?;
        let mut rows = Vec::with_capacity(commands.len());
        for def in commands {
            if let Some(cluster) = def.cluster {
                self.require_cluster(COMMANDS.name, cluster)?;
            }
            rows.push(CommandRecord {
                id: CommandId(writer.next_id()?),
                package,
                cluster: def.cluster,
                code: def.code,
                manufacturer_code: def.manufacturer_code,
                name: def.name.clone(),
                description: def.description.clone(),
                source: def.source,
                is_optional: def.is_optional,
                args: def.args.clone(),
            });
        }
        writer.transaction(|tx| {
            for row in &rows {
                tx.put(COMMANDS, &row.id.to_key(), row)?;
            }
            Ok(())
        })?;
        Ok(rows.into_iter().map(|r| r.id).collect())
    }

    /// Insert a device type. Every cluster, attribute and command it
    /// references must already be in the catalog.
    pub fn insert_device_type(
        &self,
        package: PackageId,
        def: &DeviceTypeDef,
    ) -> Result<DeviceTypeId, StorageError> {
        let writer = self.writer();
        require_package(self, DEVICE_TYPES.name, package)?;
        for dtc in &def.clusters {
            self.require_cluster(DEVICE_TYPES.name, dtc.cluster)?;
            for attribute in &dtc.required_attributes {
                if !self.contains(ATTRIBUTES, &attribute.to_key())? {
                    return Err(StorageError::constraint(
                        DEVICE_TYPES.name,
                        format!("attribute {} does not exist", attribute),
                    ));
                }
            }
            for command in &dtc.required_commands {
                if !self.contains(COMMANDS, &command.to_key())? {
                    return Err(StorageError::constraint(
                        DEVICE_TYPES.name,
                        format!("command {} does not exist", command),
                    ));
                }
            }
        }
        let record = DeviceTypeRecord {
            id: DeviceTypeId(writer.next_id()?),
            package,
            code: def.code,
            profile_id: def.profile_id,
            domain: def.domain.clone(),
            name: def.name.clone(),
            description: def.description.clone(),
            clusters: def.clusters.clone(),
        };
        writer.transaction(|tx| tx.put(DEVICE_TYPES, &record.id.to_key(), &record))?;
        debug!(package = %package, device_type = %record.name, "Device type inserted");
        Ok(record.id)
    }

    /// Insert atomic types; a name already present in the package is replaced.
    pub fn insert_atomics(&self, package: PackageId, atomics: &[AtomicDef]) -> Result<usize, StorageError> {
        let writer = self.writer();
        require_package(self, ATOMICS.name, package)?;
        let rows: Vec<(Vec<u8>, AtomicRecord)> = atomics
            .iter()
            .map(|def| {
                let key = pair_key(&package.to_key(), def.name.to_lowercase().as_bytes());
                let record = AtomicRecord {
                    package,
                    name: def.name.clone(),
                    atomic_id: def.atomic_id,
                    size: def.size,
                    is_discrete: def.is_discrete,
                };
                (key, record)
            })
            .collect();
        writer.transaction(|tx| {
            for (key, record) in &rows {
                tx.put(ATOMICS, key, record)?;
            }
            Ok(())
        })?;
        Ok(rows.len())
    }

    pub fn select_all_clusters(&self, package: PackageId) -> Result<Vec<ClusterRecord>, StorageError> {
        Ok(by_package(self.scan(CLUSTERS, &[])?, package, |c: &ClusterRecord| c.package))
    }

    pub fn select_cluster_by_id(&self, id: ClusterId) -> Result<Option<ClusterRecord>, StorageError> {
        self.get(CLUSTERS, &id.to_key())
    }

    pub fn select_cluster_by_code(
        &self,
        package: PackageId,
        code: u32,
        manufacturer_code: Option<u32>,
    ) -> Result<Option<ClusterRecord>, StorageError> {
        Ok(self
            .select_all_clusters(package)?
            .into_iter()
            .find(|c| c.code == code && c.manufacturer_code == manufacturer_code))
    }

    pub fn select_attribute_by_id(
        &self,
        id: AttributeId,
    ) -> Result<Option<AttributeRecord>, StorageError> {
        self.get(ATTRIBUTES, &id.to_key())
    }

    /// Attributes of a cluster. `None` selects the global attributes.
    pub fn select_attributes_by_cluster(
        &self,
        package: PackageId,
        cluster: Option<ClusterId>,
    ) -> Result<Vec<AttributeRecord>, StorageError> {
        let rows: Vec<AttributeRecord> = self.scan(ATTRIBUTES, &[])?;
        Ok(rows
            .into_iter()
            .filter(|a| a.package == package && a.cluster == cluster)
            .collect())
    }

    pub fn select_all_attributes(&self, package: PackageId) -> Result<Vec<AttributeRecord>, StorageError> {
        Ok(by_package(self.scan(ATTRIBUTES, &[])?, package, |a: &AttributeRecord| a.package))
    }

    pub fn select_command_by_id(&self, id: CommandId) -> Result<Option<CommandRecord>, StorageError> {
        self.get(COMMANDS, &id.to_key())
    }

    pub fn select_commands_by_cluster(
        &self,
        package: PackageId,
        cluster: Option<ClusterId>,
    ) -> Result<Vec<CommandRecord>, StorageError> {
        let rows: Vec<CommandRecord> = self.scan(COMMANDS, &[])?;
        Ok(rows
            .into_iter()
            .filter(|c| c.package == package && c.cluster == cluster)
            .collect())
    }

    pub fn select_all_commands(&self, package: PackageId) -> Result<Vec<CommandRecord>, StorageError> {
        Ok(by_package(self.scan(COMMANDS, &[])?, package, |c: &CommandRecord| c.package))
    }

    pub fn select_all_device_types(
        &self,
        package: PackageId,
    ) -> Result<Vec<DeviceTypeRecord>, StorageError> {
        Ok(by_package(self.scan(DEVICE_TYPES, &[])?, package, |d: &DeviceTypeRecord| d.package))
    }

    pub fn select_device_type_by_id(
        &self,
        id: DeviceTypeId,
    ) -> Result<Option<DeviceTypeRecord>, StorageError> {
        self.get(DEVICE_TYPES, &id.to_key())
    }

    pub fn select_device_type_by_code(
        &self,
        package: PackageId,
        code: u32,
    ) -> Result<Option<DeviceTypeRecord>, StorageError> {
        Ok(self
            .select_all_device_types(package)?
            .into_iter()
            .find(|d| d.code == code))
    }

    /// Atomic type by name, case-insensitive.
    pub fn select_atomic(&self, package: PackageId, name: &str) -> Result<Option<AtomicRecord>, StorageError> {
        self.get(ATOMICS, &pair_key(&package.to_key(), name.to_lowercase().as_bytes()))
    }

    pub fn select_all_atomics(&self, package: PackageId) -> Result<Vec<AtomicRecord>, StorageError> {
        self.scan(ATOMICS, &pair_key(&package.to_key(), &[]))
    }

    fn require_cluster(&self, table: &'static str, cluster: ClusterId) -> Result<(), StorageError> {
        if self.contains(CLUSTERS, &cluster.to_key())? {
            Ok(())
        } else {
            Err(StorageError::constraint(
                table,
                format!("cluster {} does not exist", cluster),
            ))
        }
    }
}
