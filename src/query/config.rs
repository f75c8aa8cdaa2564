//! Session configuration: endpoint types, their cluster/attribute/command
//! state, endpoints and key-values.
//!
//! Every write goes through a session transaction, so the owning session is
//! marked dirty by the same transaction that changes it. Reads merge the
//! catalog definition with the session override.

use crate::error::StorageError;
use crate::store::schema::{
    state_key, AttributeStateRecord, ClusterStateRecord, CommandStateRecord, DeviceTypeRecord,
    EndpointRecord, EndpointTypeRecord, KeyValueRecord, ATTRIBUTE_STATE, CLUSTERS, CLUSTER_STATE,
    COMMAND_STATE, ENDPOINTS, ENDPOINT_TYPES, KEY_VALUES, SESSIONS,
};
use crate::store::{Store, Writer};
use crate::types::{
    AttributeId, ClusterId, CommandId, DeviceTypeId, EndpointId, EndpointTypeId, SessionId, Side,
    StateRowId, DEFAULT_PROFILE_ID,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Whether a new endpoint type is populated from its device type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Seeding {
    /// Materialise the device type's default-enabled clusters, attributes
    /// and commands.
    #[default]
    FromDeviceType,
    /// Create the endpoint type with no state rows.
    Empty,
}

/// Session override for one attribute.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AttributeOverride {
    pub included: bool,
    pub reportable: bool,
    pub default_value: Option<String>,
}

/// Cluster state merged with its catalog definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointTypeCluster {
    pub id: StateRowId,
    pub endpoint_type: EndpointTypeId,
    pub cluster: ClusterId,
    pub code: u32,
    pub manufacturer_code: Option<u32>,
    pub name: String,
    pub define: String,
    pub side: Side,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointTypeAttribute {
    pub id: StateRowId,
    pub endpoint_type: EndpointTypeId,
    pub attribute: AttributeId,
    pub cluster: Option<ClusterId>,
    pub code: u32,
    pub manufacturer_code: Option<u32>,
    pub name: String,
    pub type_name: String,
    pub side: Side,
    pub included: bool,
    pub reportable: bool,
    pub is_writable: bool,
    /// Override when present, otherwise the catalog default.
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointTypeCommand {
    pub id: StateRowId,
    pub endpoint_type: EndpointTypeId,
    pub command: CommandId,
    pub cluster: Option<ClusterId>,
    pub code: u32,
    pub manufacturer_code: Option<u32>,
    pub name: String,
    pub source: Side,
    pub incoming: bool,
    pub outgoing: bool,
}

/// Counts shown for an endpoint type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointTypeSummary {
    pub enabled_clusters: usize,
    pub enabled_attributes: usize,
}

/// Fields of an endpoint that can change after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointUpdate {
    EndpointIdentifier(u16),
    EndpointType(EndpointTypeId),
    NetworkId(u16),
    ProfileId(u16),
}

impl Store {
    /// Create an endpoint type in `session`, optionally seeded from a device
    /// type.
    pub fn insert_endpoint_type(
        &self,
        session: SessionId,
        name: &str,
        device_type: Option<DeviceTypeId>,
        seeding: Seeding,
    ) -> Result<EndpointTypeId, StorageError> {
        let writer = self.writer();
        let device = match device_type {
            Some(id) => Some(self.select_device_type_by_id(id)?.ok_or_else(|| {
                StorageError::constraint(
                    ENDPOINT_TYPES.name,
                    format!("device type {} does not exist", id),
                )
            })?),
            None => None,
        };

        let id = EndpointTypeId(writer.next_id()?);
        let record = EndpointTypeRecord {
            id,
            session,
            name: name.to_string(),
            device_type,
        };

        let seed = match (&device, seeding) {
            (Some(device), Seeding::FromDeviceType) => self.seed_rows(&writer, id, device)?,
            _ => SeedRows::default(),
        };

        writer.session_tx(session, |tx| {
            tx.put(ENDPOINT_TYPES, &id.to_key(), &record)?;
            for row in &seed.clusters {
                tx.put(CLUSTER_STATE, &state_key(id, row.cluster.0, row.side), row)?;
            }
            for row in &seed.attributes {
                tx.put(ATTRIBUTE_STATE, &state_key(id, row.attribute.0, row.side), row)?;
            }
            for row in &seed.commands {
                tx.put(COMMAND_STATE, &state_key(id, row.command.0, row.side), row)?;
            }
            Ok(())
        })?;
        debug!(
            session = %session,
            endpoint_type = %id,
            clusters = seed.clusters.len(),
            attributes = seed.attributes.len(),
            commands = seed.commands.len(),
            "Endpoint type created"
        );
        Ok(id)
    }

    fn seed_rows(
        &self,
        writer: &Writer<'_>,
        endpoint_type: EndpointTypeId,
        device: &DeviceTypeRecord,
    ) -> Result<SeedRows, StorageError> {
        let mut seed = SeedRows::default();
        for dtc in &device.clusters {
            let sides = [
                (Side::Client, dtc.include_client),
                (Side::Server, dtc.include_server),
            ];
            for (side, included) in sides {
                if included {
                    seed.clusters.push(ClusterStateRecord {
                        id: StateRowId(writer.next_id()?),
                        endpoint_type,
                        cluster: dtc.cluster,
                        side,
                        enabled: true,
                    });
                }
            }
            for attribute_id in &dtc.required_attributes {
                let Some(attribute) = self.select_attribute_by_id(*attribute_id)? else {
                    warn!(attribute = %attribute_id, "Device type references a missing attribute");
                    continue;
                };
                if seed.attributes.iter().any(|a| a.attribute == attribute.id && a.side == attribute.side) {
                    continue;
                }
                seed.attributes.push(AttributeStateRecord {
                    id: StateRowId(writer.next_id()?),
                    endpoint_type,
                    attribute: attribute.id,
                    cluster: attribute.cluster.or(Some(dtc.cluster)),
                    side: attribute.side,
                    included: true,
                    reportable: false,
                    default_value: None,
                });
            }
            for command_id in &dtc.required_commands {
                let Some(command) = self.select_command_by_id(*command_id)? else {
                    warn!(command = %command_id, "Device type references a missing command");
                    continue;
                };
                if seed.commands.iter().any(|c| c.command == command.id && c.side == command.source) {
                    continue;
                }
                seed.commands.push(CommandStateRecord {
                    id: StateRowId(writer.next_id()?),
                    endpoint_type,
                    command: command.id,
                    cluster: command.cluster.or(Some(dtc.cluster)),
                    side: command.source,
                    incoming: true,
                    outgoing: true,
                });
            }
        }
        Ok(seed)
    }

    pub fn select_endpoint_type(
        &self,
        id: EndpointTypeId,
    ) -> Result<Option<EndpointTypeRecord>, StorageError> {
        self.get(ENDPOINT_TYPES, &id.to_key())
    }

    /// Endpoint types of a session in creation order.
    pub fn get_all_endpoint_types(
        &self,
        session: SessionId,
    ) -> Result<Vec<EndpointTypeRecord>, StorageError> {
        let rows: Vec<EndpointTypeRecord> = self.scan(ENDPOINT_TYPES, &[])?;
        Ok(rows.into_iter().filter(|et| et.session == session).collect())
    }

    pub fn update_endpoint_type_name(
        &self,
        id: EndpointTypeId,
        name: &str,
    ) -> Result<usize, StorageError> {
        let writer = self.writer();
        let Some(mut record) = self.select_endpoint_type(id)? else {
            return Ok(0);
        };
        record.name = name.to_string();
        writer.session_tx(record.session, |tx| tx.put(ENDPOINT_TYPES, &id.to_key(), &record))?;
        Ok(1)
    }

    /// Delete an endpoint type and all of its state rows in one transaction.
    /// Returns the number of endpoint types removed (0 or 1). Endpoints that
    /// reference it are left in place.
    pub fn delete_endpoint_type(&self, id: EndpointTypeId) -> Result<usize, StorageError> {
        let writer = self.writer();
        let Some(record) = self.select_endpoint_type(id)? else {
            return Ok(0);
        };
        let mut dependents = Vec::new();
        for table in [CLUSTER_STATE, ATTRIBUTE_STATE, COMMAND_STATE] {
            for key in self.scan_keys(table, &id.to_key())? {
                dependents.push((table, key));
            }
        }
        writer.session_tx(record.session, |tx| {
            for (table, key) in &dependents {
                tx.remove(*table, key)?;
            }
            tx.remove(ENDPOINT_TYPES, &id.to_key())
        })?;
        debug!(endpoint_type = %id, cascaded = dependents.len(), "Endpoint type deleted");
        Ok(1)
    }

    /// Insert or replace the state of `cluster` on one side of an endpoint
    /// type. The row id survives replacement.
    pub fn insert_or_replace_cluster_state(
        &self,
        endpoint_type: EndpointTypeId,
        cluster: ClusterId,
        side: Side,
        enabled: bool,
    ) -> Result<StateRowId, StorageError> {
        let writer = self.writer();
        let et = self.require_endpoint_type(CLUSTER_STATE.name, endpoint_type)?;
        if !self.contains(CLUSTERS, &cluster.to_key())? {
            return Err(StorageError::constraint(
                CLUSTER_STATE.name,
                format!("cluster {} does not exist", cluster),
            ));
        }
        let key = state_key(endpoint_type, cluster.0, side);
        let id = match self.get::<ClusterStateRecord>(CLUSTER_STATE, &key)? {
            Some(existing) => existing.id,
            None => StateRowId(writer.next_id()?),
        };
        let record = ClusterStateRecord {
            id,
            endpoint_type,
            cluster,
            side,
            enabled,
        };
        writer.session_tx(et.session, |tx| tx.put(CLUSTER_STATE, &key, &record))?;
        Ok(id)
    }

    pub fn insert_or_replace_attribute_state(
        &self,
        endpoint_type: EndpointTypeId,
        attribute: AttributeId,
        side: Side,
        value: &AttributeOverride,
    ) -> Result<StateRowId, StorageError> {
        let writer = self.writer();
        let et = self.require_endpoint_type(ATTRIBUTE_STATE.name, endpoint_type)?;
        let Some(catalog) = self.select_attribute_by_id(attribute)? else {
            return Err(StorageError::constraint(
                ATTRIBUTE_STATE.name,
                format!("attribute {} does not exist", attribute),
            ));
        };
        let key = state_key(endpoint_type, attribute.0, side);
        let id = match self.get::<AttributeStateRecord>(ATTRIBUTE_STATE, &key)? {
            Some(existing) => existing.id,
            None => StateRowId(writer.next_id()?),
        };
        let record = AttributeStateRecord {
            id,
            endpoint_type,
            attribute,
            cluster: catalog.cluster,
            side,
            included: value.included,
            reportable: value.reportable,
            default_value: value.default_value.clone(),
        };
        writer.session_tx(et.session, |tx| tx.put(ATTRIBUTE_STATE, &key, &record))?;
        Ok(id)
    }

    pub fn insert_or_replace_command_state(
        &self,
        endpoint_type: EndpointTypeId,
        command: CommandId,
        side: Side,
        incoming: bool,
        outgoing: bool,
    ) -> Result<StateRowId, StorageError> {
        let writer = self.writer();
        let et = self.require_endpoint_type(COMMAND_STATE.name, endpoint_type)?;
        let Some(catalog) = self.select_command_by_id(command)? else {
            return Err(StorageError::constraint(
                COMMAND_STATE.name,
                format!("command {} does not exist", command),
            ));
        };
        let key = state_key(endpoint_type, command.0, side);
        let id = match self.get::<CommandStateRecord>(COMMAND_STATE, &key)? {
            Some(existing) => existing.id,
            None => StateRowId(writer.next_id()?),
        };
        let record = CommandStateRecord {
            id,
            endpoint_type,
            command,
            cluster: catalog.cluster,
            side,
            incoming,
            outgoing,
        };
        writer.session_tx(et.session, |tx| tx.put(COMMAND_STATE, &key, &record))?;
        Ok(id)
    }

    /// Cluster state of an endpoint type merged with catalog labels. A
    /// missing endpoint type yields an empty vector.
    pub fn get_all_endpoint_type_cluster_state(
        &self,
        endpoint_type: EndpointTypeId,
    ) -> Result<Vec<EndpointTypeCluster>, StorageError> {
        let rows: Vec<ClusterStateRecord> = self.scan(CLUSTER_STATE, &endpoint_type.to_key())?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(cluster) = self.select_cluster_by_id(row.cluster)? else {
                warn!(cluster = %row.cluster, "Cluster state without catalog row");
                continue;
            };
            out.push(EndpointTypeCluster {
                id: row.id,
                endpoint_type,
                cluster: row.cluster,
                code: cluster.code,
                manufacturer_code: cluster.manufacturer_code,
                name: cluster.name,
                define: cluster.define,
                side: row.side,
                enabled: row.enabled,
            });
        }
        Ok(out)
    }

    pub fn get_endpoint_type_attributes(
        &self,
        endpoint_type: EndpointTypeId,
    ) -> Result<Vec<EndpointTypeAttribute>, StorageError> {
        let rows: Vec<AttributeStateRecord> =
            self.scan(ATTRIBUTE_STATE, &endpoint_type.to_key())?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(attribute) = self.select_attribute_by_id(row.attribute)? else {
                warn!(attribute = %row.attribute, "Attribute state without catalog row");
                continue;
            };
            out.push(EndpointTypeAttribute {
                id: row.id,
                endpoint_type,
                attribute: row.attribute,
                cluster: row.cluster,
                code: attribute.code,
                manufacturer_code: attribute.manufacturer_code,
                name: attribute.name,
                type_name: attribute.type_name,
                side: row.side,
                included: row.included,
                reportable: row.reportable,
                is_writable: attribute.is_writable,
                default_value: row.default_value.or(attribute.default_value),
            });
        }
        Ok(out)
    }

    pub fn get_endpoint_type_commands(
        &self,
        endpoint_type: EndpointTypeId,
    ) -> Result<Vec<EndpointTypeCommand>, StorageError> {
        let rows: Vec<CommandStateRecord> = self.scan(COMMAND_STATE, &endpoint_type.to_key())?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(command) = self.select_command_by_id(row.command)? else {
                warn!(command = %row.command, "Command state without catalog row");
                continue;
            };
            out.push(EndpointTypeCommand {
                id: row.id,
                endpoint_type,
                command: row.command,
                cluster: row.cluster,
                code: command.code,
                manufacturer_code: command.manufacturer_code,
                name: command.name,
                source: command.source,
                incoming: row.incoming,
                outgoing: row.outgoing,
            });
        }
        Ok(out)
    }

    /// Enabled clusters, and included attributes whose cluster is enabled on
    /// the attribute's side.
    pub fn endpoint_type_summary(
        &self,
        endpoint_type: EndpointTypeId,
    ) -> Result<EndpointTypeSummary, StorageError> {
        let clusters: Vec<ClusterStateRecord> =
            self.scan(CLUSTER_STATE, &endpoint_type.to_key())?;
        let enabled: Vec<(ClusterId, Side)> = clusters
            .iter()
            .filter(|c| c.enabled)
            .map(|c| (c.cluster, c.side))
            .collect();
        let attributes: Vec<AttributeStateRecord> =
            self.scan(ATTRIBUTE_STATE, &endpoint_type.to_key())?;
        let enabled_attributes = attributes
            .iter()
            .filter(|a| a.included)
            .filter(|a| match a.cluster {
                Some(cluster) => enabled.contains(&(cluster, a.side)),
                None => true,
            })
            .count();
        Ok(EndpointTypeSummary {
            enabled_clusters: enabled.len(),
            enabled_attributes,
        })
    }

    /// Create an endpoint. `profile_id` defaults to the Home Automation
    /// profile.
    pub fn insert_endpoint(
        &self,
        session: SessionId,
        endpoint_identifier: u16,
        endpoint_type: EndpointTypeId,
        network_id: u16,
        profile_id: Option<u16>,
    ) -> Result<EndpointId, StorageError> {
        let writer = self.writer();
        let et = self.require_endpoint_type(ENDPOINTS.name, endpoint_type)?;
        if et.session != session {
            return Err(StorageError::constraint(
                ENDPOINTS.name,
                format!(
                    "endpoint type {} belongs to session {}, not {}",
                    endpoint_type, et.session, session
                ),
            ));
        }
        let record = EndpointRecord {
            id: EndpointId(writer.next_id()?),
            session,
            endpoint_type,
            endpoint_identifier,
            profile_id: profile_id.unwrap_or(DEFAULT_PROFILE_ID),
            network_id,
        };
        writer.session_tx(session, |tx| tx.put(ENDPOINTS, &record.id.to_key(), &record))?;
        Ok(record.id)
    }

    pub fn select_endpoint(&self, id: EndpointId) -> Result<Option<EndpointRecord>, StorageError> {
        self.get(ENDPOINTS, &id.to_key())
    }

    pub fn get_all_endpoints(&self, session: SessionId) -> Result<Vec<EndpointRecord>, StorageError> {
        let rows: Vec<EndpointRecord> = self.scan(ENDPOINTS, &[])?;
        Ok(rows.into_iter().filter(|e| e.session == session).collect())
    }

    pub fn update_endpoint(
        &self,
        id: EndpointId,
        update: EndpointUpdate,
    ) -> Result<usize, StorageError> {
        let writer = self.writer();
        let Some(mut record) = self.select_endpoint(id)? else {
            return Ok(0);
        };
        match update {
            EndpointUpdate::EndpointIdentifier(v) => record.endpoint_identifier = v,
            EndpointUpdate::NetworkId(v) => record.network_id = v,
            EndpointUpdate::ProfileId(v) => record.profile_id = v,
            EndpointUpdate::EndpointType(et) => {
                let target = self.require_endpoint_type(ENDPOINTS.name, et)?;
                if target.session != record.session {
                    return Err(StorageError::constraint(
                        ENDPOINTS.name,
                        format!("endpoint type {} belongs to another session", et),
                    ));
                }
                record.endpoint_type = et;
            }
        }
        writer.session_tx(record.session, |tx| tx.put(ENDPOINTS, &id.to_key(), &record))?;
        Ok(1)
    }

    /// Delete an endpoint; 0 when it does not exist.
    pub fn delete_endpoint(&self, id: EndpointId) -> Result<usize, StorageError> {
        let writer = self.writer();
        let Some(record) = self.select_endpoint(id)? else {
            return Ok(0);
        };
        let removed = writer.session_tx(record.session, |tx| tx.remove(ENDPOINTS, &id.to_key()))?;
        Ok(usize::from(removed))
    }

    /// Upsert a session key-value. An existing key keeps its position.
    pub fn update_key_value(
        &self,
        session: SessionId,
        key: &str,
        value: &str,
    ) -> Result<(), StorageError> {
        let writer = self.writer();
        let row_key = key_value_key(session, key);
        let seq = match self.get::<KeyValueRecord>(KEY_VALUES, &row_key)? {
            Some(existing) => existing.seq,
            None => writer.next_id()?,
        };
        let record = KeyValueRecord {
            seq,
            session,
            key: key.to_string(),
            value: value.to_string(),
        };
        writer.session_tx(session, |tx| tx.put(KEY_VALUES, &row_key, &record))
    }

    pub fn get_session_key_value(
        &self,
        session: SessionId,
        key: &str,
    ) -> Result<Option<String>, StorageError> {
        Ok(self
            .get::<KeyValueRecord>(KEY_VALUES, &key_value_key(session, key))?
            .map(|kv| kv.value))
    }

    /// Key-values in first-insertion order.
    pub fn get_all_session_key_values(
        &self,
        session: SessionId,
    ) -> Result<Vec<KeyValueRecord>, StorageError> {
        let mut rows: Vec<KeyValueRecord> = self.scan(KEY_VALUES, &session.to_key())?;
        rows.sort_by_key(|kv| kv.seq);
        Ok(rows)
    }

    pub fn delete_key_value(&self, session: SessionId, key: &str) -> Result<usize, StorageError> {
        let writer = self.writer();
        let row_key = key_value_key(session, key);
        if !self.contains(KEY_VALUES, &row_key)? {
            return Ok(0);
        }
        let removed = writer.session_tx(session, |tx| tx.remove(KEY_VALUES, &row_key))?;
        Ok(usize::from(removed))
    }

    fn require_endpoint_type(
        &self,
        table: &'static str,
        id: EndpointTypeId,
    ) -> Result<EndpointTypeRecord, StorageError> {
        match self.select_endpoint_type(id)? {
            Some(et) if self.contains(SESSIONS, &et.session.to_key())? => Ok(et),
            _ => Err(StorageError::constraint(
                table,
                format!("endpoint type {} does not exist", id),
            )),
        }
    }
}

#[derive(Default)]
struct SeedRows {
    clusters: Vec<ClusterStateRecord>,
    attributes: Vec<AttributeStateRecord>,
    commands: Vec<CommandStateRecord>,
}

fn key_value_key(session: SessionId, key: &str) -> Vec<u8> {
    let mut row_key = session.to_key().to_vec();
    row_key.extend_from_slice(key.as_bytes());
    row_key
}
