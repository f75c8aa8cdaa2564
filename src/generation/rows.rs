//! Row enrichment and grouping.
//!
//! A [`Snapshot`] reads the rows of one session and attaches the catalog
//! metadata templates need: hex codes, labels, owning cluster codes and
//! names, atomic type sizes and merged defaults. Grouping folds rows that
//! share a key into composite records.

use crate::error::GenerationError;
use crate::generation::plan::{Grouping, OrderedSet, RowType};
use crate::store::schema::{AttributeRecord, ClusterRecord, CommandRecord};
use crate::store::Store;
use crate::types::{hex_code, ClusterId, PackageId, SessionId};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Rows of a unit, keyed by row type in first-requested order.
pub type RowSet = Vec<(RowType, Vec<Value>)>;

/// Read view of the store for one session.
#[derive(Clone)]
pub struct Snapshot {
    store: Arc<Store>,
    session: SessionId,
    packages: Vec<PackageId>,
}

impl Snapshot {
    /// Snapshot of `session`. Catalog rows come from the session's
    /// `spec-properties` packages, or from every loaded one when the session
    /// references none.
    pub fn new(store: Arc<Store>, session: SessionId) -> Result<Self, GenerationError> {
        let packages = store.catalog_packages(session)?;
        Ok(Self {
            store,
            session,
            packages,
        })
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Fetch and enrich every requested row type.
    pub fn rows(&self, row_types: &OrderedSet<RowType>) -> Result<RowSet, GenerationError> {
        let catalog = self.catalog()?;
        let mut out = Vec::with_capacity(row_types.len());
        for row_type in row_types {
            out.push((*row_type, self.fetch_with(&catalog, *row_type)?));
        }
        Ok(out)
    }

    fn fetch_with(&self, catalog: &Catalog, row_type: RowType) -> Result<Vec<Value>, GenerationError> {
        let rows = match row_type {
            RowType::Cluster => catalog.clusters.values().map(cluster_row).collect(),
            RowType::Attribute => catalog
                .attributes
                .iter()
                .map(|a| attribute_row(a, catalog))
                .collect(),
            RowType::Command => catalog
                .commands
                .iter()
                .map(|c| command_row(c, catalog))
                .collect(),
            RowType::DeviceType => self.device_type_rows()?,
            RowType::Atomic => self.atomic_rows()?,
            RowType::EndpointType => self.endpoint_type_rows()?,
            RowType::EndpointTypeCluster => self.endpoint_type_cluster_rows()?,
            RowType::EndpointTypeAttribute => self.endpoint_type_attribute_rows(catalog)?,
            RowType::EndpointTypeCommand => self.endpoint_type_command_rows(catalog)?,
            RowType::Endpoint => self.endpoint_rows()?,
            RowType::KeyValue => self
                .store
                .get_all_session_key_values(self.session)?
                .into_iter()
                .map(|kv| json!({"key": kv.key, "value": kv.value}))
                .collect(),
        };
        Ok(rows)
    }

    fn catalog(&self) -> Result<Catalog, GenerationError> {
        let mut catalog = Catalog::default();
        for package in &self.packages {
            for cluster in self.store.select_all_clusters(*package)? {
                catalog.clusters.insert(cluster.id, cluster);
            }
            catalog
                .attributes
                .extend(self.store.select_all_attributes(*package)?);
            catalog
                .commands
                .extend(self.store.select_all_commands(*package)?);
            for atomic in self.store.select_all_atomics(*package)? {
                catalog
                    .type_sizes
                    .entry(atomic.name.to_lowercase())
                    .or_insert(atomic.size);
            }
        }
        Ok(catalog)
    }

    fn device_type_rows(&self) -> Result<Vec<Value>, GenerationError> {
        let mut rows = Vec::new();
        for package in &self.packages {
            for dt in self.store.select_all_device_types(*package)? {
                rows.push(json!({
                    "id": dt.id,
                    "code": dt.code,
                    "hexCode": hex_code(dt.code),
                    "profileId": dt.profile_id,
                    "hexProfileId": hex_code(u32::from(dt.profile_id)),
                    "name": dt.name,
                    "label": dt.name,
                    "domain": dt.domain,
                    "description": dt.description,
                    "clusterCount": dt.clusters.len(),
                }));
            }
        }
        Ok(rows)
    }

    fn atomic_rows(&self) -> Result<Vec<Value>, GenerationError> {
        let mut rows = Vec::new();
        for package in &self.packages {
            for atomic in self.store.select_all_atomics(*package)? {
                rows.push(json!({
                    "name": atomic.name,
                    "atomicId": atomic.atomic_id,
                    "hexId": format!("0x{:02X}", atomic.atomic_id),
                    "size": atomic.size,
                    "isDiscrete": atomic.is_discrete,
                }));
            }
        }
        Ok(rows)
    }

    fn endpoint_type_rows(&self) -> Result<Vec<Value>, GenerationError> {
        let mut rows = Vec::new();
        for et in self.store.get_all_endpoint_types(self.session)? {
            let device = match et.device_type {
                Some(id) => self.store.select_device_type_by_id(id)?,
                None => None,
            };
            let summary = self.store.endpoint_type_summary(et.id)?;
            rows.push(json!({
                "id": et.id,
                "name": et.name,
                "deviceTypeName": device.as_ref().map(|d| d.name.clone()),
                "deviceTypeCode": device.as_ref().map(|d| d.code),
                "enabledClusterCount": summary.enabled_clusters,
                "enabledAttributeCount": summary.enabled_attributes,
            }));
        }
        Ok(rows)
    }

    fn endpoint_type_cluster_rows(&self) -> Result<Vec<Value>, GenerationError> {
        let mut rows = Vec::new();
        for et in self.store.get_all_endpoint_types(self.session)? {
            for cluster in self.store.get_all_endpoint_type_cluster_state(et.id)? {
                let mut row = to_object(&cluster);
                row.insert("endpointTypeName".into(), Value::from(et.name.clone()));
                row.insert("hexCode".into(), Value::from(hex_code(cluster.code)));
                row.insert("label".into(), Value::from(cluster.name.clone()));
                rows.push(Value::Object(row));
            }
        }
        Ok(rows)
    }

    fn endpoint_type_attribute_rows(&self, catalog: &Catalog) -> Result<Vec<Value>, GenerationError> {
        let mut rows = Vec::new();
        for et in self.store.get_all_endpoint_types(self.session)? {
            for attribute in self.store.get_endpoint_type_attributes(et.id)? {
                let mut row = to_object(&attribute);
                row.insert("endpointTypeName".into(), Value::from(et.name.clone()));
                row.insert("hexCode".into(), Value::from(hex_code(attribute.code)));
                row.insert("label".into(), Value::from(attribute.name.clone()));
                row.insert("typeSize".into(), json!(catalog.type_size(&attribute.type_name)));
                insert_cluster_fields(&mut row, attribute.cluster, catalog);
                rows.push(Value::Object(row));
            }
        }
        Ok(rows)
    }

    fn endpoint_type_command_rows(&self, catalog: &Catalog) -> Result<Vec<Value>, GenerationError> {
        let mut rows = Vec::new();
        for et in self.store.get_all_endpoint_types(self.session)? {
            for command in self.store.get_endpoint_type_commands(et.id)? {
                let mut row = to_object(&command);
                row.insert("endpointTypeName".into(), Value::from(et.name.clone()));
                row.insert("hexCode".into(), Value::from(format!("0x{:02X}", command.code)));
                row.insert("label".into(), Value::from(command.name.clone()));
                insert_cluster_fields(&mut row, command.cluster, catalog);
                rows.push(Value::Object(row));
            }
        }
        Ok(rows)
    }

    fn endpoint_rows(&self) -> Result<Vec<Value>, GenerationError> {
        let mut rows = Vec::new();
        for ep in self.store.get_all_endpoints(self.session)? {
            let et_name = self
                .store
                .select_endpoint_type(ep.endpoint_type)?
                .map(|et| et.name);
            rows.push(json!({
                "id": ep.id,
                "endpointId": ep.endpoint_identifier,
                "profileId": ep.profile_id,
                "hexProfileId": hex_code(u32::from(ep.profile_id)),
                "networkId": ep.network_id,
                "endpointTypeName": et_name,
            }));
        }
        Ok(rows)
    }
}

#[derive(Default)]
struct Catalog {
    clusters: indexed::Clusters,
    attributes: Vec<AttributeRecord>,
    commands: Vec<CommandRecord>,
    type_sizes: HashMap<String, Option<u32>>,
}

impl Catalog {
    fn type_size(&self, type_name: &str) -> Option<u32> {
        self.type_sizes
            .get(&type_name.to_lowercase())
            .copied()
            .flatten()
    }
}

mod indexed {
    use super::*;

    /// Clusters by id, iterated in catalog order.
    #[derive(Default)]
    pub(super) struct Clusters {
        order: Vec<ClusterId>,
        by_id: HashMap<ClusterId, ClusterRecord>,
    }

    impl Clusters {
        pub(super) fn insert(&mut self, id: ClusterId, cluster: ClusterRecord) {
            if self.by_id.insert(id, cluster).is_none() {
                self.order.push(id);
            }
        }

        pub(super) fn get(&self, id: &ClusterId) -> Option<&ClusterRecord> {
            self.by_id.get(id)
        }

        pub(super) fn values(&self) -> impl Iterator<Item = &ClusterRecord> {
            self.order.iter().filter_map(|id| self.by_id.get(id))
        }
    }
}

fn to_object<T: serde::Serialize>(value: &T) -> Map<String, Value> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

fn cluster_row(cluster: &ClusterRecord) -> Value {
    json!({
        "id": cluster.id,
        "code": cluster.code,
        "hexCode": hex_code(cluster.code),
        "manufacturerCode": cluster.manufacturer_code,
        "name": cluster.name,
        "label": cluster.name,
        "description": cluster.description,
        "define": cluster.define,
        "domain": cluster.domain,
    })
}

fn insert_cluster_fields(row: &mut Map<String, Value>, cluster: Option<ClusterId>, catalog: &Catalog) {
    let owner = cluster.and_then(|id| catalog.clusters.get(&id));
    row.insert("clusterCode".into(), json!(owner.map(|c| c.code)));
    row.insert("clusterName".into(), json!(owner.map(|c| c.name.clone())));
    row.insert("clusterDefine".into(), json!(owner.map(|c| c.define.clone())));
}

fn attribute_row(attribute: &AttributeRecord, catalog: &Catalog) -> Value {
    let mut row = to_object(&json!({
        "id": attribute.id,
        "code": attribute.code,
        "hexCode": hex_code(attribute.code),
        "manufacturerCode": attribute.manufacturer_code,
        "name": attribute.name,
        "label": attribute.name,
        "side": attribute.side,
        "type": attribute.type_name,
        "typeSize": catalog.type_size(&attribute.type_name),
        "define": attribute.define,
        "defaultValue": attribute.default_value,
        "isWritable": attribute.is_writable,
        "isOptional": attribute.is_optional,
        "isGlobal": attribute.cluster.is_none(),
    }));
    insert_cluster_fields(&mut row, attribute.cluster, catalog);
    Value::Object(row)
}

fn command_row(command: &CommandRecord, catalog: &Catalog) -> Value {
    let args: Vec<Value> = command
        .args
        .iter()
        .map(|a| json!({"name": a.name, "type": a.type_name, "isArray": a.is_array}))
        .collect();
    let mut row = to_object(&json!({
        "id": command.id,
        "code": command.code,
        "hexCode": format!("0x{:02X}", command.code),
        "manufacturerCode": command.manufacturer_code,
        "name": command.name,
        "label": command.name,
        "description": command.description,
        "source": command.source,
        "isOptional": command.is_optional,
        "argCount": args.len(),
        "args": args,
    }));
    insert_cluster_fields(&mut row, command.cluster, catalog);
    Value::Object(row)
}

/// Replace each grouped row type's rows with composites
/// `{key, <groupKey>, count, items}`, in order of first appearance.
pub fn group_rows(rows: &mut RowSet, groupings: &[Grouping]) {
    for grouping in groupings {
        let Some((_, values)) = rows.iter_mut().find(|(t, _)| *t == grouping.row_type) else {
            continue;
        };
        *values = group_by_key(std::mem::take(values), &grouping.group_key);
    }
}

fn group_by_key(rows: Vec<Value>, group_key: &str) -> Vec<Value> {
    let mut groups: Vec<(Value, Vec<Value>)> = Vec::new();
    for row in rows {
        let key = row.get(group_key).cloned().unwrap_or(Value::Null);
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, items)) => items.push(row),
            None => groups.push((key, vec![row])),
        }
    }
    groups
        .into_iter()
        .map(|(key, items)| {
            let mut composite = Map::new();
            let key_text = match &key {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            composite.insert("key".into(), Value::from(key_text));
            composite.insert(group_key.to_string(), key);
            composite.insert("count".into(), Value::from(items.len()));
            composite.insert("items".into(), Value::Array(items));
            Value::Object(composite)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grouping_keeps_first_appearance_order() {
        let mut rows: RowSet = vec![(
            RowType::Attribute,
            vec![
                json!({"name": "a", "clusterCode": 6}),
                json!({"name": "b", "clusterCode": 0}),
                json!({"name": "c", "clusterCode": 6}),
            ],
        )];
        group_rows(
            &mut rows,
            &[Grouping {
                row_type: RowType::Attribute,
                group_key: "clusterCode".to_string(),
            }],
        );
        let groups = &rows[0].1;
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0]["key"], json!("6"));
        assert_eq!(groups[0]["clusterCode"], json!(6));
        assert_eq!(groups[0]["count"], json!(2));
        assert_eq!(groups[0]["items"][1]["name"], json!("c"));
        assert_eq!(groups[1]["count"], json!(1));
    }

    #[test]
    fn grouping_unrequested_type_is_noop() {
        let mut rows: RowSet = vec![(RowType::Cluster, vec![json!({"code": 1})])];
        group_rows(
            &mut rows,
            &[Grouping {
                row_type: RowType::Command,
                group_key: "clusterCode".to_string(),
            }],
        );
        assert_eq!(rows[0].1, vec![json!({"code": 1})]);
    }
}
