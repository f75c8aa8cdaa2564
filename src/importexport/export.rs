//! Session export.

use crate::error::ApiError;
use crate::importexport::state::{
    StateAttribute, StateCluster, StateCommand, StateEndpoint, StateEndpointType,
    StateFile, StateKeyValue, StatePackage, CREATOR, FILE_PATH_KEY, STATE_FILE_VERSION,
};
use crate::store::Store;
use crate::types::{ClusterId, DeviceTypeId, EndpointTypeId, SessionId, Side};
use std::path::Path;
use tracing::{info, warn};

/// Build the state-file model of a session.
pub fn export_session(store: &Store, session: SessionId) -> Result<StateFile, ApiError> {
    if store.get_session(session)?.is_none() {
        return Err(ApiError::SessionNotFound(session));
    }

    let key_value_pairs = store
        .get_all_session_key_values(session)?
        .into_iter()
        .map(|kv| StateKeyValue {
            key: kv.key,
            value: kv.value,
        })
        .collect();

    let endpoint_type_rows = store.get_all_endpoint_types(session)?;
    let mut endpoint_types = Vec::with_capacity(endpoint_type_rows.len());
    let mut index_of: Vec<EndpointTypeId> = Vec::with_capacity(endpoint_type_rows.len());
    for et in &endpoint_type_rows {
        endpoint_types.push(export_endpoint_type(store, et.id, &et.name, et.device_type)?);
        index_of.push(et.id);
    }

    let mut endpoints = Vec::new();
    for endpoint in store.get_all_endpoints(session)? {
        let Some(index) = index_of.iter().position(|id| *id == endpoint.endpoint_type) else {
            warn!(
                endpoint = %endpoint.id,
                endpoint_type = %endpoint.endpoint_type,
                "Endpoint references a missing endpoint type; not exported"
            );
            continue;
        };
        endpoints.push(StateEndpoint {
            endpoint_type_index: index,
            endpoint_id: endpoint.endpoint_identifier,
            network_id: endpoint.network_id,
            profile_id: endpoint.profile_id,
        });
    }

    let package = store
        .get_session_packages(session)?
        .into_iter()
        .map(|p| StatePackage {
            package_type: p.package_type,
            version: p.version,
            path: p.path,
        })
        .collect();

    Ok(StateFile {
        creator: CREATOR.to_string(),
        write_time: chrono::Utc::now().to_rfc3339(),
        version: STATE_FILE_VERSION,
        key_value_pairs,
        endpoint_types,
        endpoints,
        package,
    })
}

fn export_endpoint_type(
    store: &Store,
    id: EndpointTypeId,
    name: &str,
    device_type: Option<DeviceTypeId>,
) -> Result<StateEndpointType, ApiError> {
    let device_type_code = match device_type {
        Some(dt) => store.select_device_type_by_id(dt)?.map(|d| d.code),
        None => None,
    };

    // One entry per (cluster, side), in cluster-state order.
    let mut clusters: Vec<(ClusterId, StateCluster)> = Vec::new();
    for row in store.get_all_endpoint_type_cluster_state(id)? {
        clusters.push((
            row.cluster,
            StateCluster {
                code: row.code,
                mfg_code: row.manufacturer_code,
                name: row.name,
                side: row.side,
                enabled: Some(row.enabled),
                attributes: Vec::new(),
                commands: Vec::new(),
            },
        ));
    }

    let mut global_attributes = Vec::new();
    for attr in store.get_endpoint_type_attributes(id)? {
        let entry = StateAttribute {
            code: attr.code,
            mfg_code: attr.manufacturer_code,
            name: attr.name,
            side: attr.side,
            included: attr.included,
            reportable: attr.reportable,
            default_value: attr.default_value,
        };
        match attr.cluster {
            Some(cluster) => cluster_entry(store, &mut clusters, cluster, attr.side)?
                .attributes
                .push(entry),
            None => global_attributes.push(entry),
        }
    }

    for cmd in store.get_endpoint_type_commands(id)? {
        let Some(cluster) = cmd.cluster else {
            warn!(command = %cmd.command, "Command without a cluster; not exported");
            continue;
        };
        cluster_entry(store, &mut clusters, cluster, cmd.source)?
            .commands
            .push(StateCommand {
                code: cmd.code,
                mfg_code: cmd.manufacturer_code,
                name: cmd.name,
                source: cmd.source,
                incoming: cmd.incoming,
                outgoing: cmd.outgoing,
            });
    }

    Ok(StateEndpointType {
        name: name.to_string(),
        device_type_code,
        clusters: clusters.into_iter().map(|(_, c)| c).collect(),
        global_attributes,
    })
}

/// Entry for (cluster, side), appending a stateless one when the endpoint
/// type has no cluster row for that side.
fn cluster_entry<'a>(
    store: &Store,
    clusters: &'a mut Vec<(ClusterId, StateCluster)>,
    cluster: ClusterId,
    side: Side,
) -> Result<&'a mut StateCluster, ApiError> {
    let position = clusters
        .iter()
        .position(|(id, c)| *id == cluster && c.side == side);
    let index = match position {
        Some(index) => index,
        None => {
            let record = store.select_cluster_by_id(cluster)?;
            let (code, mfg_code, name) = record
                .map(|c| (c.code, c.manufacturer_code, c.name))
                .unwrap_or_default();
            clusters.push((
                cluster,
                StateCluster {
                    code,
                    mfg_code,
                    name,
                    side,
                    enabled: None,
                    attributes: Vec::new(),
                    commands: Vec::new(),
                },
            ));
            clusters.len() - 1
        }
    };
    Ok(&mut clusters[index].1)
}

/// Save a session: record the path under `filePath`, write the file and
/// mark the session clean.
pub fn export_to_file(store: &Store, session: SessionId, path: &Path) -> Result<StateFile, ApiError> {
    if store.get_session(session)?.is_none() {
        return Err(ApiError::SessionNotFound(session));
    }
    store.update_key_value(session, FILE_PATH_KEY, &path.display().to_string())?;
    let state = export_session(store, session)?;
    let json = state.to_json()?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            ApiError::ImportExport(format!("Cannot create {}: {}", parent.display(), e))
        })?;
    }
    std::fs::write(path, json)
        .map_err(|e| ApiError::ImportExport(format!("Cannot write {}: {}", path.display(), e)))?;
    store.insert_file_location(&path.display().to_string(), "save")?;
    store.set_session_clean(session)?;
    info!(
        session = %session,
        path = %path.display(),
        endpoint_types = state.endpoint_types.len(),
        endpoints = state.endpoints.len(),
        "Session exported"
    );
    Ok(state)
}
