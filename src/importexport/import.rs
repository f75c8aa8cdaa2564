//! Session import.
//!
//! Codes in the file are resolved against the session's catalog packages.
//! A code that resolves to nothing is logged and skipped; the rest of the
//! file still imports.

use crate::error::ApiError;
use crate::importexport::state::{
    read_state_from_file, StateAttribute, StateCluster, StateEndpointType, StateFile,
    FILE_PATH_KEY,
};
use crate::query::{AttributeOverride, Seeding};
use crate::store::schema::{AttributeRecord, ClusterRecord, CommandRecord};
use crate::store::Store;
use crate::types::{EndpointTypeId, PackageId, PackageType, SessionId};
use std::path::Path;
use tracing::{info, warn};

/// What an import created and what it had to skip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub endpoint_types: Vec<EndpointTypeId>,
    pub endpoints: usize,
    pub key_values: usize,
    pub skipped: usize,
}

/// Write a parsed state file into an existing session.
pub fn write_state_to_database(
    store: &Store,
    state: &StateFile,
    session: SessionId,
) -> Result<ImportReport, ApiError> {
    if store.get_session(session)?.is_none() {
        return Err(ApiError::SessionNotFound(session));
    }
    let mut report = ImportReport::default();

    attach_packages(store, state, session, &mut report)?;
    let packages = store.catalog_packages(session)?;

    for kv in &state.key_value_pairs {
        store.update_key_value(session, &kv.key, &kv.value)?;
        report.key_values += 1;
    }

    for et in &state.endpoint_types {
        let id = import_endpoint_type(store, &packages, session, et, &mut report)?;
        report.endpoint_types.push(id);
    }

    for endpoint in &state.endpoints {
        let Some(endpoint_type) = report.endpoint_types.get(endpoint.endpoint_type_index).copied()
        else {
            warn!(
                endpoint = endpoint.endpoint_id,
                index = endpoint.endpoint_type_index,
                "Endpoint references an unknown endpoint type index; skipped"
            );
            report.skipped += 1;
            continue;
        };
        store.insert_endpoint(
            session,
            endpoint.endpoint_id,
            endpoint_type,
            endpoint.network_id,
            Some(endpoint.profile_id),
        )?;
        report.endpoints += 1;
    }

    info!(
        session = %session,
        endpoint_types = report.endpoint_types.len(),
        endpoints = report.endpoints,
        skipped = report.skipped,
        "State imported"
    );
    Ok(report)
}

/// Create a session for `session_key` and import the file into it.
pub fn import_into_new_session(
    store: &Store,
    state: &StateFile,
    session_key: &str,
    window_id: Option<u64>,
) -> Result<(SessionId, ImportReport), ApiError> {
    let session = store.ensure_session(session_key, window_id)?;
    let report = write_state_to_database(store, state, session)?;
    Ok((session, report))
}

/// Open a saved file into a new session. The session starts clean and
/// remembers the file it came from.
pub fn open_state_file(
    store: &Store,
    path: &Path,
    session_key: &str,
    window_id: Option<u64>,
) -> Result<(SessionId, ImportReport), ApiError> {
    let state = read_state_from_file(path)?;
    let (session, report) = import_into_new_session(store, &state, session_key, window_id)?;
    let location = path.display().to_string();
    store.update_key_value(session, FILE_PATH_KEY, &location)?;
    store.insert_file_location(&location, "open")?;
    store.set_session_clean(session)?;
    Ok((session, report))
}

fn attach_packages(
    store: &Store,
    state: &StateFile,
    session: SessionId,
    report: &mut ImportReport,
) -> Result<(), ApiError> {
    for package in &state.package {
        if package.package_type != PackageType::SpecProperties {
            continue;
        }
        match store.get_package_by_path(&package.path)? {
            Some(record) => store.insert_session_package(session, record.id, true)?,
            None => {
                warn!(path = %package.path, "Package from state file is not loaded");
                report.skipped += 1;
            }
        }
    }
    Ok(())
}

fn import_endpoint_type(
    store: &Store,
    packages: &[PackageId],
    session: SessionId,
    et: &StateEndpointType,
    report: &mut ImportReport,
) -> Result<EndpointTypeId, ApiError> {
    let mut device_type = None;
    if let Some(code) = et.device_type_code {
        for package in packages {
            if let Some(found) = store.select_device_type_by_code(*package, code)? {
                device_type = Some(found.id);
                break;
            }
        }
        if device_type.is_none() {
            warn!(endpoint_type = %et.name, code, "Device type code not found");
            report.skipped += 1;
        }
    }
    // State comes from the file, not from the device type defaults.
    let id = store.insert_endpoint_type(session, &et.name, device_type, Seeding::Empty)?;

    for cluster in &et.clusters {
        let Some(record) = resolve_cluster(store, packages, cluster)? else {
            warn!(endpoint_type = %et.name, code = cluster.code, "Cluster code not found; skipped");
            report.skipped += 1 + cluster.attributes.len() + cluster.commands.len();
            continue;
        };
        if let Some(enabled) = cluster.enabled {
            store.insert_or_replace_cluster_state(id, record.id, cluster.side, enabled)?;
        }
        for attribute in &cluster.attributes {
            match resolve_attribute(store, &record, attribute)? {
                Some(found) => apply_attribute(store, id, &found, attribute)?,
                None => {
                    warn!(
                        cluster = cluster.code,
                        code = attribute.code,
                        "Attribute code not found; skipped"
                    );
                    report.skipped += 1;
                }
            }
        }
        for command in &cluster.commands {
            match resolve_command(store, &record, command.code, command.mfg_code)? {
                Some(found) => {
                    store.insert_or_replace_command_state(
                        id,
                        found.id,
                        command.source,
                        command.incoming,
                        command.outgoing,
                    )?;
                }
                None => {
                    warn!(
                        cluster = cluster.code,
                        code = command.code,
                        "Command code not found; skipped"
                    );
                    report.skipped += 1;
                }
            }
        }
    }

    for attribute in &et.global_attributes {
        let mut found = None;
        for package in packages {
            found = pick_attribute(store.select_attributes_by_cluster(*package, None)?, attribute);
            if found.is_some() {
                break;
            }
        }
        match found {
            Some(found) => apply_attribute(store, id, &found, attribute)?,
            None => {
                warn!(code = attribute.code, "Global attribute code not found; skipped");
                report.skipped += 1;
            }
        }
    }
    Ok(id)
}

fn apply_attribute(
    store: &Store,
    endpoint_type: EndpointTypeId,
    record: &AttributeRecord,
    attribute: &StateAttribute,
) -> Result<(), ApiError> {
    let value = AttributeOverride {
        included: attribute.included,
        reportable: attribute.reportable,
        default_value: attribute
            .default_value
            .clone()
            .filter(|v| Some(v) != record.default_value.as_ref()),
    };
    store.insert_or_replace_attribute_state(endpoint_type, record.id, attribute.side, &value)?;
    Ok(())
}

fn resolve_cluster(
    store: &Store,
    packages: &[PackageId],
    cluster: &StateCluster,
) -> Result<Option<ClusterRecord>, ApiError> {
    for package in packages {
        if let Some(found) = store.select_cluster_by_code(*package, cluster.code, cluster.mfg_code)? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

/// Attribute of `cluster` by code and side, falling back to the package's
/// global attributes.
fn resolve_attribute(
    store: &Store,
    cluster: &ClusterRecord,
    attribute: &StateAttribute,
) -> Result<Option<AttributeRecord>, ApiError> {
    let own = store.select_attributes_by_cluster(cluster.package, Some(cluster.id))?;
    if let Some(found) = pick_attribute(own, attribute) {
        return Ok(Some(found));
    }
    Ok(pick_attribute(
        store.select_attributes_by_cluster(cluster.package, None)?,
        attribute,
    ))
}

/// A cluster may define the same code on both sides: the attribute on the
/// state row's side wins, any side with the code is the fallback.
fn pick_attribute(
    candidates: Vec<AttributeRecord>,
    attribute: &StateAttribute,
) -> Option<AttributeRecord> {
    let mut fallback = None;
    for candidate in candidates {
        if candidate.code != attribute.code || candidate.manufacturer_code != attribute.mfg_code {
            continue;
        }
        if candidate.side == attribute.side {
            return Some(candidate);
        }
        if fallback.is_none() {
            fallback = Some(candidate);
        }
    }
    fallback
}

fn resolve_command(
    store: &Store,
    cluster: &ClusterRecord,
    code: u32,
    mfg_code: Option<u32>,
) -> Result<Option<CommandRecord>, ApiError> {
    Ok(store
        .select_commands_by_cluster(cluster.package, Some(cluster.id))?
        .into_iter()
        .find(|c| c.code == code && c.manufacturer_code == mfg_code))
}
