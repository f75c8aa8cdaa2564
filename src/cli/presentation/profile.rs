//! Endpoint type, endpoint and key-value formatters.

use super::shared::{optional_hex, table, to_json, yes_no};
use crate::error::ApiError;
use crate::query::{EndpointTypeCluster, EndpointTypeSummary};
use crate::store::schema::{EndpointRecord, EndpointTypeRecord, KeyValueRecord};
use crate::types::hex_code;

pub fn format_endpoint_types(
    rows: &[(EndpointTypeRecord, EndpointTypeSummary)],
    format: &str,
) -> Result<String, ApiError> {
    if format == "json" {
        let out: Vec<serde_json::Value> = rows
            .iter()
            .map(|(et, summary)| {
                serde_json::json!({
                    "id": et.id,
                    "name": et.name,
                    "deviceType": et.device_type,
                    "enabledClusters": summary.enabled_clusters,
                    "enabledAttributes": summary.enabled_attributes,
                })
            })
            .collect();
        return to_json(&out);
    }
    if rows.is_empty() {
        return Ok("No endpoint types.".to_string());
    }
    let mut t = table(vec!["Id", "Name", "Device type", "Clusters", "Attributes"]);
    for (et, summary) in rows {
        t.add_row(vec![
            et.id.to_string(),
            et.name.clone(),
            et.device_type.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string()),
            summary.enabled_clusters.to_string(),
            summary.enabled_attributes.to_string(),
        ]);
    }
    Ok(t.to_string())
}

pub fn format_cluster_state(rows: &[EndpointTypeCluster], format: &str) -> Result<String, ApiError> {
    if format == "json" {
        return to_json(rows);
    }
    if rows.is_empty() {
        return Ok("No cluster state.".to_string());
    }
    let mut t = table(vec!["Code", "Mfg", "Name", "Side", "Enabled"]);
    for c in rows {
        t.add_row(vec![
            hex_code(c.code),
            optional_hex(c.manufacturer_code),
            c.name.clone(),
            c.side.to_string(),
            yes_no(c.enabled),
        ]);
    }
    Ok(t.to_string())
}

pub fn format_endpoints(rows: &[EndpointRecord], format: &str) -> Result<String, ApiError> {
    if format == "json" {
        return to_json(rows);
    }
    if rows.is_empty() {
        return Ok("No endpoints.".to_string());
    }
    let mut t = table(vec!["Id", "Endpoint", "Endpoint type", "Network", "Profile"]);
    for e in rows {
        t.add_row(vec![
            e.id.to_string(),
            e.endpoint_identifier.to_string(),
            e.endpoint_type.to_string(),
            e.network_id.to_string(),
            hex_code(u32::from(e.profile_id)),
        ]);
    }
    Ok(t.to_string())
}

pub fn format_key_values(rows: &[KeyValueRecord], format: &str) -> Result<String, ApiError> {
    if format == "json" {
        let map: serde_json::Map<String, serde_json::Value> = rows
            .iter()
            .map(|kv| (kv.key.clone(), serde_json::Value::from(kv.value.clone())))
            .collect();
        return to_json(&map);
    }
    Ok(rows
        .iter()
        .map(|kv| format!("{} = {}", kv.key, kv.value))
        .collect::<Vec<_>>()
        .join("\n"))
}
