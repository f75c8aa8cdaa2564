//! Endpoint types, cluster/attribute/command state, endpoints and key-values

use super::test_utils::{
    onoff_device_type, seeded_session, store_with_catalog, IDENTIFY_CLUSTER_CODE,
    ONOFF_CLUSTER_CODE,
};
use tempfile::TempDir;
use zclgen::query::{AttributeOverride, EndpointUpdate, Seeding};
use zclgen::types::{DeviceTypeId, Side, DEFAULT_PROFILE_ID};

#[test]
fn device_type_seeds_default_state() {
    let dir = TempDir::new().unwrap();
    let (store, package) = store_with_catalog(&dir);
    let (_, et) = seeded_session(&store, package, "seed");

    let clusters = store.get_all_endpoint_type_cluster_state(et).unwrap();
    assert_eq!(clusters.len(), 6);
    assert!(clusters.iter().all(|c| c.enabled));
    assert_eq!(
        clusters.iter().filter(|c| c.side == Side::Server).count(),
        3
    );

    let attributes = store.get_endpoint_type_attributes(et).unwrap();
    assert_eq!(attributes.len(), 3);
    assert!(attributes.iter().all(|a| a.included && a.side == Side::Server));

    let commands = store.get_endpoint_type_commands(et).unwrap();
    assert_eq!(commands.len(), 4);
    assert!(commands.iter().all(|c| c.incoming && c.outgoing));

    let summary = store.endpoint_type_summary(et).unwrap();
    assert_eq!(summary.enabled_clusters, 6);
    assert_eq!(summary.enabled_attributes, 3);
}

#[test]
fn empty_seeding_creates_no_state() {
    let dir = TempDir::new().unwrap();
    let (store, package) = store_with_catalog(&dir);
    let session = store.ensure_session("empty", None).unwrap();
    let device = onoff_device_type(&store, package);
    let et = store
        .insert_endpoint_type(session, "blank", Some(device), Seeding::Empty)
        .unwrap();
    assert!(store.get_all_endpoint_type_cluster_state(et).unwrap().is_empty());
    assert_eq!(
        store.select_endpoint_type(et).unwrap().unwrap().device_type,
        Some(device)
    );
}

#[test]
fn unknown_device_type_is_a_constraint_violation() {
    let dir = TempDir::new().unwrap();
    let (store, _) = store_with_catalog(&dir);
    let session = store.ensure_session("s", None).unwrap();
    let err = store
        .insert_endpoint_type(session, "x", Some(DeviceTypeId(77_777)), Seeding::FromDeviceType)
        .unwrap_err();
    assert!(err.is_constraint_violation());
    assert!(store.get_all_endpoint_types(session).unwrap().is_empty());
}

#[test]
fn replacing_state_keeps_one_row_and_its_id() {
    let dir = TempDir::new().unwrap();
    let (store, package) = store_with_catalog(&dir);
    let (_, et) = seeded_session(&store, package, "replace");
    let on_off = store
        .select_cluster_by_code(package, ONOFF_CLUSTER_CODE, None)
        .unwrap()
        .unwrap();

    let before = store
        .get_all_endpoint_type_cluster_state(et)
        .unwrap()
        .into_iter()
        .find(|c| c.cluster == on_off.id && c.side == Side::Client)
        .unwrap();
    let id = store
        .insert_or_replace_cluster_state(et, on_off.id, Side::Client, false)
        .unwrap();
    assert_eq!(id, before.id);

    let after = store.get_all_endpoint_type_cluster_state(et).unwrap();
    assert_eq!(after.len(), 6);
    let row = after
        .iter()
        .find(|c| c.cluster == on_off.id && c.side == Side::Client)
        .unwrap();
    assert!(!row.enabled);
    assert_eq!(store.endpoint_type_summary(et).unwrap().enabled_clusters, 5);
}

#[test]
fn attribute_override_falls_back_to_catalog_default() {
    let dir = TempDir::new().unwrap();
    let (store, package) = store_with_catalog(&dir);
    let (_, et) = seeded_session(&store, package, "attrs");
    let identify = store
        .select_cluster_by_code(package, IDENTIFY_CLUSTER_CODE, None)
        .unwrap()
        .unwrap();
    let identify_time = store
        .select_attributes_by_cluster(package, Some(identify.id))
        .unwrap()
        .remove(0);

    let seeded = store
        .get_endpoint_type_attributes(et)
        .unwrap()
        .into_iter()
        .find(|a| a.attribute == identify_time.id)
        .unwrap();
    assert_eq!(seeded.default_value.as_deref(), Some("0x0000"));
    assert!(seeded.is_writable);

    store
        .insert_or_replace_attribute_state(
            et,
            identify_time.id,
            Side::Server,
            &AttributeOverride {
                included: true,
                reportable: true,
                default_value: Some("0x000A".to_string()),
            },
        )
        .unwrap();
    let overridden = store
        .get_endpoint_type_attributes(et)
        .unwrap()
        .into_iter()
        .find(|a| a.attribute == identify_time.id)
        .unwrap();
    assert_eq!(overridden.default_value.as_deref(), Some("0x000A"));
    assert!(overridden.reportable);
    assert_eq!(overridden.id, seeded.id);
}

#[test]
fn command_state_replaces_in_place() {
    let dir = TempDir::new().unwrap();
    let (store, package) = store_with_catalog(&dir);
    let (_, et) = seeded_session(&store, package, "cmds");
    let on_off = store
        .select_cluster_by_code(package, ONOFF_CLUSTER_CODE, None)
        .unwrap()
        .unwrap();
    let toggle = store
        .select_commands_by_cluster(package, Some(on_off.id))
        .unwrap()
        .into_iter()
        .find(|c| c.name == "Toggle")
        .unwrap();

    store
        .insert_or_replace_command_state(et, toggle.id, Side::Client, true, false)
        .unwrap();
    let commands = store.get_endpoint_type_commands(et).unwrap();
    assert_eq!(commands.len(), 4);
    let row = commands.iter().find(|c| c.command == toggle.id).unwrap();
    assert!(row.incoming);
    assert!(!row.outgoing);
}

#[test]
fn deleting_endpoint_type_cascades_state_but_not_endpoints() {
    let dir = TempDir::new().unwrap();
    let (store, package) = store_with_catalog(&dir);
    let (session, et) = seeded_session(&store, package, "cascade");
    let endpoint = store.insert_endpoint(session, 1, et, 0, None).unwrap();

    assert_eq!(store.delete_endpoint_type(et).unwrap(), 1);
    assert_eq!(store.delete_endpoint_type(et).unwrap(), 0);
    assert!(store.get_all_endpoint_type_cluster_state(et).unwrap().is_empty());
    assert!(store.get_endpoint_type_attributes(et).unwrap().is_empty());
    assert!(store.get_endpoint_type_commands(et).unwrap().is_empty());
    assert!(store.select_endpoint(endpoint).unwrap().is_some());
}

#[test]
fn endpoints_default_profile_and_update_fields() {
    let dir = TempDir::new().unwrap();
    let (store, package) = store_with_catalog(&dir);
    let (session, et) = seeded_session(&store, package, "eps");
    let endpoint = store.insert_endpoint(session, 1, et, 0, None).unwrap();
    assert_eq!(
        store.select_endpoint(endpoint).unwrap().unwrap().profile_id,
        DEFAULT_PROFILE_ID
    );

    assert_eq!(
        store
            .update_endpoint(endpoint, EndpointUpdate::EndpointIdentifier(2))
            .unwrap(),
        1
    );
    store
        .update_endpoint(endpoint, EndpointUpdate::ProfileId(0x0109))
        .unwrap();
    let record = store.select_endpoint(endpoint).unwrap().unwrap();
    assert_eq!(record.endpoint_identifier, 2);
    assert_eq!(record.profile_id, 0x0109);

    assert_eq!(store.delete_endpoint(endpoint).unwrap(), 1);
    assert_eq!(store.delete_endpoint(endpoint).unwrap(), 0);
    assert!(store.get_all_endpoints(session).unwrap().is_empty());
}

#[test]
fn endpoint_type_from_other_session_is_rejected() {
    let dir = TempDir::new().unwrap();
    let (store, package) = store_with_catalog(&dir);
    let (_, et) = seeded_session(&store, package, "owner");
    let other = store.ensure_session("other", None).unwrap();
    let err = store.insert_endpoint(other, 1, et, 0, None).unwrap_err();
    assert!(err.is_constraint_violation());
}

#[test]
fn key_values_upsert_in_first_insertion_order() {
    let dir = TempDir::new().unwrap();
    let (store, package) = store_with_catalog(&dir);
    let (session, _) = seeded_session(&store, package, "kv");
    store.update_key_value(session, "zeta", "1").unwrap();
    store.update_key_value(session, "alpha", "2").unwrap();
    store.update_key_value(session, "zeta", "3").unwrap();

    let pairs: Vec<(String, String)> = store
        .get_all_session_key_values(session)
        .unwrap()
        .into_iter()
        .map(|kv| (kv.key, kv.value))
        .collect();
    assert_eq!(
        pairs,
        vec![
            ("zeta".to_string(), "3".to_string()),
            ("alpha".to_string(), "2".to_string())
        ]
    );
    assert_eq!(
        store.get_session_key_value(session, "alpha").unwrap().as_deref(),
        Some("2")
    );
    assert_eq!(store.delete_key_value(session, "alpha").unwrap(), 1);
    assert_eq!(store.delete_key_value(session, "alpha").unwrap(), 0);
    assert!(store.get_session_key_value(session, "alpha").unwrap().is_none());
}
