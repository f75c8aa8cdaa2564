//! State file export, import and save/open round trips

use super::test_utils::{seeded_session, store_with_catalog, ONOFF_CLUSTER_CODE, ONOFF_DEVICE_CODE};
use tempfile::TempDir;
use zclgen::error::ApiError;
use zclgen::importexport::state::StateEndpoint;
use zclgen::importexport::{
    export_session, export_to_file, import_into_new_session, open_state_file,
    read_state_from_file, StateFile, FILE_PATH_KEY, STATE_FILE_VERSION,
};
use zclgen::loader::load_catalog;
use zclgen::query::{AttributeOverride, Seeding};
use zclgen::store::Store;
use zclgen::types::{EndpointTypeId, PackageType, Side};

type ClusterView = Vec<(u32, Side, bool)>;
type AttributeView = Vec<(u32, Side, bool, bool, Option<String>)>;

fn cluster_view(store: &Store, et: EndpointTypeId) -> ClusterView {
    let mut rows: ClusterView = store
        .get_all_endpoint_type_cluster_state(et)
        .unwrap()
        .into_iter()
        .map(|c| (c.code, c.side, c.enabled))
        .collect();
    rows.sort();
    rows
}

fn attribute_view(store: &Store, et: EndpointTypeId) -> AttributeView {
    let mut rows: AttributeView = store
        .get_endpoint_type_attributes(et)
        .unwrap()
        .into_iter()
        .map(|a| (a.code, a.side, a.included, a.reportable, a.default_value))
        .collect();
    rows.sort();
    rows
}

#[test]
fn export_describes_session_by_codes() {
    let dir = TempDir::new().unwrap();
    let (store, package) = store_with_catalog(&dir);
    let (session, et) = seeded_session(&store, package, "export");
    store.insert_endpoint(session, 1, et, 0, None).unwrap();
    store.update_key_value(session, "commandDiscovery", "1").unwrap();

    let state = export_session(&store, session).unwrap();
    assert_eq!(state.version, STATE_FILE_VERSION);
    assert_eq!(state.key_value("commandDiscovery"), Some("1"));
    assert_eq!(state.endpoint_types.len(), 1);

    let light = &state.endpoint_types[0];
    assert_eq!(light.name, "light");
    assert_eq!(light.device_type_code, Some(ONOFF_DEVICE_CODE));
    assert_eq!(light.clusters.len(), 6);
    let on_off_client = light
        .clusters
        .iter()
        .find(|c| c.code == ONOFF_CLUSTER_CODE && c.side == Side::Client)
        .unwrap();
    assert_eq!(on_off_client.enabled, Some(true));
    assert_eq!(on_off_client.commands.len(), 3);
    let on_off_server = light
        .clusters
        .iter()
        .find(|c| c.code == ONOFF_CLUSTER_CODE && c.side == Side::Server)
        .unwrap();
    assert_eq!(on_off_server.attributes.len(), 1);

    assert_eq!(state.endpoints.len(), 1);
    assert_eq!(state.endpoints[0].endpoint_type_index, 0);
    assert_eq!(state.endpoints[0].profile_id, 0x0104);
    assert!(state
        .package
        .iter()
        .any(|p| p.package_type == PackageType::SpecProperties));
}

#[test]
fn save_then_open_reproduces_the_session() {
    let dir = TempDir::new().unwrap();
    let (store, package) = store_with_catalog(&dir);
    let (session, et) = seeded_session(&store, package, "original");
    let on_off = store
        .select_cluster_by_code(package, ONOFF_CLUSTER_CODE, None)
        .unwrap()
        .unwrap();
    store
        .insert_or_replace_cluster_state(et, on_off.id, Side::Client, false)
        .unwrap();
    let on_off_attr = store
        .select_attributes_by_cluster(package, Some(on_off.id))
        .unwrap()
        .into_iter()
        .find(|a| a.code == 0x0000)
        .unwrap();
    store
        .insert_or_replace_attribute_state(
            et,
            on_off_attr.id,
            Side::Server,
            &AttributeOverride {
                included: true,
                reportable: true,
                default_value: Some("0x01".to_string()),
            },
        )
        .unwrap();
    store.insert_endpoint(session, 1, et, 0, Some(0x0109)).unwrap();
    store.update_key_value(session, "commandDiscovery", "1").unwrap();

    let file = dir.path().join("saved").join("light.zap");
    export_to_file(&store, session, &file).unwrap();
    assert_eq!(store.get_dirty_flag(session).unwrap(), Some(false));
    assert_eq!(
        store.select_file_location("save").unwrap().as_deref(),
        Some(file.display().to_string().as_str())
    );

    let other_dir = TempDir::new().unwrap();
    let (fresh, _) = store_with_catalog(&other_dir);
    let (opened, report) = open_state_file(&fresh, &file, "reopened", None).unwrap();
    assert_eq!(report.skipped, 0);
    assert_eq!(report.endpoint_types.len(), 1);
    assert_eq!(report.endpoints, 1);
    assert_eq!(fresh.get_dirty_flag(opened).unwrap(), Some(false));
    assert_eq!(
        fresh.get_session_key_value(opened, FILE_PATH_KEY).unwrap(),
        Some(file.display().to_string())
    );

    let new_et = report.endpoint_types[0];
    assert_eq!(cluster_view(&store, et), cluster_view(&fresh, new_et));
    assert_eq!(attribute_view(&store, et), attribute_view(&fresh, new_et));
    assert_eq!(
        store.get_endpoint_type_commands(et).unwrap().len(),
        fresh.get_endpoint_type_commands(new_et).unwrap().len()
    );
    let endpoint = &fresh.get_all_endpoints(opened).unwrap()[0];
    assert_eq!(endpoint.profile_id, 0x0109);
    assert_eq!(endpoint.endpoint_type, new_et);
}

#[test]
fn unresolved_codes_are_skipped_and_counted() {
    let dir = TempDir::new().unwrap();
    let (store, package) = store_with_catalog(&dir);
    let (session, et) = seeded_session(&store, package, "source");
    store.insert_endpoint(session, 1, et, 0, None).unwrap();

    let mut state = export_session(&store, session).unwrap();
    let mut unknown = state.endpoint_types[0].clusters[0].clone();
    unknown.code = 0x0999;
    unknown.attributes.clear();
    unknown.commands.clear();
    state.endpoint_types[0].clusters.push(unknown);
    state.endpoints.push(StateEndpoint {
        endpoint_type_index: 5,
        endpoint_id: 2,
        network_id: 0,
        profile_id: 0x0104,
    });

    let (imported, report) = import_into_new_session(&store, &state, "target", None).unwrap();
    assert_eq!(report.skipped, 2);
    assert_eq!(report.endpoints, 1);
    assert_eq!(
        store
            .get_all_endpoint_type_cluster_state(report.endpoint_types[0])
            .unwrap()
            .len(),
        6
    );
    assert_eq!(store.get_all_endpoints(imported).unwrap().len(), 1);
}

#[test]
fn newer_state_file_versions_are_rejected() {
    let text = format!(r#"{{"version": {}}}"#, STATE_FILE_VERSION + 1);
    assert!(matches!(
        StateFile::from_json(&text),
        Err(ApiError::ImportExport(_))
    ));
    let legacy = StateFile::from_json("{}").unwrap();
    assert_eq!(legacy.version, 1);
}

#[test]
fn written_file_reads_back() {
    let dir = TempDir::new().unwrap();
    let (store, package) = store_with_catalog(&dir);
    let (session, _) = seeded_session(&store, package, "file");
    let file = dir.path().join("state.zap");
    let written = export_to_file(&store, session, &file).unwrap();
    let read = read_state_from_file(&file).unwrap();
    assert_eq!(read.endpoint_types, written.endpoint_types);
    assert_eq!(read.key_value(FILE_PATH_KEY), Some(file.display().to_string().as_str()));
}

#[test]
fn exporting_missing_session_fails() {
    let store = Store::temporary().unwrap();
    let err = export_session(&store, zclgen::types::SessionId(5)).unwrap_err();
    assert!(matches!(err, ApiError::SessionNotFound(_)));
}

#[test]
fn same_code_attributes_keep_their_side_across_round_trip() {
    let dir = TempDir::new().unwrap();
    let catalog = dir.path().join("sided.json");
    std::fs::write(
        &catalog,
        r#"{
            "clusters": [{
                "code": "0x0006", "name": "On/off",
                "attributes": [
                    {"code": "0x0000", "name": "server-attr", "side": "server", "type": "BOOLEAN"},
                    {"code": "0x0000", "name": "client-attr", "side": "client", "type": "INT8U"}
                ]
            }]
        }"#,
    )
    .unwrap();
    let store = Store::open(dir.path().join("store")).unwrap();
    let package = load_catalog(&store, &catalog).unwrap();
    let session = store.ensure_session("sided", None).unwrap();
    store.insert_session_package(session, package, true).unwrap();
    let et = store
        .insert_endpoint_type(session, "remote", None, Seeding::Empty)
        .unwrap();

    let cluster = store.select_cluster_by_code(package, 6, None).unwrap().unwrap();
    let client_attr = store
        .select_attributes_by_cluster(package, Some(cluster.id))
        .unwrap()
        .into_iter()
        .find(|a| a.side == Side::Client)
        .unwrap();
    store
        .insert_or_replace_attribute_state(
            et,
            client_attr.id,
            Side::Client,
            &AttributeOverride {
                included: true,
                reportable: false,
                default_value: None,
            },
        )
        .unwrap();

    let named = |et: EndpointTypeId| -> Vec<(String, Side, String)> {
        store
            .get_endpoint_type_attributes(et)
            .unwrap()
            .into_iter()
            .map(|a| (a.name, a.side, a.type_name))
            .collect()
    };
    let before = named(et);
    assert_eq!(before, vec![("client-attr".to_string(), Side::Client, "INT8U".to_string())]);

    let state = export_session(&store, session).unwrap();
    let (_, report) = import_into_new_session(&store, &state, "sided-copy", None).unwrap();
    assert_eq!(report.skipped, 0);
    assert_eq!(named(report.endpoint_types[0]), before);
}
