//! Persistence, schema version and concurrent writers

use super::test_utils::{catalog_path, reopen_store, seeded_session};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;
use zclgen::loader::load_catalog;
use zclgen::store::upgrade::{read_version, CURRENT_SCHEMA_VERSION};
use zclgen::store::Store;
use zclgen::types::PackageType;

#[test]
fn session_state_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store");
    let (session, et) = {
        let store = Store::open(&path).unwrap();
        let package = load_catalog(&store, &catalog_path()).unwrap();
        let (session, et) = seeded_session(&store, package, "persist");
        store.insert_endpoint(session, 3, et, 0, None).unwrap();
        store.set_session_clean(session).unwrap();
        store.flush().unwrap();
        (session, et)
    };

    let store = reopen_store(&path);
    assert_eq!(read_version(&store).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    assert_eq!(store.get_session_by_key("persist").unwrap().unwrap().id, session);
    assert_eq!(store.get_dirty_flag(session).unwrap(), Some(false));
    assert_eq!(store.get_all_endpoint_type_cluster_state(et).unwrap().len(), 6);
    assert_eq!(store.get_all_endpoints(session).unwrap()[0].endpoint_identifier, 3);
}

#[test]
fn concurrent_identical_package_inserts_leave_one_row() {
    let store = Arc::new(Store::temporary().unwrap());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                store
                    .insert_package("/defs/zcl.json", 0xBEEF, PackageType::SpecProperties, None)
                    .unwrap()
            })
        })
        .collect();
    let ids: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(ids.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(store.get_all_packages().unwrap().len(), 1);
}

#[test]
fn concurrent_key_value_writers_keep_one_row_per_key() {
    let store = Arc::new(Store::temporary().unwrap());
    let session = store.ensure_session("kv", None).unwrap();
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                store
                    .update_key_value(session, "shared", &i.to_string())
                    .unwrap()
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    let rows = store.get_all_session_key_values(session).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].key, "shared");
}
