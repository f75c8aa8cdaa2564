//! Session lifecycle and dirty-flag tests

use super::test_utils::{seeded_session, store_with_catalog};
use tempfile::TempDir;
use zclgen::store::Store;

#[test]
fn ensure_session_is_idempotent_per_key() {
    let store = Store::temporary().unwrap();
    let first = store.ensure_session("tab-1", Some(7)).unwrap();
    let again = store.ensure_session("tab-1", None).unwrap();
    assert_eq!(first, again);
    assert_eq!(store.list_sessions().unwrap().len(), 1);

    let info = store.session_info_from_window(7).unwrap().unwrap();
    assert_eq!(info.session_id, first);
    assert_eq!(info.session_key, "tab-1");
    assert!(store.session_info_from_window(8).unwrap().is_none());
}

#[test]
fn window_bound_to_another_session_is_rejected() {
    let store = Store::temporary().unwrap();
    store.ensure_session("tab-1", Some(7)).unwrap();
    let err = store.ensure_session("tab-2", Some(7)).unwrap_err();
    assert!(err.is_constraint_violation());
    assert!(store.get_session_by_key("tab-2").unwrap().is_none());
}

#[test]
fn every_session_write_marks_it_dirty() {
    let dir = TempDir::new().unwrap();
    let (store, package) = store_with_catalog(&dir);
    let (session, et) = seeded_session(&store, package, "dirty");
    assert_eq!(store.get_dirty_flag(session).unwrap(), Some(true));

    store.set_session_clean(session).unwrap();
    assert_eq!(store.get_dirty_flag(session).unwrap(), Some(false));
    store.update_key_value(session, "commandDiscovery", "1").unwrap();
    assert_eq!(store.get_dirty_flag(session).unwrap(), Some(true));

    store.set_session_clean(session).unwrap();
    store.insert_endpoint(session, 1, et, 0, None).unwrap();
    assert_eq!(store.get_dirty_flag(session).unwrap(), Some(true));

    store.set_session_clean(session).unwrap();
    store.update_endpoint_type_name(et, "dimmable light").unwrap();
    assert_eq!(store.get_dirty_flag(session).unwrap(), Some(true));
}

#[test]
fn writes_to_one_session_leave_others_clean() {
    let dir = TempDir::new().unwrap();
    let (store, package) = store_with_catalog(&dir);
    let (a, _) = seeded_session(&store, package, "a");
    let (b, _) = seeded_session(&store, package, "b");
    store.set_session_clean(a).unwrap();
    store.set_session_clean(b).unwrap();

    store.update_key_value(a, "k", "v").unwrap();
    assert_eq!(store.get_dirty_flag(a).unwrap(), Some(true));
    assert_eq!(store.get_dirty_flag(b).unwrap(), Some(false));
}

#[test]
fn delete_session_removes_everything_it_owns() {
    let dir = TempDir::new().unwrap();
    let (store, package) = store_with_catalog(&dir);
    let (session, et) = seeded_session(&store, package, "gone");
    let (other, other_et) = seeded_session(&store, package, "kept");
    store.insert_endpoint(session, 1, et, 0, None).unwrap();
    store.update_key_value(session, "k", "v").unwrap();

    assert_eq!(store.delete_session(session).unwrap(), 1);
    assert_eq!(store.delete_session(session).unwrap(), 0);

    assert!(store.get_session(session).unwrap().is_none());
    assert!(store.get_session_by_key("gone").unwrap().is_none());
    assert!(store.get_all_endpoint_types(session).unwrap().is_empty());
    assert!(store.get_all_endpoints(session).unwrap().is_empty());
    assert!(store.get_all_session_key_values(session).unwrap().is_empty());
    assert!(store.get_all_endpoint_type_cluster_state(et).unwrap().is_empty());
    assert!(store.get_session_packages(session).unwrap().is_empty());

    assert_eq!(store.get_all_endpoint_types(other).unwrap().len(), 1);
    assert_eq!(
        store.get_all_endpoint_type_cluster_state(other_et).unwrap().len(),
        6
    );
    // Catalog survives session teardown
    assert_eq!(store.select_all_clusters(package).unwrap().len(), 3);
}

#[test]
fn unknown_session_reads_are_empty_not_errors() {
    let store = Store::temporary().unwrap();
    let missing = zclgen::types::SessionId(4242);
    assert!(store.get_session(missing).unwrap().is_none());
    assert!(store.get_dirty_flag(missing).unwrap().is_none());
    assert_eq!(store.set_session_clean(missing).unwrap(), 0);
    assert!(store.get_all_endpoint_types(missing).unwrap().is_empty());
}
