//! Package fingerprints, session package links and option lists

use super::test_utils::{catalog_path, store_with_catalog};
use tempfile::TempDir;
use zclgen::loader::{canonical_path, load_catalog};
use zclgen::store::Store;
use zclgen::types::PackageType;

#[test]
fn catalog_loads_once_per_fingerprint() {
    let dir = TempDir::new().unwrap();
    let (store, package) = store_with_catalog(&dir);
    let again = load_catalog(&store, &catalog_path()).unwrap();
    assert_eq!(package, again);
    assert_eq!(store.get_all_packages().unwrap().len(), 1);

    let record = store.get_package(package).unwrap().unwrap();
    assert_eq!(record.package_type, PackageType::SpecProperties);
    assert_eq!(record.version.as_deref(), Some("ZCL Test Catalog 1.0"));
    let path = canonical_path(&catalog_path()).unwrap();
    assert_eq!(store.get_path_crc(&path).unwrap(), Some(record.crc));
}

#[test]
fn changed_file_becomes_a_new_package() {
    let dir = TempDir::new().unwrap();
    let copy = dir.path().join("catalog.json");
    std::fs::copy(catalog_path(), &copy).unwrap();
    let store = Store::temporary().unwrap();
    let first = load_catalog(&store, &copy).unwrap();

    let text = std::fs::read_to_string(&copy).unwrap();
    std::fs::write(&copy, text.replace("ZCL Test Catalog 1.0", "ZCL Test Catalog 1.1")).unwrap();
    let second = load_catalog(&store, &copy).unwrap();
    assert_ne!(first, second);

    let latest = store
        .get_package_by_path(&canonical_path(&copy).unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(latest.id, second);
}

#[test]
fn option_lists_keep_catalog_order_without_duplicates() {
    let dir = TempDir::new().unwrap();
    let (store, package) = store_with_catalog(&dir);

    let codes: Vec<String> = store
        .select_all_options(package, "manufacturerCodes")
        .unwrap()
        .into_iter()
        .map(|o| o.value)
        .collect();
    assert_eq!(codes, vec!["0x1002", "0x1049"]);

    store
        .insert_options(
            package,
            "manufacturerCodes",
            &["0x1049".to_string(), "0x10F2".to_string()],
        )
        .unwrap();
    assert_eq!(
        store.select_all_options(package, "manufacturerCodes").unwrap().len(),
        3
    );

    let mut categories = store.select_option_categories(package).unwrap();
    categories.sort();
    assert_eq!(categories, vec!["defaultResponsePolicy", "manufacturerCodes"]);
}

#[test]
fn session_package_links_are_deduplicated() {
    let dir = TempDir::new().unwrap();
    let (store, package) = store_with_catalog(&dir);
    let session = store.ensure_session("s", None).unwrap();
    store.insert_session_package(session, package, true).unwrap();
    store.insert_session_package(session, package, false).unwrap();
    assert_eq!(store.get_session_packages(session).unwrap().len(), 1);
    assert_eq!(store.catalog_packages(session).unwrap(), vec![package]);
}

#[test]
fn catalog_packages_fall_back_to_every_loaded_catalog() {
    let dir = TempDir::new().unwrap();
    let (store, package) = store_with_catalog(&dir);
    let session = store.ensure_session("unattached", None).unwrap();
    assert!(store.get_session_packages(session).unwrap().is_empty());
    assert_eq!(store.catalog_packages(session).unwrap(), vec![package]);
}

#[test]
fn linking_missing_rows_violates_constraints() {
    let dir = TempDir::new().unwrap();
    let (store, package) = store_with_catalog(&dir);
    let missing_session = zclgen::types::SessionId(9_999);
    let err = store
        .insert_session_package(missing_session, package, true)
        .unwrap_err();
    assert!(err.is_constraint_violation());

    let session = store.ensure_session("s", None).unwrap();
    let err = store
        .insert_session_package(session, zclgen::types::PackageId(9_999), true)
        .unwrap_err();
    assert!(err.is_constraint_violation());
}
