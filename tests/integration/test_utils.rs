//! Shared test utilities for integration tests
//!
//! Fixture paths, a store preloaded with the test catalog, and isolated XDG
//! directories for tests that touch the global config location.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use zclgen::loader::load_catalog;
use zclgen::query::Seeding;
use zclgen::store::Store;
use zclgen::types::{DeviceTypeId, EndpointTypeId, PackageId, SessionId};

/// Global mutex to serialize environment variable access across all tests
static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Device type in the fixture catalog that enables both sides of three
/// clusters.
pub const ONOFF_DEVICE_CODE: u32 = 0x0100;
pub const ONOFF_CLUSTER_CODE: u32 = 0x0006;
pub const IDENTIFY_CLUSTER_CODE: u32 = 0x0003;

/// Reopen a store whose previous handle was just dropped. sled releases its
/// file lock asynchronously, so the first attempts may still see it held.
pub fn reopen_store(path: &Path) -> Store {
    let mut attempts = 0;
    loop {
        match Store::open(path) {
            Ok(store) => return store,
            Err(e) if attempts < 50 => {
                attempts += 1;
                eprintln!("store still locked ({e}); retrying");
                std::thread::sleep(Duration::from_millis(20));
            }
            Err(e) => panic!("store did not reopen: {e}"),
        }
    }
}

pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures")
}

pub fn catalog_path() -> PathBuf {
    fixtures_dir().join("catalog.json")
}

pub fn templates_dir() -> PathBuf {
    fixtures_dir().join("templates")
}

pub fn options_path() -> PathBuf {
    fixtures_dir().join("generation-options.json")
}

/// Store on disk under `dir`, with the fixture catalog loaded.
pub fn store_with_catalog(dir: &TempDir) -> (Arc<Store>, PackageId) {
    let store = Store::shared(dir.path().join("store")).unwrap();
    let package = load_catalog(&store, &catalog_path()).unwrap();
    (store, package)
}

pub fn onoff_device_type(store: &Store, package: PackageId) -> DeviceTypeId {
    store
        .select_device_type_by_code(package, ONOFF_DEVICE_CODE)
        .unwrap()
        .expect("fixture device type")
        .id
}

/// Session with the catalog attached and one seeded endpoint type.
pub fn seeded_session(
    store: &Store,
    package: PackageId,
    key: &str,
) -> (SessionId, EndpointTypeId) {
    let session = store.ensure_session(key, None).unwrap();
    store.insert_session_package(session, package, true).unwrap();
    let device = onoff_device_type(store, package);
    let et = store
        .insert_endpoint_type(session, "light", Some(device), Seeding::FromDeviceType)
        .unwrap();
    (session, et)
}

struct EnvState {
    home: Option<String>,
    xdg_config_home: Option<String>,
    xdg_data_home: Option<String>,
}

impl EnvState {
    fn capture() -> Self {
        Self {
            home: std::env::var("HOME").ok(),
            xdg_config_home: std::env::var("XDG_CONFIG_HOME").ok(),
            xdg_data_home: std::env::var("XDG_DATA_HOME").ok(),
        }
    }

    fn restore(self) {
        restore_var("HOME", self.home);
        restore_var("XDG_CONFIG_HOME", self.xdg_config_home);
        restore_var("XDG_DATA_HOME", self.xdg_data_home);
    }
}

fn restore_var(name: &str, value: Option<String>) {
    match value {
        Some(v) => std::env::set_var(name, v),
        None => std::env::remove_var(name),
    }
}

/// Run `f` with HOME and the XDG config/data homes pointing into `test_dir`.
/// The original environment is restored afterwards.
pub fn with_xdg_env<F, R>(test_dir: &TempDir, f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let env_state = EnvState::capture();

    let test_config_home = test_dir.path().join("config-home");
    let test_data_home = test_dir.path().join("data");
    let test_home = test_dir.path().join("home");
    std::fs::create_dir_all(&test_config_home).unwrap();
    std::fs::create_dir_all(&test_data_home).unwrap();
    std::fs::create_dir_all(&test_home).unwrap();

    std::env::set_var("HOME", test_home.to_str().unwrap());
    std::env::set_var("XDG_CONFIG_HOME", test_config_home.to_str().unwrap());
    std::env::set_var("XDG_DATA_HOME", test_data_home.to_str().unwrap());

    let result = f();

    env_state.restore();
    result
}

/// Run `f` with extra environment variables set, under the same lock.
pub fn with_env_vars<F, R>(vars: &[(&str, &str)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let previous: Vec<(String, Option<String>)> = vars
        .iter()
        .map(|(k, _)| (k.to_string(), std::env::var(k).ok()))
        .collect();
    for (k, v) in vars {
        std::env::set_var(k, v);
    }

    let result = f();

    for (k, v) in previous {
        restore_var(&k, v);
    }
    result
}
