//! Layered configuration: defaults, global file, workspace files, environment

use super::test_utils::{with_env_vars, with_xdg_env};
use std::path::PathBuf;
use tempfile::TempDir;
use zclgen::config::{global_config_path, ConfigLoader, ZclgenConfig};

#[test]
fn workspace_without_files_uses_defaults() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    with_xdg_env(&test_dir, || {
        let config = ConfigLoader::load(workspace.path()).unwrap();
        assert_eq!(config.generation, ZclgenConfig::default().generation);
        assert_eq!(config.logging.level, "warn");
        assert!(config.storage.store_path.ends_with("store"));
    });
}

#[test]
fn later_sources_override_earlier_ones() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    with_xdg_env(&test_dir, || {
        let global = global_config_path().unwrap();
        std::fs::create_dir_all(global.parent().unwrap()).unwrap();
        std::fs::write(
            &global,
            r#"
[logging]
level = "debug"

[generation]
template_directory = "global-templates"
"#,
        )
        .unwrap();

        let config_dir = workspace.path().join("config");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(
            config_dir.join("config.toml"),
            r#"
[generation]
template_directory = "zcl/templates"
output_directory = "zcl/out"
"#,
        )
        .unwrap();
        std::fs::write(
            config_dir.join("staging.toml"),
            r#"
[generation]
output_directory = "staging/out"
"#,
        )
        .unwrap();

        std::env::set_var("ZCLGEN_ENV", "staging");
        std::env::set_var("ZCLGEN_STORAGE__STORE_PATH", "/tmp/zclgen-env-store");
        let loaded = ConfigLoader::load(workspace.path());
        std::env::remove_var("ZCLGEN_ENV");
        std::env::remove_var("ZCLGEN_STORAGE__STORE_PATH");

        let config = loaded.unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.generation.template_directory, PathBuf::from("zcl/templates"));
        assert_eq!(config.generation.output_directory, PathBuf::from("staging/out"));
        assert_eq!(config.storage.store_path, PathBuf::from("/tmp/zclgen-env-store"));
    });
}

#[test]
fn invalid_values_fail_validation() {
    let workspace = TempDir::new().unwrap();
    let config_dir = workspace.path().join("config");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(
        config_dir.join("config.toml"),
        r#"
[logging]
format = "xml"
"#,
    )
    .unwrap();
    let test_dir = TempDir::new().unwrap();
    let err = with_xdg_env(&test_dir, || ConfigLoader::load(workspace.path())).unwrap_err();
    assert!(err.to_string().contains("logging"));
}

#[test]
fn options_file_from_environment_reaches_generation_config() {
    let workspace = TempDir::new().unwrap();
    let config = with_env_vars(
        &[("ZCLGEN_GENERATION__OPTIONS_FILE", "descriptors/gen.json")],
        || ConfigLoader::load(workspace.path()),
    )
    .unwrap();
    let run = config.generation.to_generation_config();
    assert_eq!(run.options_file, PathBuf::from("descriptors/gen.json"));
    assert_eq!(run.template_directory, PathBuf::from("templates"));
}
