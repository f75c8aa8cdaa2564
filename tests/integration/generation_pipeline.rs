//! End-to-end generation over the fixture descriptor and templates

use super::test_utils::{options_path, seeded_session, store_with_catalog, templates_dir};
use std::sync::Arc;
use tempfile::TempDir;
use zclgen::error::GenerationError;
use zclgen::generation::{
    run_generation, run_generation_blocking, run_generation_with, GenerationConfig,
    HandlebarsEngine, HelperRegistry, MemoryOutput, TemplateCache,
};
use zclgen::store::Store;
use zclgen::types::{PackageType, SessionId};

fn fixture_config(output: &std::path::Path) -> GenerationConfig {
    GenerationConfig::new(templates_dir(), output).with_options_file(options_path())
}

fn prepared_session(dir: &TempDir) -> (Arc<Store>, SessionId) {
    let (store, package) = store_with_catalog(dir);
    let (session, et) = seeded_session(&store, package, "gen");
    store.insert_endpoint(session, 1, et, 0, None).unwrap();
    store.update_key_value(session, "commandDiscovery", "1").unwrap();
    (store, session)
}

#[tokio::test]
async fn one_failing_unit_does_not_stop_the_others() {
    let dir = TempDir::new().unwrap();
    let (store, session) = prepared_session(&dir);
    let config = fixture_config(&dir.path().join("out"));
    let output = MemoryOutput::new("/gen");
    let cache = TemplateCache::new();

    let report = run_generation_with(
        store,
        session,
        &config,
        &HandlebarsEngine,
        &cache,
        &HelperRegistry::default(),
        &output,
    )
    .await
    .unwrap();

    let names: Vec<&str> = report.outcomes.iter().map(|o| o.filename.as_str()).collect();
    assert_eq!(names, vec!["cluster-id.h", "endpoint-config.h", "broken.h"]);
    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.failed(), 1);
    assert!(report.has_failures());
    assert!(matches!(
        report.outcomes[2].result,
        Err(GenerationError::TemplateResolution { .. })
    ));

    let ids = output.get("cluster-id.h").unwrap();
    assert!(ids.contains("// commandDiscovery = 1"));
    assert!(ids.contains("#define ZCL_ON_OFF_CLUSTER_ID 0x0006"));
    assert!(ids.contains("#define ZCL_BASIC_CLUSTER_ID 0x0000"));
    let basic = ids.find("ZCL_BASIC_CLUSTER_ID").unwrap();
    let on_off = ids.find("ZCL_ON_OFF_CLUSTER_ID").unwrap();
    assert!(basic < on_off);

    let config_h = output.get("endpoint-config.h").unwrap();
    assert!(config_h.contains("// endpoint type: light (3 attributes)"));
    assert!(config_h.contains("#define LIGHT_ON_OFF_ON_OFF 0x0000"));

    let endpoints = output.get("endpoints.h").unwrap();
    assert!(endpoints.contains("{ 1, 0x0104, 0 }, // light"));

    assert_eq!(report.written_files().len(), 3);
    assert!(output.get("broken.h").is_none());
}

#[tokio::test]
async fn templates_compile_once_across_units_and_runs() {
    let dir = TempDir::new().unwrap();
    let (store, session) = prepared_session(&dir);
    let config = fixture_config(&dir.path().join("out"));
    let cache = TemplateCache::new();
    let helpers = HelperRegistry::default();

    for _ in 0..2 {
        let output = MemoryOutput::new("/gen");
        run_generation_with(
            Arc::clone(&store),
            session,
            &config,
            &HandlebarsEngine,
            &cache,
            &helpers,
            &output,
        )
        .await
        .unwrap();
    }
    assert_eq!(cache.compilations(), 4);
}

#[tokio::test]
async fn unknown_helper_api_fails_every_unit() {
    let dir = TempDir::new().unwrap();
    let (store, session) = prepared_session(&dir);
    let config = fixture_config(&dir.path().join("out"));
    let output = MemoryOutput::new("/gen");

    let report = run_generation_with(
        store,
        session,
        &config,
        &HandlebarsEngine,
        &TemplateCache::new(),
        &HelperRegistry::empty(),
        &output,
    )
    .await
    .unwrap();
    assert_eq!(report.succeeded(), 0);
    assert!(report.outcomes[..2]
        .iter()
        .all(|o| matches!(o.result, Err(GenerationError::HelperResolution(_)))));
    assert!(output.files().is_empty());
}

#[tokio::test]
async fn missing_descriptor_fails_the_run() {
    let dir = TempDir::new().unwrap();
    let (store, session) = prepared_session(&dir);
    let config = GenerationConfig::new(dir.path().join("no-templates"), dir.path().join("out"));
    let err = run_generation(store, session, &config, &HandlebarsEngine, &TemplateCache::new())
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::Io { .. }));
}

#[tokio::test]
async fn run_generation_writes_into_output_directory() {
    let dir = TempDir::new().unwrap();
    let (store, session) = prepared_session(&dir);
    let out = dir.path().join("out");
    let config = fixture_config(&out);

    let report = run_generation(store, session, &config, &HandlebarsEngine, &TemplateCache::new())
        .await
        .unwrap();
    assert_eq!(report.succeeded(), 2);
    let text = std::fs::read_to_string(out.join("endpoints.h")).unwrap();
    assert!(text.contains("// light"));
}

#[test]
fn blocking_run_links_descriptor_to_session() {
    let dir = TempDir::new().unwrap();
    let (store, session) = prepared_session(&dir);
    let out = dir.path().join("out");
    let config = fixture_config(&out);

    let report =
        run_generation_blocking(Arc::clone(&store), session, &config, &HandlebarsEngine).unwrap();
    assert_eq!(report.succeeded(), 2);
    assert!(out.join("cluster-id.h").is_file());

    let types: Vec<PackageType> = store
        .get_session_packages(session)
        .unwrap()
        .into_iter()
        .map(|p| p.package_type)
        .collect();
    assert!(types.contains(&PackageType::GenTemplatesJson));
    assert!(types.contains(&PackageType::SpecProperties));
    assert!(store
        .get_all_packages()
        .unwrap()
        .iter()
        .any(|p| p.package_type == PackageType::GenTemplate));
}

#[test]
fn blocking_run_rejects_unknown_session() {
    let dir = TempDir::new().unwrap();
    let (store, _) = prepared_session(&dir);
    let config = fixture_config(&dir.path().join("out"));
    let err = run_generation_blocking(store, SessionId(31_337), &config, &HandlebarsEngine)
        .unwrap_err();
    assert!(matches!(err, zclgen::error::ApiError::SessionNotFound(_)));
}
