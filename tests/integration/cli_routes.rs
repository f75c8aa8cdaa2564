//! CLI route table driven with parsed command lines

use super::test_utils::{catalog_path, options_path, templates_dir, with_xdg_env};
use clap::Parser;
use tempfile::TempDir;
use zclgen::cli::{Cli, RunContext};
use zclgen::error::ApiError;

fn run(context: &RunContext, args: &[&str]) -> Result<zclgen::cli::CommandOutput, ApiError> {
    let mut argv = vec!["zclgen"];
    argv.extend_from_slice(args);
    let cli = Cli::try_parse_from(argv).unwrap();
    context.execute(&cli.command)
}

fn context(test_dir: &TempDir, workspace: &TempDir) -> RunContext {
    RunContext::new(
        workspace.path().to_path_buf(),
        None,
        Some(test_dir.path().join("store")),
    )
    .unwrap()
}

#[test]
fn configure_generate_and_save_from_the_command_line() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    with_xdg_env(&test_dir, || {
        let ctx = context(&test_dir, &workspace);
        let catalog = catalog_path().display().to_string();
        run(&ctx, &["package", "load", &catalog]).unwrap();
        run(&ctx, &["session", "open", "cli-tab", "--window", "3"]).unwrap();
        let session = ctx.store().get_session_by_key("cli-tab").unwrap().unwrap().id;
        let sid = session.0.to_string();

        let out = run(
            &ctx,
            &["endpoint-type", "add", "--session", &sid, "--name", "light", "--device-type", "0x0100"],
        )
        .unwrap();
        assert!(out.text.contains("6 clusters"));
        let et = ctx.store().get_all_endpoint_types(session).unwrap()[0].id;
        let et_id = et.0.to_string();
        run(
            &ctx,
            &["endpoint", "add", "--session", &sid, "--id", "1", "--endpoint-type", &et_id],
        )
        .unwrap();
        run(&ctx, &["kv", "set", "--session", &sid, "commandDiscovery", "1"]).unwrap();
        assert_eq!(
            run(&ctx, &["kv", "get", "--session", &sid, "commandDiscovery"]).unwrap().text,
            "1"
        );

        let listing = run(&ctx, &["endpoint-type", "list", "--session", &sid, "--format", "json"])
            .unwrap();
        assert!(listing.text.contains("light"));

        let out_dir = test_dir.path().join("generated");
        let templates = templates_dir().display().to_string();
        let options = options_path().display().to_string();
        let out_arg = out_dir.display().to_string();
        let generated = run(
            &ctx,
            &[
                "generate", "--session", &sid, "--templates", &templates, "--options", &options,
                "--output", &out_arg,
            ],
        )
        .unwrap();
        // The fixture descriptor carries one unit with a missing template directory
        assert!(!generated.success);
        assert!(generated.text.contains("2 succeeded, 1 failed"));
        assert!(out_dir.join("cluster-id.h").is_file());

        let saved = test_dir.path().join("light.zap");
        let saved_arg = saved.display().to_string();
        run(&ctx, &["state", "export", "--session", &sid, &saved_arg]).unwrap();
        assert_eq!(ctx.store().get_dirty_flag(session).unwrap(), Some(false));

        let opened = run(&ctx, &["state", "import", &saved_arg, "--key", "copy"]).unwrap();
        assert!(opened.text.contains("1 endpoint types, 1 endpoints"));

        run(&ctx, &["session", "close", &sid, "--force"]).unwrap();
        assert!(ctx.store().get_session(session).unwrap().is_none());
    });
}

#[test]
fn missing_session_is_reported() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    with_xdg_env(&test_dir, || {
        let ctx = context(&test_dir, &workspace);
        let err = run(&ctx, &["session", "info", "--session", "404"]).unwrap_err();
        assert!(matches!(err, ApiError::SessionNotFound(_)));
        let err = run(&ctx, &["session", "clean", "404"]).unwrap_err();
        assert!(matches!(err, ApiError::SessionNotFound(_)));
    });
}

#[test]
fn templates_list_marks_used_templates() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    with_xdg_env(&test_dir, || {
        let ctx = context(&test_dir, &workspace);
        let templates = templates_dir().display().to_string();
        let options = options_path().display().to_string();
        let out = run(
            &ctx,
            &["templates", "list", "--templates", &templates, "--options", &options],
        )
        .unwrap();
        assert!(out.text.contains("cluster-id.handlebars"));
        assert!(out.text.contains("endpoint-config.h"));
    });
}

#[test]
fn config_init_refuses_to_overwrite() {
    let test_dir = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    with_xdg_env(&test_dir, || {
        let ctx = context(&test_dir, &workspace);
        run(&ctx, &["config", "init"]).unwrap();
        assert!(workspace.path().join("config").join("config.toml").is_file());
        assert!(run(&ctx, &["config", "init"]).is_err());
        run(&ctx, &["config", "init", "--force"]).unwrap();

        let shown = run(&ctx, &["config", "show"]).unwrap();
        assert!(shown.text.contains("[generation]"));
    });
}
