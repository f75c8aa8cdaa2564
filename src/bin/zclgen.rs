//! zclgen CLI binary.

use anyhow::Context;
use clap::Parser;
use std::process;
use tracing::{debug, error};
use zclgen::cli::{map_error, Cli, RunContext};
use zclgen::config::ConfigLoader;
use zclgen::logging::{init_logging, LoggingConfig};

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&build_logging_config(&cli)) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    match run(&cli) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("{:#}", e);
            process::exit(1);
        }
    }
}

/// Runs the command; `Ok(false)` when it completed but reported failures.
fn run(cli: &Cli) -> anyhow::Result<bool> {
    let context = RunContext::new(cli.workspace.clone(), cli.config.clone(), cli.store.clone())
        .map_err(|e| anyhow::anyhow!(map_error(&e)))
        .context("Failed to initialize zclgen")?;
    debug!("CLI context initialized");

    let output = context
        .execute(&cli.command)
        .map_err(|e| anyhow::anyhow!(map_error(&e)))?;
    println!("{}", output.text);
    Ok(output.success)
}

/// Logging from CLI flags over the configured logging section. Logging is
/// off unless `--verbose` is given.
fn build_logging_config(cli: &Cli) -> LoggingConfig {
    if !cli.verbose {
        return LoggingConfig {
            level: "off".to_string(),
            ..LoggingConfig::default()
        };
    }

    let mut config = match cli.config {
        Some(ref path) => ConfigLoader::load_from_file(path).map(|c| c.logging),
        None => ConfigLoader::load(&cli.workspace).map(|c| c.logging),
    }
    .unwrap_or_default();

    if let Some(ref level) = cli.log_level {
        config.level = level.clone();
    }
    if let Some(ref format) = cli.log_format {
        config.format = format.clone();
    }
    if let Some(ref output) = cli.log_output {
        config.output = output.clone();
    }
    if let Some(ref file) = cli.log_file {
        config.file = file.clone();
    }
    config
}
