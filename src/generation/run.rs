//! Single generation entry point: load the descriptor, snapshot the session,
//! run every unit. CLI and other callers use only this.

use crate::error::{ApiError, GenerationError};
use crate::generation::engine::TemplateEngine;
use crate::generation::executor::{GenerationExecutor, GenerationReport};
use crate::generation::helpers::HelperRegistry;
use crate::generation::options::{GenerationConfig, GenerationOptions};
use crate::generation::output::{FsOutput, OutputSink};
use crate::generation::rows::Snapshot;
use crate::generation::templates::{register_template_packages, TemplateCache};
use crate::store::Store;
use crate::types::SessionId;
use std::sync::Arc;
use tracing::info;

/// Run generation for `session` and write into the configured output
/// directory. Fails only when the run cannot start (unreadable descriptor,
/// unreadable store); unit failures are in the report.
pub async fn run_generation(
    store: Arc<Store>,
    session: SessionId,
    config: &GenerationConfig,
    engine: &dyn TemplateEngine,
    cache: &TemplateCache,
) -> Result<GenerationReport, GenerationError> {
    let output = FsOutput::new(&config.output_directory);
    run_generation_with(
        store,
        session,
        config,
        engine,
        cache,
        &HelperRegistry::default(),
        &output,
    )
    .await
}

/// [`run_generation`] with explicit helper registry and output sink.
pub async fn run_generation_with(
    store: Arc<Store>,
    session: SessionId,
    config: &GenerationConfig,
    engine: &dyn TemplateEngine,
    cache: &TemplateCache,
    helpers: &HelperRegistry,
    output: &dyn OutputSink,
) -> Result<GenerationReport, GenerationError> {
    cache.set_directory(&config.template_directory);
    let options = GenerationOptions::load(&config.options_file).await?;
    let snapshot = Snapshot::new(store, session)?;
    info!(
        session = %session,
        units = options.units.len(),
        output = %output.directory().display(),
        "Generation started"
    );

    let executor = GenerationExecutor {
        snapshot,
        config,
        engine,
        cache,
        helpers,
        output,
    };
    let report = executor.execute(&options.units).await;
    info!(
        session = %session,
        succeeded = report.succeeded(),
        failed = report.failed(),
        "Generation finished"
    );
    Ok(report)
}

/// Blocking wrapper for synchronous callers such as the CLI. Also records
/// the options descriptor and its templates as packages of the session.
pub fn run_generation_blocking(
    store: Arc<Store>,
    session: SessionId,
    config: &GenerationConfig,
    engine: &dyn TemplateEngine,
) -> Result<GenerationReport, ApiError> {
    if tokio::runtime::Handle::try_current().is_ok() {
        return Err(ApiError::ConfigError(
            "Cannot run blocking generation from within an async runtime; use run_generation"
                .to_string(),
        ));
    }
    if store.get_session(session)?.is_none() {
        return Err(ApiError::SessionNotFound(session));
    }
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| ApiError::ConfigError(format!("Failed to create runtime: {}", e)))?;
    rt.block_on(async {
        let (descriptor, _templates) = register_template_packages(&store, config).await?;
        store.insert_session_package(session, descriptor, false)?;
        let report = run_generation(
            Arc::clone(&store),
            session,
            config,
            engine,
            TemplateCache::global(),
        )
        .await?;
        Ok(report)
    })
}
