//! CLI route: single route table and run context. Dispatches to store
//! queries, the generation pipeline and presentation.

use crate::cli::help::command_name;
use crate::cli::output::CommandOutput;
use crate::cli::parse::{
    Commands, ConfigCommands, EndpointCommands, EndpointTypeCommands, KvCommands,
    PackageCommands, SessionCommands, StateCommands, TemplatesCommands,
};
use crate::cli::presentation::{
    format_cluster_state, format_endpoint_types, format_endpoints, format_generation_report,
    format_key_values, format_options, format_packages, format_session_info, format_sessions,
    format_template_listing, to_json, TemplateListing,
};
use crate::config::{global_config_path, ConfigLoader, ZclgenConfig};
use crate::error::ApiError;
use crate::generation::{
    run_generation_blocking, GenerationConfig, GenerationOptions, HandlebarsEngine,
};
use crate::importexport::{export_to_file, open_state_file};
use crate::loader::load_catalog;
use crate::query::Seeding;
use crate::store::Store;
use crate::types::{EndpointId, EndpointTypeId, PackageId, SessionId};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use walkdir::WalkDir;

/// Runtime context for CLI execution: workspace, effective configuration
/// and the opened store.
pub struct RunContext {
    store: Arc<Store>,
    config: ZclgenConfig,
    workspace_root: PathBuf,
}

impl RunContext {
    /// Load configuration and open the store. `store_override` wins over
    /// `storage.store_path`.
    pub fn new(
        workspace_root: PathBuf,
        config_path: Option<PathBuf>,
        store_override: Option<PathBuf>,
    ) -> Result<Self, ApiError> {
        let config = match config_path {
            Some(ref path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(&workspace_root)?,
        };
        let store_path = store_override.unwrap_or_else(|| config.storage.store_path.clone());
        let store_path = resolve(&workspace_root, &store_path);
        std::fs::create_dir_all(&store_path).map_err(crate::error::StorageError::IoError)?;
        let store = Store::shared(&store_path)?;
        info!(store = %store_path.display(), "Store opened");
        Ok(Self {
            store,
            config,
            workspace_root,
        })
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Execute a CLI command via the single route table.
    pub fn execute(&self, command: &Commands) -> Result<CommandOutput, ApiError> {
        let name = command_name(command);
        let started = Instant::now();
        let result = self.execute_inner(command);
        match &result {
            Ok(out) => info!(
                command = %name,
                success = out.success,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Command finished"
            ),
            Err(e) => warn!(command = %name, error = %e, "Command failed"),
        }
        result
    }

    fn execute_inner(&self, command: &Commands) -> Result<CommandOutput, ApiError> {
        match command {
            Commands::Package { command } => self.handle_package(command).map(CommandOutput::ok),
            Commands::Session { command } => self.handle_session(command).map(CommandOutput::ok),
            Commands::EndpointType { command } => {
                self.handle_endpoint_type(command).map(CommandOutput::ok)
            }
            Commands::Endpoint { command } => self.handle_endpoint(command).map(CommandOutput::ok),
            Commands::Kv { command } => self.handle_kv(command).map(CommandOutput::ok),
            Commands::Generate {
                session,
                templates,
                output,
                options,
            } => self.handle_generate(
                SessionId(*session),
                templates.as_deref(),
                output.as_deref(),
                options.as_deref(),
            ),
            Commands::Templates { command } => match command {
                TemplatesCommands::List { templates, options } => self
                    .handle_templates_list(templates.as_deref(), options.as_deref())
                    .map(CommandOutput::ok),
            },
            Commands::State { command } => self.handle_state(command).map(CommandOutput::ok),
            Commands::Config { command } => self.handle_config(command).map(CommandOutput::ok),
        }
    }

    fn handle_package(&self, command: &PackageCommands) -> Result<String, ApiError> {
        match command {
            PackageCommands::Load { path, session } => {
                let package = load_catalog(&self.store, &resolve(&self.workspace_root, path))?;
                if let Some(session) = session {
                    self.require_session(SessionId(*session))?;
                    self.store
                        .insert_session_package(SessionId(*session), package, true)?;
                }
                Ok(format!("Loaded package {}", package))
            }
            PackageCommands::List { format } => {
                format_packages(&self.store.get_all_packages()?, format)
            }
            PackageCommands::Options { package, category } => {
                let package = PackageId(*package);
                let categories = match category {
                    Some(c) => vec![c.clone()],
                    None => self.store.select_option_categories(package)?,
                };
                let mut options = Vec::with_capacity(categories.len());
                for category in categories {
                    let values = self.store.select_all_options(package, &category)?;
                    options.push((category, values));
                }
                Ok(format_options(package, &options))
            }
        }
    }

    fn handle_session(&self, command: &SessionCommands) -> Result<String, ApiError> {
        match command {
            SessionCommands::Open {
                key,
                window,
                packages,
            } => {
                let session = self.store.ensure_session(key, *window)?;
                for package in packages {
                    self.store
                        .insert_session_package(session, PackageId(*package), true)?;
                }
                Ok(format!("Session {}", session))
            }
            SessionCommands::Info {
                session,
                window,
                format,
            } => {
                let record = match (session, window) {
                    (Some(id), _) => self.require_session(SessionId(*id))?,
                    (None, Some(window)) => {
                        let info = self.store.session_info_from_window(*window)?.ok_or_else(|| {
                            ApiError::ConfigError(format!("No session for window {}", window))
                        })?;
                        self.require_session(info.session_id)?
                    }
                    (None, None) => {
                        return Err(ApiError::ConfigError(
                            "Either --session or --window is required".to_string(),
                        ))
                    }
                };
                let packages = self.store.get_session_packages(record.id)?;
                format_session_info(&record, &packages, format)
            }
            SessionCommands::List { format } => {
                format_sessions(&self.store.list_sessions()?, format)
            }
            SessionCommands::Clean { session } => {
                let session = SessionId(*session);
                if self.store.set_session_clean(session)? == 0 {
                    return Err(ApiError::SessionNotFound(session));
                }
                Ok(format!("Session {} marked saved", session))
            }
            SessionCommands::Close { session, force } => {
                let session = SessionId(*session);
                let record = self.require_session(session)?;
                if record.dirty && !force {
                    use dialoguer::Confirm;
                    let confirmed = Confirm::new()
                        .with_prompt(format!(
                            "Session {} has unsaved changes. Close it anyway?",
                            session
                        ))
                        .default(false)
                        .interact()
                        .map_err(|e| {
                            ApiError::ConfigError(format!("Failed to get user input: {}", e))
                        })?;
                    if !confirmed {
                        return Ok("Close cancelled".to_string());
                    }
                }
                self.store.delete_session(session)?;
                Ok(format!("Session {} closed", session))
            }
        }
    }

    fn handle_endpoint_type(&self, command: &EndpointTypeCommands) -> Result<String, ApiError> {
        match command {
            EndpointTypeCommands::Add {
                session,
                name,
                device_type,
                empty,
            } => {
                let session = SessionId(*session);
                self.require_session(session)?;
                let device = match device_type {
                    Some(code) => {
                        let mut found = None;
                        for package in self.store.catalog_packages(session)? {
                            if let Some(d) = self.store.select_device_type_by_code(package, *code)? {
                                found = Some(d.id);
                                break;
                            }
                        }
                        Some(found.ok_or_else(|| {
                            ApiError::ConfigError(format!(
                                "No device type with code {}",
                                crate::types::hex_code(*code)
                            ))
                        })?)
                    }
                    None => None,
                };
                let seeding = if *empty {
                    Seeding::Empty
                } else {
                    Seeding::FromDeviceType
                };
                let id = self
                    .store
                    .insert_endpoint_type(session, name, device, seeding)?;
                let summary = self.store.endpoint_type_summary(id)?;
                Ok(format!(
                    "Endpoint type {} created ({} clusters, {} attributes enabled)",
                    id, summary.enabled_clusters, summary.enabled_attributes
                ))
            }
            EndpointTypeCommands::List { session, format } => {
                let mut rows = Vec::new();
                for et in self.store.get_all_endpoint_types(SessionId(*session))? {
                    let summary = self.store.endpoint_type_summary(et.id)?;
                    rows.push((et, summary));
                }
                format_endpoint_types(&rows, format)
            }
            EndpointTypeCommands::Remove { id } => {
                let removed = self.store.delete_endpoint_type(EndpointTypeId(*id))?;
                Ok(format!("Removed {} endpoint type(s)", removed))
            }
            EndpointTypeCommands::Clusters { id, format } => {
                let rows = self
                    .store
                    .get_all_endpoint_type_cluster_state(EndpointTypeId(*id))?;
                format_cluster_state(&rows, format)
            }
        }
    }

    fn handle_endpoint(&self, command: &EndpointCommands) -> Result<String, ApiError> {
        match command {
            EndpointCommands::Add {
                session,
                id,
                endpoint_type,
                network,
                profile,
            } => {
                let endpoint = self.store.insert_endpoint(
                    SessionId(*session),
                    *id,
                    EndpointTypeId(*endpoint_type),
                    *network,
                    *profile,
                )?;
                Ok(format!("Endpoint {} created", endpoint))
            }
            EndpointCommands::List { session, format } => {
                format_endpoints(&self.store.get_all_endpoints(SessionId(*session))?, format)
            }
            EndpointCommands::Remove { id } => {
                let removed = self.store.delete_endpoint(EndpointId(*id))?;
                Ok(format!("Removed {} endpoint(s)", removed))
            }
        }
    }

    fn handle_kv(&self, command: &KvCommands) -> Result<String, ApiError> {
        match command {
            KvCommands::Set {
                session,
                key,
                value,
            } => {
                self.store.update_key_value(SessionId(*session), key, value)?;
                Ok(format!("{} = {}", key, value))
            }
            KvCommands::Get { session, key } => Ok(self
                .store
                .get_session_key_value(SessionId(*session), key)?
                .unwrap_or_default()),
            KvCommands::List { session, format } => format_key_values(
                &self.store.get_all_session_key_values(SessionId(*session))?,
                format,
            ),
        }
    }

    fn generation_config(
        &self,
        templates: Option<&Path>,
        output: Option<&Path>,
        options: Option<&Path>,
    ) -> GenerationConfig {
        let settings = &self.config.generation;
        let template_directory = resolve(
            &self.workspace_root,
            templates.unwrap_or(&settings.template_directory),
        );
        let output_directory = resolve(
            &self.workspace_root,
            output.unwrap_or(&settings.output_directory),
        );
        let config = GenerationConfig::new(template_directory, output_directory);
        match options.or(settings.options_file.as_deref()) {
            Some(file) => config.with_options_file(resolve(&self.workspace_root, file)),
            None => config,
        }
    }

    fn handle_generate(
        &self,
        session: SessionId,
        templates: Option<&Path>,
        output: Option<&Path>,
        options: Option<&Path>,
    ) -> Result<CommandOutput, ApiError> {
        let config = self.generation_config(templates, output, options);
        let report =
            run_generation_blocking(Arc::clone(&self.store), session, &config, &HandlebarsEngine)?;
        let text = format_generation_report(&report);
        if report.has_failures() {
            Ok(CommandOutput::failed(text))
        } else {
            Ok(CommandOutput::ok(text))
        }
    }

    fn handle_templates_list(
        &self,
        templates: Option<&Path>,
        options: Option<&Path>,
    ) -> Result<String, ApiError> {
        let config = self.generation_config(templates, None, options);
        let text = std::fs::read_to_string(&config.options_file).map_err(|e| {
            ApiError::ConfigError(format!(
                "Cannot read {}: {}",
                config.options_file.display(),
                e
            ))
        })?;
        let descriptor = GenerationOptions::from_json(&text)?;

        let mut rows: Vec<TemplateListing> = Vec::new();
        for entry in WalkDir::new(&config.template_directory)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
        {
            let path = entry.path();
            if path == config.options_file {
                continue;
            }
            let relative = path
                .strip_prefix(&config.template_directory)
                .unwrap_or(path)
                .to_path_buf();
            let units = descriptor
                .units
                .iter()
                .filter(|unit| {
                    let dir = config.unit_template_directory(unit);
                    unit.templates.iter().any(|t| dir.join(&t.template_file) == path)
                })
                .map(|unit| unit.filename.clone())
                .collect();
            rows.push(TemplateListing {
                path: relative,
                units,
            });
        }
        Ok(format_template_listing(&config.template_directory, &rows))
    }

    fn handle_state(&self, command: &StateCommands) -> Result<String, ApiError> {
        match command {
            StateCommands::Export { session, path } => {
                let path = resolve(&self.workspace_root, path);
                let state = export_to_file(&self.store, SessionId(*session), &path)?;
                Ok(format!(
                    "Saved session {} to {} ({} endpoint types, {} endpoints)",
                    session,
                    path.display(),
                    state.endpoint_types.len(),
                    state.endpoints.len()
                ))
            }
            StateCommands::Import { path, key, window } => {
                let path = resolve(&self.workspace_root, path);
                let (session, report) = open_state_file(&self.store, &path, key, *window)?;
                let mut out = format!(
                    "Opened {} as session {} ({} endpoint types, {} endpoints)",
                    path.display(),
                    session,
                    report.endpoint_types.len(),
                    report.endpoints
                );
                if report.skipped > 0 {
                    out.push_str(&format!(
                        "\n{} entries could not be resolved and were skipped",
                        report.skipped
                    ));
                }
                Ok(out)
            }
        }
    }

    fn handle_config(&self, command: &ConfigCommands) -> Result<String, ApiError> {
        match command {
            ConfigCommands::Init { global, force } => {
                let path = if *global {
                    global_config_path().ok_or_else(|| {
                        ApiError::ConfigError("No global config directory on this platform".to_string())
                    })?
                } else {
                    self.workspace_root.join("config").join("config.toml")
                };
                if path.exists() && !force {
                    return Err(ApiError::ConfigError(format!(
                        "{} already exists (use --force to overwrite)",
                        path.display()
                    )));
                }
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        ApiError::ConfigError(format!("Cannot create {}: {}", parent.display(), e))
                    })?;
                }
                std::fs::write(&path, ZclgenConfig::default_toml()?).map_err(|e| {
                    ApiError::ConfigError(format!("Cannot write {}: {}", path.display(), e))
                })?;
                Ok(format!("Wrote {}", path.display()))
            }
            ConfigCommands::Show { format } => {
                if format == "json" {
                    to_json(&self.config)
                } else {
                    toml::to_string_pretty(&self.config)
                        .map_err(|e| ApiError::ConfigError(format!("Cannot encode config: {}", e)))
                }
            }
        }
    }

    fn require_session(
        &self,
        session: SessionId,
    ) -> Result<crate::store::schema::SessionRecord, ApiError> {
        self.store
            .get_session(session)?
            .ok_or(ApiError::SessionNotFound(session))
    }
}

fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}
