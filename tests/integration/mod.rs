//! Integration tests for the profile store, generation and state files

mod cli_routes;
mod config_integration;
mod generation_pipeline;
mod import_export;
mod query_config;
mod query_package;
mod query_session;
mod store_integration;
mod test_utils;
