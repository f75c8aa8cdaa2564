//! Defaults applied beneath every file and environment source.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default(
            "storage.store_path",
            crate::config::default_store_path().display().to_string(),
        )?
        .set_default("generation.template_directory", "templates")?
        .set_default("generation.output_directory", "generated")?
        .set_default("logging.level", "warn")?
        .set_default("logging.format", "text")?
        .set_default("logging.output", "stderr")
}
