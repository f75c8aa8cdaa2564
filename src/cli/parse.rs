//! CLI parse: clap types for zclgen. No behavior; definitions only.

use crate::types::parse_code;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// zclgen - device protocol profile store and code generator
#[derive(Parser)]
#[command(name = "zclgen")]
#[command(about = "Configure device endpoint profiles and generate code from templates")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides layered config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Store directory (overrides storage.store_path)
    #[arg(long)]
    pub store: Option<PathBuf>,

    /// Enable logging (default: off)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (when output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

fn code_arg(s: &str) -> Result<u32, String> {
    parse_code(s)
}

fn u16_code_arg(s: &str) -> Result<u16, String> {
    let code = parse_code(s)?;
    u16::try_from(code).map_err(|_| format!("{} does not fit in 16 bits", s))
}

#[derive(Subcommand)]
pub enum Commands {
    /// Catalog packages
    Package {
        #[command(subcommand)]
        command: PackageCommands,
    },
    /// Sessions (one per window)
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },
    /// Endpoint types of a session
    #[command(name = "endpoint-type")]
    EndpointType {
        #[command(subcommand)]
        command: EndpointTypeCommands,
    },
    /// Endpoints of a session
    Endpoint {
        #[command(subcommand)]
        command: EndpointCommands,
    },
    /// Session key-values
    Kv {
        #[command(subcommand)]
        command: KvCommands,
    },
    /// Run code generation for a session
    Generate {
        #[arg(long)]
        session: u64,
        /// Template directory (overrides generation.template_directory)
        #[arg(long)]
        templates: Option<PathBuf>,
        /// Output directory (overrides generation.output_directory)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Options descriptor (defaults to generation-options.json in the template directory)
        #[arg(long)]
        options: Option<PathBuf>,
    },
    /// Template files
    Templates {
        #[command(subcommand)]
        command: TemplatesCommands,
    },
    /// Session state files
    State {
        #[command(subcommand)]
        command: StateCommands,
    },
    /// Configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum PackageCommands {
    /// Load a JSON catalog file
    Load {
        path: PathBuf,
        /// Attach the package to this session
        #[arg(long)]
        session: Option<u64>,
    },
    /// List loaded packages
    List {
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show option values of a package
    Options {
        package: u64,
        /// Only this category
        #[arg(long)]
        category: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum SessionCommands {
    /// Create a session for a key, or return the existing one
    Open {
        key: String,
        #[arg(long)]
        window: Option<u64>,
        /// Catalog packages to attach
        #[arg(long = "package")]
        packages: Vec<u64>,
    },
    /// Show one session, by id or by window
    Info {
        #[arg(long, conflicts_with = "window", required_unless_present = "window")]
        session: Option<u64>,
        #[arg(long)]
        window: Option<u64>,
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// List sessions
    List {
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Mark a session as saved
    Clean { session: u64 },
    /// Delete a session and everything it owns
    Close {
        session: u64,
        /// Do not ask for confirmation when the session has unsaved changes
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
pub enum EndpointTypeCommands {
    /// Create an endpoint type
    Add {
        #[arg(long)]
        session: u64,
        #[arg(long)]
        name: String,
        /// Device type code, e.g. 0x0100
        #[arg(long, value_parser = code_arg)]
        device_type: Option<u32>,
        /// Do not enable the device type's default clusters
        #[arg(long)]
        empty: bool,
    },
    /// List endpoint types of a session
    List {
        #[arg(long)]
        session: u64,
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Delete an endpoint type and its state
    Remove { id: u64 },
    /// Show cluster state of an endpoint type
    Clusters {
        id: u64,
        #[arg(long, default_value = "text")]
        format: String,
    },
}

#[derive(Subcommand)]
pub enum EndpointCommands {
    /// Create an endpoint
    Add {
        #[arg(long)]
        session: u64,
        /// Endpoint number
        #[arg(long, value_parser = u16_code_arg)]
        id: u16,
        #[arg(long)]
        endpoint_type: u64,
        #[arg(long, default_value = "0", value_parser = u16_code_arg)]
        network: u16,
        /// Profile id (default 0x0104)
        #[arg(long, value_parser = u16_code_arg)]
        profile: Option<u16>,
    },
    /// List endpoints of a session
    List {
        #[arg(long)]
        session: u64,
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Delete an endpoint
    Remove { id: u64 },
}

#[derive(Subcommand)]
pub enum KvCommands {
    Set {
        #[arg(long)]
        session: u64,
        key: String,
        value: String,
    },
    Get {
        #[arg(long)]
        session: u64,
        key: String,
    },
    List {
        #[arg(long)]
        session: u64,
        #[arg(long, default_value = "text")]
        format: String,
    },
}

#[derive(Subcommand)]
pub enum TemplatesCommands {
    /// List template files and the units that use them
    List {
        #[arg(long)]
        templates: Option<PathBuf>,
        #[arg(long)]
        options: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum StateCommands {
    /// Save a session to a state file
    Export {
        #[arg(long)]
        session: u64,
        path: PathBuf,
    },
    /// Open a state file into a new session
    Import {
        path: PathBuf,
        /// Session key for the new session
        #[arg(long)]
        key: String,
        #[arg(long)]
        window: Option<u64>,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write a default config file
    Init {
        /// Write to the global config file instead of the workspace
        #[arg(long)]
        global: bool,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Show the effective configuration
    Show {
        #[arg(long, default_value = "toml")]
        format: String,
    },
}
