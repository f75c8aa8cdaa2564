//! CLI domain: parse, route, help, output and presentation only.
//! No domain logic; a single route table dispatches to the store and the
//! generation pipeline.

mod help;
mod output;
mod parse;
mod presentation;
mod route;

pub use help::command_name;
pub use output::{map_error, CommandOutput};
pub use parse::{
    Cli, Commands, ConfigCommands, EndpointCommands, EndpointTypeCommands, KvCommands,
    PackageCommands, SessionCommands, StateCommands, TemplatesCommands,
};
pub use presentation::{format_generation_report, format_section_heading};
pub use route::RunContext;
