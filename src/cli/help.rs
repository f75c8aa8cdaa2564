//! Command names used in log events (e.g. "session.open", "generate").

use crate::cli::parse::{
    Commands, ConfigCommands, EndpointCommands, EndpointTypeCommands, KvCommands,
    PackageCommands, SessionCommands, StateCommands, TemplatesCommands,
};

pub fn command_name(command: &Commands) -> String {
    match command {
        Commands::Package { command } => format!("package.{}", package_command_name(command)),
        Commands::Session { command } => format!("session.{}", session_command_name(command)),
        Commands::EndpointType { command } => {
            format!("endpoint-type.{}", endpoint_type_command_name(command))
        }
        Commands::Endpoint { command } => format!("endpoint.{}", endpoint_command_name(command)),
        Commands::Kv { command } => format!("kv.{}", kv_command_name(command)),
        Commands::Generate { .. } => "generate".to_string(),
        Commands::Templates { command } => match command {
            TemplatesCommands::List { .. } => "templates.list".to_string(),
        },
        Commands::State { command } => format!("state.{}", state_command_name(command)),
        Commands::Config { command } => format!("config.{}", config_command_name(command)),
    }
}

fn package_command_name(command: &PackageCommands) -> &'static str {
    match command {
        PackageCommands::Load { .. } => "load",
        PackageCommands::List { .. } => "list",
        PackageCommands::Options { .. } => "options",
    }
}

fn session_command_name(command: &SessionCommands) -> &'static str {
    match command {
        SessionCommands::Open { .. } => "open",
        SessionCommands::Info { .. } => "info",
        SessionCommands::List { .. } => "list",
        SessionCommands::Clean { .. } => "clean",
        SessionCommands::Close { .. } => "close",
    }
}

fn endpoint_type_command_name(command: &EndpointTypeCommands) -> &'static str {
    match command {
        EndpointTypeCommands::Add { .. } => "add",
        EndpointTypeCommands::List { .. } => "list",
        EndpointTypeCommands::Remove { .. } => "remove",
        EndpointTypeCommands::Clusters { .. } => "clusters",
    }
}

fn endpoint_command_name(command: &EndpointCommands) -> &'static str {
    match command {
        EndpointCommands::Add { .. } => "add",
        EndpointCommands::List { .. } => "list",
        EndpointCommands::Remove { .. } => "remove",
    }
}

fn kv_command_name(command: &KvCommands) -> &'static str {
    match command {
        KvCommands::Set { .. } => "set",
        KvCommands::Get { .. } => "get",
        KvCommands::List { .. } => "list",
    }
}

fn state_command_name(command: &StateCommands) -> &'static str {
    match command {
        StateCommands::Export { .. } => "export",
        StateCommands::Import { .. } => "import",
    }
}

fn config_command_name(command: &ConfigCommands) -> &'static str {
    match command {
        ConfigCommands::Init { .. } => "init",
        ConfigCommands::Show { .. } => "show",
    }
}
