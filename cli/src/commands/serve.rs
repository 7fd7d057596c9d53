use std::path::Path;

use anyhow::Context;
use cmdbridge::{Dispatcher, IpcServer, Settings};

use crate::cli::ServeArgs;
use crate::config::load_commands;
use crate::error::CliResult;
use crate::registry::ShellRegistry;

pub fn execute(settings_path: &Path, args: ServeArgs) -> CliResult<()> {
    let settings = Settings::load(settings_path)?;
    let socket_path = args
        .socket
        .unwrap_or_else(|| settings.socket_path().to_path_buf());

    let commands = load_commands(args.commands.as_deref())?;
    let registry = ShellRegistry::new(commands);
    tracing::info!(commands = registry.len(), "loaded command registry");

    let dispatcher = Dispatcher::new(registry);
    let server = IpcServer::bind(&socket_path)
        .with_context(|| format!("failed to bind socket: {}", socket_path.display()))?;

    smol::block_on(server.serve(&dispatcher));
    Ok(())
}
