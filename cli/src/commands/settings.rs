use std::path::Path;

use cmdbridge::Settings;

use crate::cli::SettingsCommand;
use crate::error::CliResult;

pub fn execute(settings_path: &Path, command: SettingsCommand) -> CliResult<()> {
    let mut settings = Settings::load(settings_path)?;

    match command {
        SettingsCommand::Show => {
            println!("settings file: {}", settings_path.display());
            println!("socket_path = {}", settings.socket_path().display());
        }
        SettingsCommand::SetSocket { path } => {
            settings.set_socket_path(path);
            settings.save(settings_path)?;
            tracing::info!(
                path = %settings.socket_path().display(),
                "socket path saved; restart the server to apply"
            );
        }
    }

    Ok(())
}
