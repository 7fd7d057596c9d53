use std::process::ExitCode;

pub type CliResult<T> = anyhow::Result<T>;

/// Exit status for unreadable settings or commands files (sysexits EX_CONFIG)
const EXIT_CONFIG: u8 = 78;

/// Report a failed run on stderr and pick the process exit status
///
/// Configuration mistakes exit with [`EXIT_CONFIG`] so service managers can
/// tell them apart from runtime failures.
pub fn to_exit_code(result: CliResult<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(error = ?e, "cmdbridge failed");
            eprintln!("error: {e:#}");
            ExitCode::from(exit_status(&e))
        }
    }
}

fn exit_status(error: &anyhow::Error) -> u8 {
    let bad_config = error.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<cmdbridge::Error>(),
            Some(cmdbridge::Error::InvalidSettings { .. })
        ) || cause.is::<toml::de::Error>()
    });

    if bad_config { EXIT_CONFIG } else { 1 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_invalid_commands_file_is_config_error() {
        let err = toml::from_str::<crate::config::CommandsFile>("commands = 3")
            .context("failed to parse commands file: cmds.toml")
            .unwrap_err();

        assert_eq!(exit_status(&err), EXIT_CONFIG);
    }

    #[test]
    fn test_invalid_settings_is_config_error() {
        let path = std::env::temp_dir().join(format!(
            "cmdbridge-cli-settings-{}.toml",
            std::process::id()
        ));
        std::fs::write(&path, "socket_path = [").unwrap();

        let err = anyhow::Error::from(cmdbridge::Settings::load(&path).unwrap_err());
        std::fs::remove_file(&path).unwrap();

        assert_eq!(exit_status(&err), EXIT_CONFIG);
    }

    #[test]
    fn test_runtime_failure_is_generic() {
        let err = anyhow::Error::from(std::io::Error::from(std::io::ErrorKind::AddrInUse))
            .context("failed to bind socket: /tmp/cmdbridge.sock");

        assert_eq!(exit_status(&err), 1);
    }
}
