use std::process::{Command, Stdio};

use cmdbridge::{CommandEntry, CommandRegistry};

use crate::config::CommandSection;

/// Registry whose commands run external programs
///
/// Running a command waits for the program to exit; it succeeds when the
/// program exits with status 0.
pub struct ShellRegistry {
    commands: Vec<CommandSection>,
}

impl ShellRegistry {
    pub fn new(commands: Vec<CommandSection>) -> Self {
        Self { commands }
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }
}

impl CommandRegistry for ShellRegistry {
    fn list_commands(&self) -> Vec<CommandEntry> {
        self.commands
            .iter()
            .map(|c| {
                CommandEntry::new(
                    c.id.clone(),
                    c.name.clone().unwrap_or_else(|| c.id.clone()),
                    c.icon.clone(),
                )
            })
            .collect()
    }

    fn execute_command_by_id(&self, id: &str) -> bool {
        let Some(command) = self.commands.iter().find(|c| c.id == id) else {
            return false;
        };

        tracing::info!(id, program = %command.program, "running command");
        let status = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .status();

        match status {
            Ok(status) if status.success() => true,
            Ok(status) => {
                tracing::warn!(id, code = ?status.code(), "command exited unsuccessfully");
                false
            }
            Err(e) => {
                tracing::warn!(id, error = %e, "failed to start command");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(id: &str, program: &str) -> CommandSection {
        CommandSection {
            id: id.to_string(),
            name: None,
            icon: "terminal".to_string(),
            program: program.to_string(),
            args: Vec::new(),
        }
    }

    #[test]
    fn test_name_defaults_to_id() {
        let registry = ShellRegistry::new(vec![section("app:beep", "true")]);
        assert_eq!(
            registry.list_commands(),
            vec![CommandEntry::new("app:beep", "app:beep", "terminal")]
        );
    }

    #[test]
    fn test_unknown_and_unstartable_commands_fail() {
        let registry = ShellRegistry::new(vec![section(
            "app:missing",
            "/nonexistent/cmdbridge-test-program",
        )]);
        assert!(!registry.execute_command_by_id("app:other"));
        assert!(!registry.execute_command_by_id("app:missing"));
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_status_decides_success() {
        let registry = ShellRegistry::new(vec![section("ok", "true"), section("fail", "false")]);
        assert!(registry.execute_command_by_id("ok"));
        assert!(!registry.execute_command_by_id("fail"));
    }
}
