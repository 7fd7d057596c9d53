use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Commands file structure
///
/// ```toml
/// [[commands]]
/// id = "notes:sync"
/// name = "Sync notes"
/// icon = "refresh"
/// program = "git"
/// args = ["-C", "/home/me/notes", "pull"]
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CommandsFile {
    pub commands: Vec<CommandSection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandSection {
    pub id: String,
    /// Display name, defaults to the id
    pub name: Option<String>,
    #[serde(default)]
    pub icon: String,
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Load the commands file; no file means an empty registry
pub fn load_commands(path: Option<&Path>) -> Result<Vec<CommandSection>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read commands file: {}", path.display()))?;
    let file: CommandsFile = toml::from_str(&content)
        .with_context(|| format!("failed to parse commands file: {}", path.display()))?;

    for (i, command) in file.commands.iter().enumerate() {
        if command.id.is_empty() {
            anyhow::bail!("command #{} in {} has an empty id", i + 1, path.display());
        }
        if file.commands[..i].iter().any(|c| c.id == command.id) {
            anyhow::bail!("duplicate command id in {}: {}", path.display(), command.id);
        }
    }

    Ok(file.commands)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands_file() {
        let file: CommandsFile = toml::from_str(
            r#"
            [[commands]]
            id = "notes:sync"
            name = "Sync notes"
            icon = "refresh"
            program = "git"
            args = ["pull"]

            [[commands]]
            id = "app:beep"
            program = "true"
            "#,
        )
        .unwrap();

        assert_eq!(file.commands.len(), 2);
        assert_eq!(file.commands[0].name.as_deref(), Some("Sync notes"));
        assert_eq!(file.commands[1].name, None);
        assert!(file.commands[1].args.is_empty());
        assert_eq!(file.commands[1].icon, "");
    }

    #[test]
    fn test_no_commands_file() {
        assert!(load_commands(None).unwrap().is_empty());
    }
}
