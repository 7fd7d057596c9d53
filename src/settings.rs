//! Persisted host settings
//!
//! Settings are stored as TOML. Missing files and missing keys fall back to
//! the defaults, so a settings file only needs the values that differ.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// File name of the default socket in the temporary directory
pub const DEFAULT_SOCKET_NAME: &str = "cmdbridge.sock";

/// Default socket location: `<temp dir>/cmdbridge.sock`
pub fn default_socket_path() -> PathBuf {
    std::env::temp_dir().join(DEFAULT_SOCKET_NAME)
}

/// Host settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Path of the Unix socket the server binds to
    socket_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
        }
    }
}

impl Settings {
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn set_socket_path(&mut self, path: impl Into<PathBuf>) {
        self.socket_path = path.into();
    }

    /// Load settings, using defaults if the file does not exist
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no settings file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        toml::from_str(&content).map_err(|source| Error::InvalidSettings {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write settings, creating the parent directory if needed
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, toml::to_string_pretty(self)?)?;
        tracing::debug!(path = %path.display(), "saved settings");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("cmdbridge-settings-{}", rand::random::<u64>()))
            .join(name)
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let settings = Settings::load(temp_path("missing.toml")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.socket_path(), default_socket_path());
    }

    #[test]
    fn test_save_then_load() {
        let path = temp_path("settings.toml");
        let mut settings = Settings::default();
        settings.set_socket_path("/run/user/1000/cmdbridge.sock");

        settings.save(&path).unwrap();
        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded, settings);

        std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let settings: Settings = toml::from_str("").unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_invalid_file_reports_path() {
        let path = temp_path("broken.toml");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "socket_path = [").unwrap();

        let err = Settings::load(&path).unwrap_err();
        assert!(matches!(err, Error::InvalidSettings { .. }));
        assert!(err.to_string().contains("broken.toml"));

        std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
    }
}
