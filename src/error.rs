use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::ipc::IpcError;

/// Result type for cmdbridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur outside of per-message processing
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid settings file {path}: {source}")]
    InvalidSettings {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("failed to serialize settings: {0}")]
    SettingsSerialization(#[from] toml::ser::Error),

    #[error(transparent)]
    Ipc(#[from] IpcError),
}
