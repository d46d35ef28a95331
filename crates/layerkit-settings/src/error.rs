//! Error types for the settings crate.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading, writing or validating a settings file.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// The settings file could not be read.
    #[error("Failed to read settings {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    /// The settings file could not be written.
    #[error("Failed to write settings {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },

    /// A setting holds a value its consumer rejects.
    #[error("Invalid setting '{key}': {reason}")]
    InvalidSetting { key: String, reason: String },

    /// The platform reports no per-user configuration directory.
    #[error("No configuration directory on this platform")]
    NoConfigDirectory,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Structural problems with a settings file.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file extension is neither `json` nor `toml`.
    #[error("Unsupported settings format '{0}' (expected json or toml)")]
    UnsupportedFormat(String),

    /// A numeric value is outside its valid range.
    #[error("Value out of range for '{key}': {value}")]
    ValueOutOfRange { key: String, value: String },
}

pub type SettingsResult<T> = Result<T, SettingsError>;
