//! gr-config: rig configuration schema, defaults and validation.
//!
//! Everything that varies from one rig to another (port addresses, valve
//! bank size, MFC node numbers, calibration tables, controller registers,
//! timing constants) lives in [`RigConfig`] and is injected at construction.

pub mod defaults;
pub mod schema;
pub mod validate;

pub use schema::*;
pub use validate::validate_config;

use std::path::{Path, PathBuf};

use tracing::info;

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration problems. All of them are fatal at startup.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("No address configured for the {device} link")]
    MissingAddress { device: &'static str },

    #[error("Address {address} is claimed by both the {first} and {second} links")]
    AmbiguousAddress {
        address: String,
        first: &'static str,
        second: &'static str,
    },

    #[error("Invalid value: {field} ({reason})")]
    InvalidValue { field: String, reason: String },

    #[error("Failed to read config file: {path}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write config file: {path}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ConfigError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

pub fn from_yaml_str(content: &str) -> ConfigResult<RigConfig> {
    let config: RigConfig = serde_yaml::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

pub fn to_yaml_string(config: &RigConfig) -> ConfigResult<String> {
    validate_config(config)?;
    Ok(serde_yaml::to_string(config)?)
}

pub fn load_yaml(path: &Path) -> ConfigResult<RigConfig> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let config = from_yaml_str(&content)?;
    info!(path = %path.display(), gases = config.gases.len(), "loaded rig config");
    Ok(config)
}

pub fn save_yaml(path: &Path, config: &RigConfig) -> ConfigResult<()> {
    let content = to_yaml_string(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::FileWrite {
        path: path.to_path_buf(),
        source,
    })
}
