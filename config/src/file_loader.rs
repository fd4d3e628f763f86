//! # Service Configuration File Loading
//!
//! Loads a [`ServiceConfig`] from a TOML, YAML or JSON file. The format is
//! picked from the file extension.

use std::path::Path;

use worker_errors::SourceError;

use crate::source::ServiceConfig;

/// Configuration file loading error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlParse(String),

    #[error("Failed to parse YAML: {0}")]
    YamlParse(String),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(String),

    #[error("Config file has no extension")]
    NoExtension,

    #[error("Unsupported config file format: {0}")]
    UnsupportedFormat(String),

    #[error(transparent)]
    Env(#[from] SourceError),
}

fn read(path: &Path) -> Result<String, ConfigFileError> {
    std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ConfigFileError::FileNotFound(path.display().to_string()),
        _ => ConfigFileError::Io(e),
    })
}

/// Load service configuration from a TOML file.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Each top-level table is a service section.
///
/// ## Usage
/// ```rust,no_run
/// use worker_config::{ConfigurationSource, load_from_toml};
/// use std::path::Path;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = load_from_toml(Path::new("services.toml"))?;
///     println!("{:?}", config.as_args("VllmWorker", "")?);
///     Ok(())
/// }
/// ```
pub fn load_from_toml(path: &Path) -> Result<ServiceConfig, ConfigFileError> {
    let contents = read(path)?;
    toml::from_str(&contents).map_err(|e| ConfigFileError::TomlParse(e.to_string()))
}

/// Load service configuration from a YAML file.
pub fn load_from_yaml(path: &Path) -> Result<ServiceConfig, ConfigFileError> {
    let contents = read(path)?;
    serde_yaml::from_str(&contents).map_err(|e| ConfigFileError::YamlParse(e.to_string()))
}

/// Load service configuration from a JSON file.
pub fn load_from_json(path: &Path) -> Result<ServiceConfig, ConfigFileError> {
    let contents = read(path)?;
    serde_json::from_str(&contents).map_err(|e| ConfigFileError::JsonParse(e.to_string()))
}

/// Load service configuration with format auto-detection.
///
/// ## Supported Formats
/// - `.toml`
/// - `.yaml` / `.yml`
/// - `.json`
pub fn load_from_file(path: &Path) -> Result<ServiceConfig, ConfigFileError> {
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .ok_or(ConfigFileError::NoExtension)?;

    match extension.to_lowercase().as_str() {
        "toml" => load_from_toml(path),
        "yaml" | "yml" => load_from_yaml(path),
        "json" => load_from_json(path),
        other => Err(ConfigFileError::UnsupportedFormat(other.to_string())),
    }
}
