//! # Environment Variable Loader
//!
//! Builds the process's [`ServiceConfig`] from the environment and an
//! optional file.
//!
//! # Environment Variables
//! - `WORKER_SERVICE_CONFIG`: the whole store as a JSON document
//! - `WORKER_SERVICE_CONFIG_FILE`: path of a TOML/YAML/JSON store, used when
//!   no explicit path is given

use std::env;
use std::path::{Path, PathBuf};

use tracing::debug;
use worker_errors::SourceError;

use crate::file_loader::{ConfigFileError, load_from_file};
use crate::precedence::merge_configs;
use crate::source::ServiceConfig;

/// JSON service configuration.
pub const SERVICE_CONFIG_ENV: &str = "WORKER_SERVICE_CONFIG";

/// Path of a service configuration file.
pub const SERVICE_CONFIG_FILE_ENV: &str = "WORKER_SERVICE_CONFIG_FILE";

/// Load service configuration from `WORKER_SERVICE_CONFIG`.
///
/// Returns `Ok(None)` when the variable is unset or blank.
pub fn load_from_env() -> Result<Option<ServiceConfig>, SourceError> {
    match non_empty_env(SERVICE_CONFIG_ENV) {
        Some(raw) => ServiceConfig::from_json_str(SERVICE_CONFIG_ENV, &raw).map(Some),
        None => Ok(None),
    }
}

/// Build the service configuration the worker reads from.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Loads the file layer (`path`, else `WORKER_SERVICE_CONFIG_FILE`, else
/// nothing) and the environment layer, then merges them with the
/// environment taking precedence.
///
/// ## Usage
/// ```rust,no_run
/// use worker_config::{ConfigurationSource, load_service_config};
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = load_service_config(None)?;
///     println!("{:?}", config.as_args("VllmWorker", "")?);
///     Ok(())
/// }
/// ```
pub fn load_service_config(path: Option<&Path>) -> Result<ServiceConfig, ConfigFileError> {
    let path = path
        .map(Path::to_path_buf)
        .or_else(|| non_empty_env(SERVICE_CONFIG_FILE_ENV).map(PathBuf::from));

    let from_file = match &path {
        Some(path) => {
            debug!(path = %path.display(), "Loading service configuration file");
            load_from_file(path)?
        }
        None => ServiceConfig::default(),
    };
    let from_env = load_from_env()?;

    Ok(merge_configs(from_file, "file", from_env, "env"))
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}
