//! # Configuration Precedence
//!
//! Merges service configuration from multiple sources.
//!
//! # Precedence Order
//! 1. Environment variable (highest priority)
//! 2. Configuration file
//!
//! Merging is per key: an overriding source replaces individual keys of a
//! service section and leaves the others in place.

use crate::source::ServiceConfig;

/// Merge the file and environment layers.
///
/// # M-CANONICAL-DOCS
///
/// ## Usage
/// ```rust,no_run
/// use worker_config::{load_from_env, load_from_file, merge_configs};
/// use std::path::Path;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let from_file = load_from_file(Path::new("services.yaml"))?;
///     let from_env = load_from_env()?;
///
///     let _config = merge_configs(from_file, "file", from_env, "env");
///     Ok(())
/// }
/// ```
pub fn merge_configs(
    file_config: ServiceConfig,
    file_source_name: &str,
    env_config: Option<ServiceConfig>,
    env_source_name: &str,
) -> ServiceConfig {
    let mut config = merge_with_logging(ServiceConfig::default(), file_config, file_source_name);

    if let Some(env) = env_config {
        config = merge_with_logging(config, env, env_source_name);
    }

    config
}

fn merge_with_logging(
    mut base: ServiceConfig,
    override_config: ServiceConfig,
    source_name: &str,
) -> ServiceConfig {
    let mut changes = Vec::new();

    for (service, section) in override_config.services() {
        for (key, value) in section {
            let previous = base.set(service, key.as_str(), value.clone());
            if previous.as_ref() != Some(value) {
                changes.push(format!("{service}.{key}"));
            }
        }
    }

    if !changes.is_empty() {
        tracing::info!("Configuration from {}: {:?}", source_name, changes);
    }

    base
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ConfigurationSource;
    use serde_json::json;

    #[test]
    fn test_env_overrides_file_per_key() {
        let file = ServiceConfig::new()
            .with_value("VllmWorker", "router", "random")
            .with_value("VllmWorker", "num-patches", 576);
        let env = ServiceConfig::new().with_value("VllmWorker", "router", "kv");

        let merged = merge_configs(file, "file", Some(env), "env");
        assert_eq!(
            merged.as_args("VllmWorker", "").unwrap(),
            vec!["--num-patches", "576", "--router", "kv"]
        );
    }

    #[test]
    fn test_env_adds_new_services() {
        let file = ServiceConfig::new().with_value("VllmWorker", "router", "kv");
        let env = ServiceConfig::new().with_value("PrefillWorker", "enforce-eager", true);

        let merged = merge_configs(file, "file", Some(env), "env");
        assert!(merged.service("VllmWorker").is_some());
        assert_eq!(
            merged.as_args("PrefillWorker", "").unwrap(),
            vec!["--enforce-eager"]
        );
    }

    #[test]
    fn test_no_env_keeps_file() {
        let file = ServiceConfig::new()
            .with_value("Common", "model", "m")
            .with_value("VllmWorker", "common-configs", json!(["model"]));

        let merged = merge_configs(file.clone(), "file", None, "env");
        assert_eq!(merged, file);
    }

    #[test]
    fn test_env_replaces_inherited_key_list() {
        let file = ServiceConfig::new()
            .with_value("Common", "model", "m")
            .with_value("Common", "block-size", 32)
            .with_value("VllmWorker", "common-configs", json!(["model", "block-size"]));
        let env = ServiceConfig::new().with_value("VllmWorker", "common-configs", json!(["model"]));

        let merged = merge_configs(file, "file", Some(env), "env");
        assert_eq!(
            merged.as_args("VllmWorker", "").unwrap(),
            vec!["--model", "m"]
        );
    }

    #[test]
    fn test_empty_layers() {
        let merged = merge_configs(ServiceConfig::default(), "file", None, "env");
        assert!(merged.is_empty());
    }
}
