//! # Configuration Source
//!
//! Where a worker's arguments come from. A [`ConfigurationSource`] turns a
//! service name and key prefix into CLI-style tokens; it does no parsing or
//! validation of its own.
//!
//! [`ServiceConfig`] is the named store used in deployments: one section per
//! service, each a map of argument name to JSON value.
//!
//! ```yaml
//! Common:
//!   model: llava-hf/llava-1.5-7b-hf
//!   block-size: 64
//! VllmWorker:
//!   common-configs: [model, block-size]
//!   remote-prefill: true
//!   router: kv
//! ```
//!
//! `as_args("VllmWorker", "")` yields
//! `--block-size 64 --model llava-hf/llava-1.5-7b-hf --remote-prefill --router kv`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::warn;
use worker_errors::SourceError;

/// Section whose keys services may inherit.
pub const COMMON_SECTION: &str = "Common";

/// Key listing the `Common` keys a service inherits.
pub const COMMON_CONFIGS_KEY: &str = "common-configs";

/// Provider of a service's argument tokens.
pub trait ConfigurationSource {
    fn as_args(&self, service: &str, prefix: &str) -> Result<Vec<String>, SourceError>;
}

/// Source returning the same tokens for every service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticSource {
    tokens: Vec<String>
}

impl StaticSource {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect()
        }
    }
}

impl ConfigurationSource for StaticSource {
    fn as_args(&self, _service: &str, _prefix: &str) -> Result<Vec<String>, SourceError> {
        Ok(self.tokens.clone())
    }
}

/// Arguments of one service, keyed by argument name.
pub type ServiceSection = BTreeMap<String, JsonValue>;

/// Named configuration store, one section per service.
///
/// Built once at startup (see [`crate::loader`]) and only read afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceConfig {
    services: BTreeMap<String, ServiceSection>
}

impl ServiceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert of one argument.
    pub fn with_value(
        mut self,
        service: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<JsonValue>
    ) -> Self {
        self.set(service, key, value);
        self
    }

    pub fn set(
        &mut self,
        service: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<JsonValue>
    ) -> Option<JsonValue> {
        self.services
            .entry(service.into())
            .or_default()
            .insert(key.into(), value.into())
    }

    pub fn service(&self, name: &str) -> Option<&ServiceSection> {
        self.services.get(name)
    }

    pub fn services(&self) -> impl Iterator<Item = (&str, &ServiceSection)> {
        self.services
            .iter()
            .map(|(name, section)| (name.as_str(), section))
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Parse a JSON document; `origin` names it in errors.
    pub fn from_json_str(origin: &str, raw: &str) -> Result<Self, SourceError> {
        serde_json::from_str(raw).map_err(|e| SourceError::InvalidConfig {
            origin: origin.to_string(),
            reason: e.to_string()
        })
    }

    /// The service's own section with its inherited `Common` keys folded in.
    /// The service's own values win.
    fn effective_section(&self, service: &str) -> Result<Option<ServiceSection>, SourceError> {
        let Some(own) = self.services.get(service) else {
            return Ok(None);
        };
        let Some(inherited) = own.get(COMMON_CONFIGS_KEY) else {
            return Ok(Some(own.clone()));
        };

        let malformed = || SourceError::MalformedEntry {
            service: service.to_string(),
            key: COMMON_CONFIGS_KEY.to_string(),
            reason: "expected a list of key names".to_string()
        };
        let keys = inherited.as_array().ok_or_else(malformed)?;
        let common = self.services.get(COMMON_SECTION);

        let mut section = ServiceSection::new();
        for key in keys {
            let key = key.as_str().ok_or_else(malformed)?;
            match common.and_then(|common| common.get(key)) {
                Some(value) => {
                    section.insert(key.to_string(), value.clone());
                }
                None => warn!(service, key, "Inherited key missing from {COMMON_SECTION} section")
            }
        }
        for (key, value) in own {
            if key != COMMON_CONFIGS_KEY {
                section.insert(key.clone(), value.clone());
            }
        }
        Ok(Some(section))
    }
}

impl ConfigurationSource for ServiceConfig {
    /// Render a service's arguments as tokens.
    ///
    /// Unknown services yield no tokens. Keys not starting with `prefix` are
    /// skipped and the prefix is stripped from the rest.
    fn as_args(&self, service: &str, prefix: &str) -> Result<Vec<String>, SourceError> {
        let Some(section) = self.effective_section(service)? else {
            return Ok(Vec::new());
        };

        let mut args = Vec::new();
        for (key, value) in &section {
            match key.strip_prefix(prefix) {
                Some(name) if !name.is_empty() => push_arg(&mut args, name, value),
                _ => {}
            }
        }
        Ok(args)
    }
}

fn push_arg(args: &mut Vec<String>, name: &str, value: &JsonValue) {
    let flag = format!("--{name}");
    match value {
        JsonValue::Bool(true) => args.push(flag),
        JsonValue::Bool(false) | JsonValue::Null => {}
        JsonValue::String(text) => args.extend([flag, text.clone()]),
        JsonValue::Number(number) => args.extend([flag, number.to_string()]),
        JsonValue::Array(_) | JsonValue::Object(_) => args.extend([flag, value.to_string()])
    }
}
