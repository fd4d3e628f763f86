//! # Argument Resolver
//!
//! Turns one token sequence into one [`ResolvedConfiguration`], or fails with
//! every problem found.
//!
//! ## Token routing
//! Tokens are scanned left to right. `--name_with_underscores` is treated as
//! `--name-with-underscores` and `--name=value` is split.
//! - extension flags are parsed here, against the [`ExtensionSchema`]
//! - base engine flags are forwarded, with their value, to the engine
//! - anything else is an unrecognized argument, together with its value
//!
//! ## Precedence
//! An explicit token always beats a parameter's default; when a flag is
//! repeated the last occurrence wins.
//!
//! ## Failure
//! Extension problems are collected into one [`ArgumentErrors`]. The engine
//! is only asked to build once the extension layer is clean, and its error is
//! returned as-is. Nothing partial is ever returned.

use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use tracing::{debug, info};
use worker_errors::{ArgumentError, ArgumentErrors, ResolveError, SchemaError};

use crate::engine::BaseEngine;
use crate::schema::{ExtensionSchema, ParameterSpec, Value, ValueKind};
use crate::source::ConfigurationSource;

/// Resolved values of every extension parameter, in schema order.
///
/// A parameter that is neither set nor defaulted (optional, no default)
/// resolves to `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionValues(Vec<(&'static str, Option<Value>)>);

impl ExtensionValues {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0
            .iter()
            .find(|(field, _)| *field == name)
            .and_then(|(_, value)| value.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|(field, _)| *field == name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.iter().map(|(name, _)| *name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, Option<&Value>)> + '_ {
        self.0.iter().map(|(name, value)| (*name, value.as_ref()))
    }

    pub fn require_str(&self, name: &str) -> Result<&str, SchemaError> {
        self.require(name, ValueKind::String, Value::as_str)
    }

    pub fn require_int(&self, name: &str) -> Result<i64, SchemaError> {
        self.require(name, ValueKind::Int, Value::as_int)
    }

    pub fn require_float(&self, name: &str) -> Result<f64, SchemaError> {
        self.require(name, ValueKind::Float, Value::as_float)
    }

    pub fn require_bool(&self, name: &str) -> Result<bool, SchemaError> {
        self.require(name, ValueKind::Bool, Value::as_bool)
    }

    fn require<'a, T>(
        &'a self,
        name: &str,
        kind: ValueKind,
        extract: impl FnOnce(&'a Value) -> Option<T>
    ) -> Result<T, SchemaError> {
        let value = self.get(name);
        value
            .and_then(extract)
            .ok_or_else(|| SchemaError::FieldShape {
                name: name.to_string(),
                expected: kind.to_string(),
                found: value.map_or_else(|| "nothing".to_string(), |v| v.kind().to_string())
            })
    }
}

impl Serialize for ExtensionValues {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// The base engine's configuration with the extension values beside it.
///
/// Extension names never collide with base names, so both parts can be
/// addressed by name without ambiguity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedConfiguration<B> {
    base: B,
    extensions: ExtensionValues
}

impl<B> ResolvedConfiguration<B> {
    pub fn base(&self) -> &B {
        &self.base
    }

    pub fn extensions(&self) -> &ExtensionValues {
        &self.extensions
    }

    pub fn extension(&self, name: &str) -> Option<&Value> {
        self.extensions.get(name)
    }

    pub fn into_parts(self) -> (B, ExtensionValues) {
        (self.base, self.extensions)
    }
}

/// How an extension parameter appeared in the tokens.
#[derive(Debug)]
enum Literal {
    /// Bare boolean flag.
    Flag,
    Text(String)
}

#[derive(Debug, Default)]
struct Partition {
    /// Last valid value of each extension flag seen.
    explicit: BTreeMap<&'static str, Value>,
    base_tokens: Vec<String>,
    errors: ArgumentErrors
}

/// Resolves worker arguments against an extension schema and a base engine.
///
/// Construction checks that no extension name collides with an engine flag.
/// After that the resolver is read-only; `resolve` can be called any number
/// of times, from any number of threads when `B` is `Sync`.
#[derive(Debug)]
pub struct ArgumentResolver<B> {
    schema: ExtensionSchema,
    engine: B,
    /// Engine flag name to whether it takes a value.
    engine_flags: BTreeMap<String, bool>
}

impl<B: BaseEngine> ArgumentResolver<B> {
    pub fn new(schema: ExtensionSchema, engine: B) -> Result<Self, SchemaError> {
        let engine_flags: BTreeMap<String, bool> = engine
            .flags()
            .into_iter()
            .map(|flag| (flag.name, flag.takes_value))
            .collect();
        schema.ensure_disjoint(engine_flags.keys().map(String::as_str))?;

        Ok(Self {
            schema,
            engine,
            engine_flags
        })
    }

    pub fn schema(&self) -> &ExtensionSchema {
        &self.schema
    }

    pub fn engine(&self) -> &B {
        &self.engine
    }

    /// Resolve one token sequence.
    pub fn resolve(
        &self,
        tokens: &[String]
    ) -> Result<ResolvedConfiguration<B::Config>, ResolveError<B::Error>> {
        let Partition {
            explicit,
            base_tokens,
            mut errors
        } = self.partition(tokens);
        debug!(
            total = tokens.len(),
            extension = explicit.len(),
            base = base_tokens.len(),
            "Partitioned worker arguments"
        );

        let extensions = self.apply_extensions(&explicit, &mut errors);
        errors.into_result()?;

        let base = self.engine.build(&base_tokens).map_err(ResolveError::Engine)?;
        Ok(ResolvedConfiguration { base, extensions })
    }

    /// Query `source` for a service's tokens, then resolve them.
    pub fn resolve_from<S>(
        &self,
        source: &S,
        service: &str,
        prefix: &str
    ) -> Result<ResolvedConfiguration<B::Config>, ResolveError<B::Error>>
    where
        S: ConfigurationSource + ?Sized
    {
        let tokens = source.as_args(service, prefix)?;
        debug!(service, prefix, ?tokens, "Loaded service arguments");
        let resolved = self.resolve(&tokens)?;
        info!(service, "Resolved worker configuration");
        Ok(resolved)
    }

    fn partition(&self, tokens: &[String]) -> Partition {
        let mut partition = Partition::default();
        let mut tokens = tokens.iter().peekable();

        while let Some(token) = tokens.next() {
            let Some(body) = token.strip_prefix("--").filter(|body| !body.is_empty()) else {
                partition.errors.push(ArgumentError::UnknownArgument {
                    token: token.clone()
                });
                continue;
            };
            let (raw_name, inline) = match body.split_once('=') {
                Some((name, value)) => (name, Some(value)),
                None => (body, None)
            };
            let name = raw_name.replace('_', "-");

            if let Some(spec) = self.schema.get(&name) {
                let literal = match inline {
                    Some(value) => Literal::Text(value.to_string()),
                    None if spec.is_flag() => Literal::Flag,
                    None => match tokens.next_if(|next| !next.starts_with("--")) {
                        Some(value) => Literal::Text(value.clone()),
                        None => {
                            partition.errors.push(ArgumentError::MissingValue {
                                name: spec.name.to_string()
                            });
                            continue;
                        }
                    }
                };
                // Every occurrence is checked, even one a later occurrence overrides.
                match parse(spec, &literal).and_then(|value| spec.check(&value).map(|()| value)) {
                    Ok(value) => {
                        partition.explicit.insert(spec.name, value);
                    }
                    Err(error) => partition.errors.push(error)
                }
            } else if let Some(&takes_value) = self.engine_flags.get(&name) {
                match inline {
                    Some(value) => partition.base_tokens.push(format!("--{name}={value}")),
                    None => {
                        partition.base_tokens.push(format!("--{name}"));
                        if takes_value {
                            if let Some(value) = tokens.next_if(|next| !next.starts_with("--")) {
                                partition.base_tokens.push(value.clone());
                            }
                        }
                    }
                }
            } else {
                // The value of an unrecognized flag is not reported separately.
                if inline.is_none() {
                    tokens.next_if(|next| !next.starts_with("--"));
                }
                partition.errors.push(ArgumentError::UnknownArgument {
                    token: format!("--{raw_name}")
                });
            }
        }

        partition
    }

    fn apply_extensions(
        &self,
        explicit: &BTreeMap<&'static str, Value>,
        errors: &mut ArgumentErrors
    ) -> ExtensionValues {
        let mut values = Vec::with_capacity(self.schema.len());

        for spec in self.schema.all() {
            let value = explicit.get(spec.name).or(spec.default.as_ref()).cloned();
            if value.is_none() && spec.required {
                errors.push(ArgumentError::MissingRequiredArgument {
                    name: spec.name.to_string()
                });
            }
            values.push((spec.name, value));
        }

        ExtensionValues(values)
    }
}

fn parse(spec: &ParameterSpec, literal: &Literal) -> Result<Value, ArgumentError> {
    match literal {
        Literal::Flag => Ok(Value::Bool(true)),
        Literal::Text(text) => spec.parse_literal(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{BaseFlag, EngineError, ReferenceEngine};
    use crate::schema::{Constraint, ParameterSpec};
    use crate::source::StaticSource;

    fn tokens(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    fn schema() -> ExtensionSchema {
        ExtensionSchema::from_specs([
            ParameterSpec::string("router", "random")
                .with_constraint(Constraint::OneOf(&["random", "round-robin", "kv"])),
            ParameterSpec::flag("remote-prefill"),
            ParameterSpec::int("num-patches", 576).with_constraint(Constraint::Positive),
            ParameterSpec::float("prefill-ratio", 0.5),
            ParameterSpec::new("served-name", ValueKind::String),
        ])
        .unwrap()
    }

    fn resolver() -> ArgumentResolver<ReferenceEngine> {
        ArgumentResolver::new(schema(), ReferenceEngine::default()).unwrap()
    }

    /// Engine that records nothing and accepts anything it declares.
    struct EchoEngine;

    impl BaseEngine for EchoEngine {
        type Config = Vec<String>;
        type Error = std::io::Error;

        fn flags(&self) -> Vec<BaseFlag> {
            vec![
                BaseFlag {
                    name: "model".to_string(),
                    takes_value: true
                },
                BaseFlag {
                    name: "enforce-eager".to_string(),
                    takes_value: false
                },
            ]
        }

        fn build(&self, tokens: &[String]) -> Result<Vec<String>, std::io::Error> {
            if tokens.iter().any(|t| t == "reject") {
                return Err(std::io::Error::other("engine rejected model"));
            }
            Ok(tokens.to_vec())
        }
    }

    #[test]
    fn test_defaults_when_absent() {
        let resolved = resolver().resolve(&[]).unwrap();
        assert_eq!(resolved.extension("router"), Some(&Value::from("random")));
        assert_eq!(
            resolved.extension("remote-prefill"),
            Some(&Value::Bool(false))
        );
        assert_eq!(resolved.extension("num-patches"), Some(&Value::Int(576)));
        assert_eq!(resolved.extension("served-name"), None);
        assert!(resolved.extensions().contains("served-name"));
        assert_eq!(resolved.extensions().len(), 5);
    }

    #[test]
    fn test_explicit_tokens_override_defaults() {
        let resolved = resolver()
            .resolve(&tokens(&[
                "--router",
                "kv",
                "--num-patches=128",
                "--remote-prefill",
                "--prefill-ratio",
                "0.75",
            ]))
            .unwrap();
        assert_eq!(resolved.extension("router"), Some(&Value::from("kv")));
        assert_eq!(resolved.extension("num-patches"), Some(&Value::Int(128)));
        assert_eq!(resolved.extension("remote-prefill"), Some(&Value::Bool(true)));
        assert_eq!(resolved.extension("prefill-ratio"), Some(&Value::Float(0.75)));
    }

    #[test]
    fn test_underscore_names_are_normalized() {
        let resolved = resolver()
            .resolve(&tokens(&["--num_patches", "64", "--max_model_len", "4096"]))
            .unwrap();
        assert_eq!(resolved.extension("num-patches"), Some(&Value::Int(64)));
        assert_eq!(resolved.base().max_model_len, Some(4096));
    }

    #[test]
    fn test_last_occurrence_wins() {
        let resolved = resolver()
            .resolve(&tokens(&["--router", "kv", "--router", "round-robin"]))
            .unwrap();
        assert_eq!(
            resolved.extension("router"),
            Some(&Value::from("round-robin"))
        );
    }

    #[test]
    fn test_repeated_base_flags_last_wins() {
        let resolved = resolver()
            .resolve(&tokens(&["--model", "a", "--model", "b"]))
            .unwrap();
        assert_eq!(resolved.base().model, "b");

        let store = crate::source::ServiceConfig::new()
            .with_value("Worker", "max_model_len", 2048)
            .with_value("Worker", "max-model-len", 4096);
        let resolved = resolver().resolve_from(&store, "Worker", "").unwrap();
        assert_eq!(resolved.base().max_model_len, Some(2048));
    }

    #[test]
    fn test_overridden_invalid_literal_is_still_reported() {
        let err = resolver()
            .resolve(&tokens(&["--num-patches", "abc", "--num-patches", "5"]))
            .unwrap_err();
        assert_eq!(
            err.argument_errors().unwrap().as_slice(),
            &[ArgumentError::TypeMismatch {
                name: "num-patches".to_string(),
                literal: "abc".to_string(),
                expected: "int".to_string()
            }]
        );

        let err = resolver()
            .resolve(&tokens(&["--num-patches", "0", "--num-patches", "5"]))
            .unwrap_err();
        assert!(matches!(
            err.argument_errors().unwrap().as_slice(),
            [ArgumentError::ConstraintViolation { name, .. }] if name == "num-patches"
        ));
    }

    #[test]
    fn test_inline_boolean_literal() {
        let resolved = resolver()
            .resolve(&tokens(&["--remote-prefill=false"]))
            .unwrap();
        assert_eq!(
            resolved.extension("remote-prefill"),
            Some(&Value::Bool(false))
        );
    }

    #[test]
    fn test_base_flags_are_forwarded_to_engine() {
        let resolved = resolver()
            .resolve(&tokens(&[
                "--model",
                "llava-hf/llava-1.5-7b-hf",
                "--router",
                "kv",
                "--enforce-eager",
                "--block-size=32",
            ]))
            .unwrap();
        assert_eq!(resolved.base().model, "llava-hf/llava-1.5-7b-hf");
        assert!(resolved.base().enforce_eager);
        assert_eq!(resolved.base().block_size, 32);
        assert_eq!(resolved.extension("router"), Some(&Value::from("kv")));
    }

    #[test]
    fn test_base_tokens_reach_engine_verbatim() {
        let resolver = ArgumentResolver::new(schema(), EchoEngine).unwrap();
        let resolved = resolver
            .resolve(&tokens(&[
                "--model",
                "m",
                "--remote-prefill",
                "--enforce-eager",
                "--model=n",
            ]))
            .unwrap();
        assert_eq!(
            resolved.base(),
            &tokens(&["--model", "m", "--enforce-eager", "--model=n"])
        );
    }

    #[test]
    fn test_constraint_violation() {
        let err = resolver()
            .resolve(&tokens(&["--num-patches", "-1"]))
            .unwrap_err();
        let errors = err.argument_errors().unwrap();
        assert_eq!(
            errors.as_slice(),
            &[ArgumentError::ConstraintViolation {
                name: "num-patches".to_string(),
                value: "-1".to_string(),
                constraint: "> 0".to_string()
            }]
        );
    }

    #[test]
    fn test_choice_violation_references_field() {
        let err = resolver()
            .resolve(&tokens(&["--router", "quantum"]))
            .unwrap_err();
        let errors = err.argument_errors().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.as_slice()[0].field(), Some("router"));
        assert!(errors.to_string().contains("quantum"));
    }

    #[test]
    fn test_unknown_argument() {
        let err = resolver()
            .resolve(&tokens(&["--not-a-real-flag", "x"]))
            .unwrap_err();
        let errors = err.argument_errors().unwrap();
        assert_eq!(
            errors.as_slice(),
            &[ArgumentError::UnknownArgument {
                token: "--not-a-real-flag".to_string()
            }]
        );

        let err = resolver().resolve(&tokens(&["stray"])).unwrap_err();
        assert_eq!(
            err.argument_errors().unwrap().as_slice(),
            &[ArgumentError::UnknownArgument {
                token: "stray".to_string()
            }]
        );
    }

    #[test]
    fn test_missing_value() {
        let err = resolver()
            .resolve(&tokens(&["--num-patches", "--remote-prefill"]))
            .unwrap_err();
        assert_eq!(
            err.argument_errors().unwrap().as_slice(),
            &[ArgumentError::MissingValue {
                name: "num-patches".to_string()
            }]
        );
    }

    #[test]
    fn test_all_violations_reported_together() {
        let err = resolver()
            .resolve(&tokens(&[
                "--bogus",
                "--router",
                "quantum",
                "--num-patches",
                "zero",
                "--prefill-ratio",
                "half",
            ]))
            .unwrap_err();
        let errors = err.argument_errors().unwrap();
        assert_eq!(errors.len(), 4);
        assert!(matches!(
            errors.as_slice()[0],
            ArgumentError::UnknownArgument { .. }
        ));
        assert!(matches!(
            errors.as_slice()[2],
            ArgumentError::TypeMismatch { ref name, .. } if name == "num-patches"
        ));
    }

    #[test]
    fn test_missing_required_argument() {
        let schema = ExtensionSchema::from_specs([
            ParameterSpec::new("namespace", ValueKind::String).required()
        ])
        .unwrap();
        let resolver = ArgumentResolver::new(schema, EchoEngine).unwrap();
        let err = resolver.resolve(&[]).unwrap_err();
        assert_eq!(
            err.argument_errors().unwrap().as_slice(),
            &[ArgumentError::MissingRequiredArgument {
                name: "namespace".to_string()
            }]
        );

        let resolved = resolver.resolve(&tokens(&["--namespace", "dynamo"])).unwrap();
        assert_eq!(resolved.extension("namespace"), Some(&Value::from("dynamo")));
    }

    #[test]
    fn test_engine_error_is_propagated_unchanged() {
        let err = resolver()
            .resolve(&tokens(&["--block-size", "12"]))
            .unwrap_err();
        assert!(matches!(err, ResolveError::Engine(EngineError::Invalid(_))));

        let resolver = ArgumentResolver::new(schema(), EchoEngine).unwrap();
        let err = resolver
            .resolve(&tokens(&["--model", "reject"]))
            .unwrap_err();
        match err {
            ResolveError::Engine(inner) => assert_eq!(inner.to_string(), "engine rejected model"),
            other => panic!("unexpected error: {other}")
        }
    }

    #[test]
    fn test_engine_not_consulted_when_extensions_invalid() {
        let resolver = ArgumentResolver::new(schema(), EchoEngine).unwrap();
        let err = resolver
            .resolve(&tokens(&["--model", "reject", "--num-patches", "0"]))
            .unwrap_err();
        assert!(err.argument_errors().is_some());
    }

    #[test]
    fn test_name_collision_rejected_at_construction() {
        let schema = ExtensionSchema::from_specs([ParameterSpec::string("model", "x")]).unwrap();
        let err = ArgumentResolver::new(schema, ReferenceEngine::default()).unwrap_err();
        assert_eq!(
            err,
            SchemaError::ReservedName {
                name: "model".to_string()
            }
        );
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let resolver = resolver();
        let input = tokens(&["--router", "kv", "--model", "m", "--num-patches", "9"]);
        let first = resolver.resolve(&input).unwrap();
        let second = resolver.resolve(&input).unwrap();
        assert_eq!(first, second);
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_resolver_is_send_and_sync() {
        assert_send_sync::<ArgumentResolver<ReferenceEngine>>();
        assert_send_sync::<ExtensionSchema>();
        assert_send_sync::<crate::source::ServiceConfig>();
    }

    #[test]
    fn test_concurrent_resolutions_agree() {
        let resolver = resolver();
        let input = tokens(&["--router", "kv", "--num-patches", "64", "--model", "m"]);
        let (first, second) = std::thread::scope(|scope| {
            let first = scope.spawn(|| resolver.resolve(&input).unwrap());
            let second = scope.spawn(|| resolver.resolve(&input).unwrap());
            (first.join().unwrap(), second.join().unwrap())
        });
        assert_eq!(first, second);
        assert_eq!(first.extension("num-patches"), Some(&Value::Int(64)));
    }

    #[test]
    fn test_resolve_from_source() {
        let source = StaticSource::new(["--router", "round-robin"]);
        let resolved = resolver().resolve_from(&source, "VllmWorker", "").unwrap();
        assert_eq!(
            resolved.extension("router"),
            Some(&Value::from("round-robin"))
        );
    }

    #[test]
    fn test_require_accessors() {
        let resolved = resolver().resolve(&[]).unwrap();
        let values = resolved.extensions();
        assert_eq!(values.require_str("router").unwrap(), "random");
        assert_eq!(values.require_int("num-patches").unwrap(), 576);
        assert!(!values.require_bool("remote-prefill").unwrap());
        assert_eq!(values.require_float("prefill-ratio").unwrap(), 0.5);

        let err = values.require_int("router").unwrap_err();
        assert_eq!(
            err,
            SchemaError::FieldShape {
                name: "router".to_string(),
                expected: "int".to_string(),
                found: "string".to_string()
            }
        );
        assert!(matches!(
            values.require_str("served-name"),
            Err(SchemaError::FieldShape { ref found, .. }) if found == "nothing"
        ));
    }

    #[test]
    fn test_serializes_base_and_extensions() {
        let resolved = resolver().resolve(&tokens(&["--router", "kv"])).unwrap();
        let json = serde_json::to_value(&resolved).unwrap();
        assert_eq!(json["extensions"]["router"], "kv");
        assert_eq!(json["extensions"]["num-patches"], 576);
        assert_eq!(json["base"]["model"], "facebook/opt-125m");
    }
}
