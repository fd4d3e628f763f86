//! # Extension Schema Registry
//!
//! Declares the parameters a worker understands on top of the base engine's
//! own arguments. Each parameter is a [`ParameterSpec`]; the full table is an
//! [`ExtensionSchema`].
//!
//! The table is data: one generic parser in [`crate::resolver`] consumes it,
//! so adding a parameter never needs new parsing code. Registration order is
//! preserved and is the order used for help output and resolved values.

use std::collections::BTreeSet;
use std::fmt;

use clap::builder::PossibleValuesParser;
use clap::{Arg, ArgAction, Command};
use serde::{Serialize, Serializer};
use worker_errors::{ArgumentError, SchemaError};

/// Help heading for extension arguments in generated CLI help.
pub const EXTENSION_HELP_HEADING: &str = "Worker extensions";

/// Value type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ValueKind {
    String,
    Int,
    Float,
    Bool
}

impl ValueKind {
    /// Parse a command-line literal as this kind.
    pub fn parse(self, literal: &str) -> Option<Value> {
        match self {
            Self::String => Some(Value::String(literal.to_string())),
            Self::Int => literal.trim().parse().ok().map(Value::Int),
            Self::Float => literal.trim().parse().ok().map(Value::Float),
            Self::Bool => parse_bool(literal).map(Value::Bool)
        }
    }
}

fn parse_bool(literal: &str) -> Option<bool> {
    match literal.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None
    }
}

/// A parsed parameter value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool)
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::String(_) => ValueKind::String,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::Bool(_) => ValueKind::Bool
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None
        }
    }

    /// Integers widen to floats.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            Self::Int(value) => Some(*value as f64),
            _ => None
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(value) => f.write_str(value),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Bool(value) => write!(f, "{value}")
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// A predicate a value must satisfy beyond its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    /// Strictly greater than zero.
    Positive,
    /// Zero or greater.
    NonNegative,
    /// String must be one of the listed choices.
    OneOf(&'static [&'static str])
}

impl Constraint {
    pub fn is_satisfied_by(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::Positive, Value::Int(v)) => *v > 0,
            (Self::Positive, Value::Float(v)) => *v > 0.0,
            (Self::NonNegative, Value::Int(v)) => *v >= 0,
            (Self::NonNegative, Value::Float(v)) => *v >= 0.0,
            (Self::OneOf(choices), Value::String(v)) => choices.contains(&v.as_str()),
            _ => false
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Positive => f.write_str("> 0"),
            Self::NonNegative => f.write_str(">= 0"),
            Self::OneOf(choices) => write!(f, "one of {}", choices.join(", "))
        }
    }
}

impl Serialize for Constraint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One configurable extension field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterSpec {
    pub name: &'static str,
    pub kind: ValueKind,
    pub default: Option<Value>,
    pub required: bool,
    pub constraint: Option<Constraint>,
    pub help: &'static str
}

impl ParameterSpec {
    pub fn new(name: &'static str, kind: ValueKind) -> Self {
        Self {
            name,
            kind,
            default: None,
            required: false,
            constraint: None,
            help: ""
        }
    }

    pub fn string(name: &'static str, default: &str) -> Self {
        Self::new(name, ValueKind::String).with_default(default)
    }

    pub fn int(name: &'static str, default: i64) -> Self {
        Self::new(name, ValueKind::Int).with_default(default)
    }

    pub fn float(name: &'static str, default: f64) -> Self {
        Self::new(name, ValueKind::Float).with_default(default)
    }

    /// Boolean switch, off unless present.
    pub fn flag(name: &'static str) -> Self {
        Self::new(name, ValueKind::Bool).with_default(false)
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraint = Some(constraint);
        self
    }

    pub fn with_help(mut self, help: &'static str) -> Self {
        self.help = help;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Flags consume no value token.
    pub fn is_flag(&self) -> bool {
        self.kind == ValueKind::Bool
    }

    /// Parse a literal according to `kind`.
    pub fn parse_literal(&self, literal: &str) -> Result<Value, ArgumentError> {
        self.kind
            .parse(literal)
            .ok_or_else(|| ArgumentError::TypeMismatch {
                name: self.name.to_string(),
                literal: literal.to_string(),
                expected: self.kind.to_string()
            })
    }

    /// Check a typed value against `constraint`.
    pub fn check(&self, value: &Value) -> Result<(), ArgumentError> {
        match &self.constraint {
            Some(constraint) if !constraint.is_satisfied_by(value) => {
                Err(ArgumentError::ConstraintViolation {
                    name: self.name.to_string(),
                    value: value.to_string(),
                    constraint: constraint.to_string()
                })
            }
            _ => Ok(())
        }
    }

    fn to_arg(&self) -> Arg {
        let mut arg = Arg::new(self.name)
            .long(self.name)
            .help(self.help)
            .help_heading(EXTENSION_HELP_HEADING);

        if self.is_flag() {
            return arg.action(ArgAction::SetTrue);
        }

        arg = arg
            .action(ArgAction::Set)
            .value_name(self.kind.to_string().to_uppercase());
        if let Some(Constraint::OneOf(choices)) = self.constraint {
            arg = arg.value_parser(PossibleValuesParser::new(choices.iter().copied()));
        }
        match &self.default {
            Some(default) => arg.default_value(default.to_string()),
            None => arg.required(self.required)
        }
    }
}

/// The registered extension parameters.
///
/// Established once and read-only afterwards, so it can be shared freely
/// between concurrent resolutions.
#[derive(Debug, Clone, Default)]
pub struct ExtensionSchema {
    specs: Vec<ParameterSpec>,
    reserved: BTreeSet<String>
}

impl ExtensionSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start an empty schema whose names must avoid `reserved`.
    pub fn with_reserved<I, S>(reserved: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>
    {
        Self {
            specs: Vec::new(),
            reserved: reserved.into_iter().map(Into::into).collect()
        }
    }

    /// Build a schema from a table, rejecting duplicates.
    pub fn from_specs(specs: impl IntoIterator<Item = ParameterSpec>) -> Result<Self, SchemaError> {
        let mut schema = Self::new();
        for spec in specs {
            schema.register(spec)?;
        }
        Ok(schema)
    }

    /// Add a parameter.
    ///
    /// Fails on a duplicate name, a reserved (base engine) name, or a
    /// default whose kind differs from the declared kind.
    pub fn register(&mut self, spec: ParameterSpec) -> Result<(), SchemaError> {
        if self.reserved.contains(spec.name) {
            return Err(SchemaError::ReservedName {
                name: spec.name.to_string()
            });
        }
        if self.contains(spec.name) {
            return Err(SchemaError::DuplicateName {
                name: spec.name.to_string()
            });
        }
        if let Some(default) = &spec.default {
            if default.kind() != spec.kind {
                return Err(SchemaError::FieldShape {
                    name: spec.name.to_string(),
                    expected: spec.kind.to_string(),
                    found: default.kind().to_string()
                });
            }
        }
        self.specs.push(spec);
        Ok(())
    }

    /// Every parameter, in registration order.
    pub fn all(&self) -> &[ParameterSpec] {
        &self.specs
    }

    pub fn get(&self, name: &str) -> Option<&ParameterSpec> {
        self.specs.iter().find(|spec| spec.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.specs.iter().map(|spec| spec.name)
    }

    /// Fail if any parameter shares a name with the base engine.
    pub fn ensure_disjoint<'a>(
        &self,
        base_names: impl IntoIterator<Item = &'a str>
    ) -> Result<(), SchemaError> {
        for name in base_names {
            if self.contains(name) {
                return Err(SchemaError::ReservedName {
                    name: name.to_string()
                });
            }
        }
        Ok(())
    }

    /// Append every parameter to a clap command, for help rendering.
    pub fn augment_command(&self, command: Command) -> Command {
        self.specs
            .iter()
            .fold(command, |command, spec| command.arg(spec.to_arg()))
    }
}
