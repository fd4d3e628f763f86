//! # Worker Argument Errors
//!
//! Typed failures for worker argument resolution.
//!
//! - `SchemaError`: the extension table itself is malformed (programming
//!   error, fatal at load)
//! - `ArgumentError` / `ArgumentErrors`: the configured arguments are wrong
//!   (fatal to one resolution call, reported in one batch)
//! - `SourceError`: the named configuration store could not be read
//! - `ResolveError`: everything a resolution call can fail with, including the
//!   base engine's own error, carried unchanged

use serde::Serialize;
use thiserror::Error;

/// Errors in the definition of the extension parameter table.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchemaError {
    #[error("Duplicate extension parameter: {name}")]
    DuplicateName { name: String },

    /// The name is already owned by the base engine.
    #[error("Extension parameter {name} collides with a base engine argument")]
    ReservedName { name: String },

    /// A resolved value does not have the shape its typed view expects.
    #[error("Extension parameter {name} resolved to {found}, expected {expected}")]
    FieldShape {
        name: String,
        expected: String,
        found: String
    }
}

/// A single problem with the configured arguments.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArgumentError {
    #[error("Unrecognized argument: {token}")]
    UnknownArgument { token: String },

    #[error("Argument --{name} expects a value")]
    MissingValue { name: String },

    #[error("Missing required argument: --{name}")]
    MissingRequiredArgument { name: String },

    #[error("Invalid value for --{name}: {literal:?} is not a valid {expected}")]
    TypeMismatch {
        name: String,
        literal: String,
        expected: String
    },

    #[error("Invalid value for --{name}: {value} does not satisfy {constraint}")]
    ConstraintViolation {
        name: String,
        value: String,
        constraint: String
    }
}

impl ArgumentError {
    /// Parameter the error is about. `None` for unrecognized tokens.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::UnknownArgument { .. } => None,
            Self::MissingValue { name }
            | Self::MissingRequiredArgument { name }
            | Self::TypeMismatch { name, .. }
            | Self::ConstraintViolation { name, .. } => Some(name)
        }
    }
}

/// Every argument problem found in one resolution call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Error, Serialize)]
#[serde(transparent)]
#[error("{} invalid worker argument(s): {}", .0.len(), render(.0))]
pub struct ArgumentErrors(Vec<ArgumentError>);

impl ArgumentErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: ArgumentError) {
        self.0.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ArgumentError> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[ArgumentError] {
        &self.0
    }

    /// `Ok(())` when nothing was collected.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl From<Vec<ArgumentError>> for ArgumentErrors {
    fn from(errors: Vec<ArgumentError>) -> Self {
        Self(errors)
    }
}

impl IntoIterator for ArgumentErrors {
    type Item = ArgumentError;
    type IntoIter = std::vec::IntoIter<ArgumentError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ArgumentErrors {
    type Item = &'a ArgumentError;
    type IntoIter = std::slice::Iter<'a, ArgumentError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

fn render(errors: &[ArgumentError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Named configuration store errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("Invalid service configuration from {origin}: {reason}")]
    InvalidConfig { origin: String, reason: String },

    #[error("Service {service} has a malformed {key} entry: {reason}")]
    MalformedEntry {
        service: String,
        key: String,
        reason: String
    }
}

/// Failure of one resolution call.
///
/// `E` is the base engine's own error type. It is never wrapped or
/// reinterpreted: `Engine` holds exactly what the engine returned.
#[derive(Debug, Error)]
pub enum ResolveError<E: std::error::Error + 'static> {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Invalid(#[from] ArgumentErrors),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Engine(E)
}

impl<E: std::error::Error + 'static> ResolveError<E> {
    /// Argument problems, if this is an input error.
    pub fn argument_errors(&self) -> Option<&ArgumentErrors> {
        match self {
            Self::Invalid(errors) => Some(errors),
            _ => None
        }
    }
}
