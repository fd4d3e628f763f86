//! # Worker Configuration
//!
//! Resolves an inference worker's arguments: the base engine's own arguments
//! plus the worker's extension parameters, taken from one named configuration
//! source.
//!
//! This crate provides:
//! - The extension parameter registry ([`schema`])
//! - The base engine boundary and the reference engine ([`engine`])
//! - The resolver producing one typed configuration ([`resolver`])
//! - Configuration sources and the named service store ([`source`])
//! - The worker's fifteen extension parameters ([`worker`])
//! - Service store loading from files and the environment, merged with
//!   precedence ([`loader`], [`file_loader`], [`precedence`])
//!
//! ```rust,no_run
//! use worker_config::{ReferenceEngine, load_service_config, parse_worker_args};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = load_service_config(None)?;
//!     let args = parse_worker_args(&source, "VllmWorker", "", ReferenceEngine::default())?;
//!     println!("router: {}", args.disaggregation.router);
//!     Ok(())
//! }
//! ```

pub mod engine;
pub mod file_loader;
pub mod loader;
pub mod precedence;
pub mod resolver;
pub mod schema;
pub mod source;
pub mod worker;

pub use engine::{BaseEngine, BaseFlag, ClapEngine, EngineArgs, EngineError, ReferenceEngine};
pub use file_loader::{ConfigFileError, load_from_file, load_from_json, load_from_toml, load_from_yaml};
pub use loader::{SERVICE_CONFIG_ENV, SERVICE_CONFIG_FILE_ENV, load_from_env, load_service_config};
pub use precedence::merge_configs;
pub use resolver::{ArgumentResolver, ExtensionValues, ResolvedConfiguration};
pub use schema::{Constraint, ExtensionSchema, ParameterSpec, Value, ValueKind};
pub use source::{ConfigurationSource, ServiceConfig, StaticSource};
pub use worker::{
    DisaggregationArgs, ImageArgs, Router, VideoArgs, WorkerArgs, parse_worker_args,
    worker_parameters, worker_resolver, worker_schema,
};
