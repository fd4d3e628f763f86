use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, ValueEnum};
use serde::Serialize;
use worker_config::{ReferenceEngine, load_service_config, parse_worker_args};
use worker_errors::ResolveError;

use crate::output;
use crate::ux_error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml
}

#[derive(Args)]
pub struct ResolveArgs {
    #[arg(long, short, help = "Service whose arguments to resolve")]
    pub service: String,

    #[arg(long, default_value = "", help = "Only use keys starting with this prefix")]
    pub prefix: String,

    /// Falls back to `WORKER_SERVICE_CONFIG_FILE` inside the loader.
    #[arg(long, help = "Service configuration file (TOML, YAML or JSON)")]
    pub config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Json, help = "Output format")]
    pub format: OutputFormat,

    #[arg(long, help = "Only validate, print nothing on success")]
    pub check: bool
}

pub fn run(args: ResolveArgs) -> Result<()> {
    let source = match load_service_config(args.config.as_deref()) {
        Ok(source) => source,
        Err(e) => {
            ux_error::config_error(&e.to_string()).display();
            std::process::exit(1);
        }
    };

    if source.service(&args.service).is_none() {
        output::info(&format!(
            "No configuration for service '{}', using defaults",
            args.service
        ));
    }
    tracing::debug!(service = %args.service, prefix = %args.prefix, "Resolving worker arguments");

    let engine = ReferenceEngine::new("worker");
    let worker = match parse_worker_args(&source, &args.service, &args.prefix, engine) {
        Ok(worker) => worker,
        Err(ResolveError::Invalid(errors)) => {
            ux_error::invalid_arguments(&args.service, &errors).display();
            std::process::exit(1);
        }
        Err(ResolveError::Engine(e)) => {
            ux_error::engine_rejected(&args.service, &e.to_string()).display();
            std::process::exit(1);
        }
        Err(ResolveError::Source(e)) => {
            ux_error::config_error(&e.to_string()).display();
            std::process::exit(1);
        }
        Err(ResolveError::Schema(e)) => {
            ux_error::invalid_schema(&e.to_string()).display();
            std::process::exit(1);
        }
    };

    if args.check {
        output::success(&format!("Arguments for '{}' are valid", args.service));
        return Ok(());
    }

    println!("{}", render(&worker, args.format)?);
    Ok(())
}

fn render<T: Serialize>(value: &T, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
    })
}
