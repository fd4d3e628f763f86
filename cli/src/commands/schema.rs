use anyhow::Result;
use clap::Args;
use colored::Colorize;
use worker_config::{ExtensionSchema, ParameterSpec, ReferenceEngine, worker_schema};

use crate::output;
use crate::ux_error;

#[derive(Args)]
pub struct SchemaArgs {
    #[arg(long, help = "Output as JSON")]
    pub json: bool
}

pub fn run(args: SchemaArgs) -> Result<()> {
    let schema = match worker_schema(&ReferenceEngine::new("worker")) {
        Ok(schema) => schema,
        Err(e) => {
            ux_error::invalid_schema(&e.to_string()).display();
            std::process::exit(1);
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(schema.all())?);
        return Ok(());
    }

    print_table(&schema);
    Ok(())
}

fn print_table(schema: &ExtensionSchema) {
    output::header("Worker extension parameters");
    println!();

    let width = schema.names().map(str::len).max().unwrap_or(0) + 2;
    for spec in schema.all() {
        let flag = format!("{:<width$}", format!("--{}", spec.name));
        println!(
            "  {} {:<7} {}",
            flag.bold(),
            spec.kind.to_string(),
            describe(spec).dimmed()
        );
        if !spec.help.is_empty() {
            println!("      {}", spec.help);
        }
    }

    println!();
    output::hint("Set these per service in the configuration file or WORKER_SERVICE_CONFIG");
}

fn describe(spec: &ParameterSpec) -> String {
    let mut parts = Vec::new();
    match &spec.default {
        Some(default) => parts.push(format!("default: {default}")),
        None if spec.required => parts.push("required".to_string()),
        None => {}
    }
    if let Some(constraint) = &spec.constraint {
        parts.push(constraint.to_string());
    }
    parts.join(", ")
}
