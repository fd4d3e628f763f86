pub mod help;
pub mod resolve;
pub mod schema;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "worker-args",
    author,
    version,
    about = "Resolve and inspect inference worker arguments",
    long_about = "Resolve and inspect inference worker arguments.\n\nArguments come from the \
                  service configuration file (--config or WORKER_SERVICE_CONFIG_FILE) and the \
                  WORKER_SERVICE_CONFIG environment variable, the latter taking precedence.",
    disable_help_subcommand = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Resolve a service's worker arguments and print them")]
    Resolve(resolve::ResolveArgs),

    #[command(about = "List the worker extension parameters")]
    Schema(schema::SchemaArgs),

    #[command(about = "Show the combined engine and worker argument help")]
    Help(help::HelpArgs)
}
