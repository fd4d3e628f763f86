use anyhow::Result;
use clap::Args;
use worker_config::{ReferenceEngine, worker_resolver};

use crate::ux_error;

#[derive(Args)]
pub struct HelpArgs {
    #[arg(long, help = "Show the short help")]
    pub short: bool
}

pub fn run(args: HelpArgs) -> Result<()> {
    let resolver = match worker_resolver(ReferenceEngine::new("worker")) {
        Ok(resolver) => resolver,
        Err(e) => {
            ux_error::invalid_schema(&e.to_string()).display();
            std::process::exit(1);
        }
    };

    let mut command = resolver
        .schema()
        .augment_command(resolver.engine().command())
        .about("Inference worker arguments: engine arguments plus worker extensions");

    let help = if args.short {
        command.render_help()
    } else {
        command.render_long_help()
    };
    print!("{help}");
    Ok(())
}
