mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Acquire(args) => {
            commands::acquire::handle(&args)?;
        }

        Commands::Inspect { image } => {
            commands::inspect::handle(&image)?;
        }
    }

    Ok(())
}

/// Log to stderr so `--json` output on stdout stays clean
fn init_logging(verbose: bool) {
    let default = if verbose {
        "ramcap=debug,ramcap_cli=debug"
    } else {
        "ramcap=info,ramcap_cli=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
