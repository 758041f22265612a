// branchscope: control-flow graphs, mutation distances and decision probes
// for resolved method bodies.

use anyhow::Result;
use clap::Parser;

mod cli;
mod output;

use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run_command(&cli) {
        output::error(&format!("{:#}", e));
        std::process::exit(output::EXIT_ERROR);
    }
}

fn run_command(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Cfg(args) => cli::cmds::cfg(args, cli)?,
        Commands::Distances(args) => cli::cmds::distances(args, cli)?,
        Commands::Instrument(args) => cli::cmds::instrument(args, cli)?,
        Commands::Registry(args) => cli::cmds::registry(args, cli)?,
    }
    Ok(())
}
