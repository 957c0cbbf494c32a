//! CLI entrypoint for the substation simulator.

#[path = "subsim/check.rs"]
mod check;
#[path = "subsim/cli.rs"]
mod cli;
#[path = "subsim/run.rs"]
mod run;

use clap::Parser;

use cli::{Cli, Command};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Command::Run { config, cycles } => run::run_simulation(&config, cycles),
        Command::Check { file, listing } => check::check_program(&file, listing),
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}
