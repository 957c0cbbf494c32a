//! CLI definitions for subsim.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "subsim",
    version,
    about = "Substation IED simulation engine",
    after_help = "Examples:\n  subsim run --config sim.toml --cycles 50\n  subsim check generator.st --listing"
)]
pub struct Cli {
    /// Log engine activity at debug level.
    #[arg(long, short, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load a simulation and run it in real time.
    Run {
        /// Simulation configuration file.
        #[arg(long)]
        config: PathBuf,
        /// Stop after this many script cycles (runs until killed otherwise).
        #[arg(long)]
        cycles: Option<u64>,
    },
    /// Compile a Structured Text program and report the first error.
    Check {
        /// Program source file.
        file: PathBuf,
        /// Print the compiled step listing.
        #[arg(long)]
        listing: bool,
    },
}
