//! Stenolens CLI
//!
//! Code explanations as editor annotations, backed by the Stenography service.

mod cli;
mod commands;
mod utils;

use std::process::ExitCode;

use clap::Parser;
use miette::Result;
use tracing::error;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use commands::{run_explain, run_lsp, run_probe};

fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins; --verbose raises the default to debug.
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // stdout belongs to the LSP transport.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:?}", e);
            ExitCode::from(2)
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Lsp => run_lsp(),
        Commands::Explain { file, dry_run } => run_explain(cli, file, *dry_run),
        Commands::Probe => run_probe(cli),
    }
}
