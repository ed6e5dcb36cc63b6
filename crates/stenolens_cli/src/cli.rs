//! CLI argument definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Stenolens - code explanations as editor annotations
#[derive(Parser)]
#[command(name = "stenolens")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// API key (overrides STENOLENS_API_KEY and the configuration file)
    #[arg(long, global = true, value_name = "KEY")]
    pub api_key: Option<String>,

    /// Explanation service endpoint
    #[arg(long, global = true, value_name = "URL")]
    pub base_url: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the LSP server on stdio
    Lsp,

    /// Explain a source file once
    Explain {
        /// File to explain
        file: PathBuf,

        /// Only report the fragments that would be explained
        #[arg(long)]
        dry_run: bool,
    },

    /// Check whether invocation quota is available
    Probe,
}
