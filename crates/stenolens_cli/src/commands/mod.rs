//! Subcommand implementations

mod explain;
mod lsp;
mod probe;

pub use explain::run_explain;
pub use lsp::run_lsp;
pub use probe::run_probe;
