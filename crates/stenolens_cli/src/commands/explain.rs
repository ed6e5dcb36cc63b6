//! Explain command implementation

use std::path::Path;

use miette::{IntoDiagnostic, Result};
use stenolens_client::{ExplainApi, ExplainedBlock};
use stenolens_core::LensError;
use tracing::{debug, info};

use crate::cli::Cli;
use crate::utils::{build_client, create_tokio_runtime, lens_report, load_config};

/// Explains `file` with one batch call and prints one line per fragment.
pub fn run_explain(cli: &Cli, file: &Path, dry_run: bool) -> Result<()> {
    let config = load_config(cli)?;
    let language = config
        .language_for(file)
        .ok_or_else(|| {
            lens_report(LensError::UnsupportedLanguage(format!(
                "{} (supported: {})",
                file.display(),
                config.supported_extensions().join(", ")
            )))
        })?
        .to_string();
    let api_key = config
        .api_key()
        .ok_or_else(|| lens_report(LensError::auth("No API key configured")))?
        .to_string();
    let source = std::fs::read_to_string(file).into_diagnostic()?;
    let client = build_client(&config)?;

    debug!("Explaining {} as {}", file.display(), language);
    let analysis = create_tokio_runtime()?
        .block_on(client.analyze(&api_key, &source, &language, dry_run))
        .map_err(|e| lens_report(LensError::from(e)))?;

    for block in &analysis.blocks {
        println!("{}", format_block(block, dry_run));
    }
    info!("{} fragments in {}", analysis.blocks.len(), file.display());
    println!("Invocations: {}", analysis.invocation_counter);
    Ok(())
}

fn format_block(block: &ExplainedBlock, dry_run: bool) -> String {
    let position = format!("{}:{}", block.start_row, block.start_col);
    let first_line = block.code.lines().next().unwrap_or_default();
    match (&block.explanation, dry_run) {
        (Some(explanation), false) => format!("{position}  {}", explanation.trim()),
        _ => format!("{position}  {first_line}"),
    }
}
