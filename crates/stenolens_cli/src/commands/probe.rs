//! Probe command implementation

use std::sync::Arc;

use miette::Result;
use stenolens_core::{AnnotationProvider, LensContext, NoopHost};
use tracing::info;

use crate::cli::Cli;
use crate::utils::{build_client, create_tokio_runtime, lens_report, load_config};

/// Runs a dry-run probe and prints the invocation counter.
pub fn run_probe(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let api = Arc::new(build_client(&config)?);
    let provider = AnnotationProvider::new(LensContext::new(config, api, Arc::new(NoopHost)));

    let invocations = create_tokio_runtime()?
        .block_on(provider.probe_quota())
        .map_err(lens_report)?;

    info!("Quota probe succeeded");
    println!("Quota available ({invocations} invocations used)");
    Ok(())
}
