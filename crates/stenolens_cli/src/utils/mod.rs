//! CLI utility functions

use miette::{IntoDiagnostic, Report, Result};
use stenolens_client::StenographyClient;
use stenolens_core::{DASHBOARD_URL, LensConfig, LensError, UserAction};
use tokio::runtime::Runtime;
use tracing::debug;

use crate::cli::Cli;

/// Environment variable consulted when no key is passed on the command line.
pub const API_KEY_ENV: &str = "STENOLENS_API_KEY";

pub fn create_tokio_runtime() -> Result<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .into_diagnostic()
}

/// Loads the configuration and applies command-line overrides.
///
/// An explicit `--config` wins over the file discovered in the working
/// directory. The key comes from `--api-key`, then `STENOLENS_API_KEY`,
/// then the file.
pub fn load_config(cli: &Cli) -> Result<LensConfig> {
    let mut config = match &cli.config {
        Some(path) => LensConfig::from_file(path).map_err(lens_report)?,
        None => {
            let cwd = std::env::current_dir().into_diagnostic()?;
            match LensConfig::discover(&cwd) {
                Some(path) => {
                    debug!("Using configuration {}", path.display());
                    LensConfig::from_file(&path).map_err(lens_report)?
                }
                None => LensConfig::new(),
            }
        }
    };

    if let Some(key) = &cli.api_key {
        config.api_key = Some(key.clone());
    } else if let Ok(key) = std::env::var(API_KEY_ENV) {
        config.api_key = Some(key);
    }
    if let Some(url) = &cli.base_url {
        config.base_url = url.clone();
    }
    // One-shot commands never touch the server's persisted cache.
    config.persist = false;
    Ok(config)
}

pub fn build_client(config: &LensConfig) -> Result<StenographyClient> {
    StenographyClient::builder()
        .base_url(config.base_url.clone())
        .timeout(config.timeout())
        .build()
        .into_diagnostic()
}

/// Turns a user-facing error into a report with a hint for its actions.
pub fn lens_report(error: LensError) -> Report {
    let actions = error.actions();
    if actions.contains(&UserAction::InputApiKey) {
        miette::miette!(
            help = format!(
                "pass --api-key, set {API_KEY_ENV}, or add apiKey to .stenolens.json \
                 (new keys: {DASHBOARD_URL})"
            ),
            "{}",
            error
        )
    } else if actions.iter().any(|action| action.opens_dashboard()) {
        miette::miette!(help = format!("upgrade your plan at {DASHBOARD_URL}"), "{}", error)
    } else {
        miette::miette!("{}", error)
    }
}
