//! Configuration management for LSP server.

use serde_json::Value;
use tracing::{debug, info};

use stenolens_core::{LensConfig, LensError};

use crate::state::BackendState;

/// Section name used in `workspace/didChangeConfiguration` settings.
pub const SETTINGS_SECTION: &str = "stenolens";

/// Resolves the configuration at startup.
///
/// `initializationOptions` win; otherwise a config file in the workspace
/// root is used; otherwise defaults apply.
pub fn load_config(state: &BackendState, options: Option<Value>) -> Result<LensConfig, LensError> {
    if let Some(options) = options.and_then(|value| settings_value(&value)) {
        debug!("Using initializationOptions as configuration");
        return LensConfig::from_value(options);
    }

    workspace_config(state).unwrap_or_else(|| Ok(LensConfig::new()))
}

/// Loads the config file found in the workspace root, if there is one.
pub fn workspace_config(state: &BackendState) -> Option<Result<LensConfig, LensError>> {
    let root = state.workspace_root()?;
    let config_path = LensConfig::discover(&root)?;
    info!("Found config file: {}", config_path.display());
    Some(LensConfig::from_file(&config_path))
}

/// Extracts the Stenolens settings object, accepting either the bare object
/// or one nested under [`SETTINGS_SECTION`].
pub fn settings_value(settings: &Value) -> Option<Value> {
    let section = settings.get(SETTINGS_SECTION).unwrap_or(settings);
    section.is_object().then(|| section.clone())
}
