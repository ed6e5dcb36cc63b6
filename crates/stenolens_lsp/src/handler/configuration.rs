//! `workspace/didChangeConfiguration` handler.

use tower_lsp::lsp_types::*;
use tracing::{debug, error, info, warn};

use stenolens_core::LensConfig;

use crate::config::{settings_value, workspace_config};
use crate::state::SharedState;

/// Handles the `workspace/didChangeConfiguration` notification.
///
/// Without a settings object the workspace config file is reloaded instead.
/// The explanation client and the cache store keep the settings they were
/// built with.
pub async fn handle_did_change_configuration(
    state: &SharedState,
    client: &tower_lsp::Client,
    params: DidChangeConfigurationParams,
) {
    let Some(provider) = state.provider() else {
        return;
    };

    let result = match settings_value(&params.settings) {
        Some(settings) => LensConfig::from_value(settings),
        None => match workspace_config(state) {
            Some(result) => result,
            None => {
                debug!("No settings and no config file; configuration unchanged");
                return;
            }
        },
    };

    match result {
        Ok(config) => {
            for key in restart_required(&provider.context().config(), &config) {
                warn!("{} changes take effect after a restart", key);
            }
            provider.update_config(config);
            info!("Configuration updated");
        }
        Err(e) => {
            error!("Rejected configuration change: {}", e);
            client
                .show_message(MessageType::WARNING, e.to_string())
                .await;
        }
    }
}

/// Settings that changed but are only read when the server starts.
fn restart_required(current: &LensConfig, next: &LensConfig) -> Vec<&'static str> {
    let mut keys = Vec::new();
    if current.base_url != next.base_url {
        keys.push("baseUrl");
    }
    if current.timeout_secs != next.timeout_secs {
        keys.push("timeoutSecs");
    }
    if current.persist != next.persist {
        keys.push("persist");
    }
    if current.cache_dir != next.cache_dir {
        keys.push("cacheDir");
    }
    keys
}
