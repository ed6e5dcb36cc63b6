//! `workspace/executeCommand` handler.

use serde_json::{Value, json};
use tower_lsp::jsonrpc::{Error, Result};
use tower_lsp::lsp_types::*;
use tracing::{debug, info};

use stenolens_core::SHOW_EXPLANATION_COMMAND;

use crate::conversion::string_arg;
use crate::state::SharedState;

pub const RESET_CACHE_COMMAND: &str = "stenolens.resetCache";
pub const TOGGLE_ANNOTATIONS_COMMAND: &str = "stenolens.toggleAnnotations";
pub const SET_KEY_COMMAND: &str = "stenolens.setKey";
pub const PROBE_QUOTA_COMMAND: &str = "stenolens.probeQuota";

/// Every command the server executes.
pub const COMMANDS: &[&str] = &[
    RESET_CACHE_COMMAND,
    TOGGLE_ANNOTATIONS_COMMAND,
    SET_KEY_COMMAND,
    SHOW_EXPLANATION_COMMAND,
    PROBE_QUOTA_COMMAND,
];

/// Handles the `workspace/executeCommand` request.
pub async fn handle_execute_command(
    state: &SharedState,
    client: &tower_lsp::Client,
    params: ExecuteCommandParams,
) -> Result<Option<Value>> {
    debug!("Execute command: {}", params.command);
    let args = params.arguments;

    if params.command == SHOW_EXPLANATION_COMMAND {
        let explanation =
            string_arg(&args, 0).ok_or_else(|| Error::invalid_params("Missing explanation"))?;
        client
            .show_message(MessageType::INFO, explanation.to_string())
            .await;
        return Ok(None);
    }

    let Some(provider) = state.provider() else {
        return Err(Error::invalid_request());
    };

    match params.command.as_str() {
        RESET_CACHE_COMMAND => {
            provider.reset_cache();
            Ok(None)
        }
        TOGGLE_ANNOTATIONS_COMMAND => {
            let enabled = provider.toggle_annotations();
            Ok(Some(json!({ "annotations": enabled })))
        }
        SET_KEY_COMMAND => {
            let key = string_arg(&args, 0).ok_or_else(|| Error::invalid_params("Missing key"))?;
            provider.set_api_key(key);
            info!("API key updated");
            Ok(None)
        }
        PROBE_QUOTA_COMMAND => match provider.probe_quota().await {
            Ok(invocations) => {
                client
                    .show_message(
                        MessageType::INFO,
                        format!("Stenolens quota available ({invocations} invocations used)"),
                    )
                    .await;
                Ok(Some(json!({ "invocationCounter": invocations })))
            }
            Err(e) => {
                provider.context().host().report_error(&e);
                Ok(None)
            }
        },
        other => Err(Error::invalid_params(format!("Unknown command: {other}"))),
    }
}
