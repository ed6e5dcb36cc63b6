//! Initialize and shutdown handlers.

use std::sync::Arc;

use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tracing::{error, info};

use stenolens_client::StenographyClient;
use stenolens_core::{AnnotationProvider, LensConfig, LensContext};

use crate::COMMANDS;
use crate::config::load_config;
use crate::host::{HostCapabilities, LspHost};
use crate::state::BackendState;

/// Builds the provider for a configuration.
fn build_provider(
    config: LensConfig,
    client: &tower_lsp::Client,
    capabilities: HostCapabilities,
) -> std::result::Result<AnnotationProvider, String> {
    let api = StenographyClient::builder()
        .base_url(config.base_url.clone())
        .timeout(config.timeout())
        .build()
        .map_err(|e| e.to_string())?;
    let host = LspHost::spawn(client.clone(), capabilities);
    let ctx = LensContext::new(config, Arc::new(api), Arc::new(host));
    Ok(AnnotationProvider::new(ctx))
}

/// Handles the `initialize` LSP request.
pub async fn handle_initialize(
    state: &BackendState,
    client: &tower_lsp::Client,
    params: InitializeParams,
) -> Result<InitializeResult> {
    info!("Stenolens LSP server initializing...");

    #[allow(deprecated)]
    let root = params.root_uri.and_then(|u| u.to_file_path().ok());
    match state.workspace_root.write() {
        Ok(mut guard) => *guard = root,
        Err(e) => error!("Workspace root lock poisoned: {}", e),
    }

    let config = match load_config(state, params.initialization_options) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load config: {}", e);
            client
                .show_message(MessageType::WARNING, format!("{e}; using defaults"))
                .await;
            LensConfig::new()
        }
    };

    let capabilities = HostCapabilities::from_client(&params.capabilities);
    match build_provider(config, client, capabilities) {
        Ok(provider) => match state.provider.write() {
            Ok(mut guard) => *guard = Some(provider),
            Err(e) => error!("Provider lock poisoned: {}", e),
        },
        Err(e) => error!("Failed to create explanation client: {}", e),
    }

    Ok(InitializeResult {
        capabilities: ServerCapabilities {
            text_document_sync: Some(TextDocumentSyncCapability::Options(
                TextDocumentSyncOptions {
                    open_close: Some(true),
                    change: Some(TextDocumentSyncKind::FULL),
                    save: Some(TextDocumentSyncSaveOptions::SaveOptions(SaveOptions {
                        include_text: Some(true),
                    })),
                    ..Default::default()
                },
            )),
            code_lens_provider: Some(CodeLensOptions {
                resolve_provider: Some(true),
            }),
            execute_command_provider: Some(ExecuteCommandOptions {
                commands: COMMANDS.iter().map(|c| c.to_string()).collect(),
                work_done_progress_options: Default::default(),
            }),
            ..Default::default()
        },
        server_info: Some(ServerInfo {
            name: "stenolens-lsp".to_string(),
            version: Some(env!("CARGO_PKG_VERSION").to_string()),
        }),
    })
}

/// Handles the `initialized` LSP notification.
pub async fn handle_initialized(client: &tower_lsp::Client) {
    client
        .log_message(MessageType::INFO, "Stenolens LSP server initialized!")
        .await;
}

/// Handles the `shutdown` LSP request.
pub async fn handle_shutdown(state: &BackendState) -> Result<()> {
    info!("Stenolens LSP server shutting down...");
    if let Some(provider) = state.provider() {
        provider.deactivate();
    }
    Ok(())
}
