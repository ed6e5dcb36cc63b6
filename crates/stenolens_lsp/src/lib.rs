//! Stenolens LSP Server
//!
//! Language Server Protocol implementation for Stenolens.
//! Shows code explanations as code lenses and keeps them aligned with
//! edited text.

mod config;
mod conversion;
mod handler;
mod host;
mod state;

use std::sync::Arc;

use serde_json::Value;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer, LspService, Server};
use tracing::info;

pub use handler::{
    COMMANDS, PROBE_QUOTA_COMMAND, RESET_CACHE_COMMAND, SET_KEY_COMMAND,
    TOGGLE_ANNOTATIONS_COMMAND,
};
pub use host::{HostCapabilities, LspHost};

use state::{BackendState, SharedState};

/// The LSP backend for Stenolens.
#[derive(Debug, Clone)]
pub struct Backend {
    /// LSP client for sending notifications.
    client: Client,
    /// Shared state
    state: SharedState,
}

impl Backend {
    /// Creates a new backend with the given client.
    ///
    /// The annotation provider is created during `initialize`, once the
    /// configuration is known.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            state: Arc::new(BackendState::new()),
        }
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        handler::handle_initialize(&self.state, &self.client, params).await
    }

    async fn initialized(&self, _: InitializedParams) {
        handler::handle_initialized(&self.client).await;
    }

    async fn shutdown(&self) -> Result<()> {
        handler::handle_shutdown(&self.state).await
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        handler::handle_did_open(&self.state, params).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        handler::handle_did_change(&self.state, params).await;
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        handler::handle_did_save(&self.state, params).await;
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        handler::handle_did_close(&self.state, params).await;
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        handler::handle_did_change_configuration(&self.state, &self.client, params).await;
    }

    async fn code_lens(&self, params: CodeLensParams) -> Result<Option<Vec<CodeLens>>> {
        handler::handle_code_lens(&self.state, params).await
    }

    async fn code_lens_resolve(&self, params: CodeLens) -> Result<CodeLens> {
        handler::handle_code_lens_resolve(&self.state, params).await
    }

    async fn execute_command(&self, params: ExecuteCommandParams) -> Result<Option<Value>> {
        handler::handle_execute_command(&self.state, &self.client, params).await
    }
}

/// Starts the LSP server.
///
/// This function does not return unless an error occurs or the server shuts down.
pub async fn run() {
    info!("Stenolens LSP server starting...");

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::new(Backend::new);
    Server::new(stdin, stdout, socket).serve(service).await;
}
