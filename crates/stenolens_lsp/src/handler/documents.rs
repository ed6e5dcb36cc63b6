//! Document lifecycle handlers (open, change, save, close).

use tower_lsp::lsp_types::*;
use tracing::{debug, error};

use crate::state::SharedState;

fn store_document(state: &SharedState, uri: Url, text: String) {
    let mut docs = match state.documents.write() {
        Ok(guard) => guard,
        Err(e) => {
            error!("Documents lock poisoned: {}", e);
            return;
        }
    };
    docs.insert(uri, text);
}

/// Handles the `textDocument/didOpen` notification.
pub async fn handle_did_open(state: &SharedState, params: DidOpenTextDocumentParams) {
    debug!("Document opened: {}", params.text_document.uri);
    store_document(state, params.text_document.uri, params.text_document.text);
}

/// Handles the `textDocument/didChange` notification.
///
/// Edits do not invalidate the cache: cached annotations are re-anchored
/// against the new text on the next code lens request.
pub async fn handle_did_change(state: &SharedState, params: DidChangeTextDocumentParams) {
    debug!("Document changed: {}", params.text_document.uri);

    let Some(change) = params.content_changes.into_iter().last() else {
        return;
    };
    store_document(state, params.text_document.uri, change.text);
}

/// Handles the `textDocument/didSave` notification.
///
/// Invalidates the file's cache entry; the provider notifies the client to
/// request code lenses again.
pub async fn handle_did_save(state: &SharedState, params: DidSaveTextDocumentParams) {
    debug!("Document saved: {}", params.text_document.uri);
    let uri = params.text_document.uri;

    if let Some(text) = params.text {
        store_document(state, uri.clone(), text);
    }

    let Ok(path) = uri.to_file_path() else {
        debug!("Ignoring save of non-file URI: {}", uri);
        return;
    };
    if let Some(provider) = state.provider() {
        provider.document_saved(&path);
    }
}

/// Handles the `textDocument/didClose` notification.
pub async fn handle_did_close(state: &SharedState, params: DidCloseTextDocumentParams) {
    debug!("Document closed: {}", params.text_document.uri);

    let mut docs = match state.documents.write() {
        Ok(guard) => guard,
        Err(e) => {
            error!("Documents lock poisoned: {}", e);
            return;
        }
    };
    docs.remove(&params.text_document.uri);
}
