//! Code lens handlers.

use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tracing::debug;

use crate::conversion::{parse_lens_data, to_code_lens, to_command};
use crate::state::SharedState;

/// Handles the `textDocument/codeLens` request.
pub async fn handle_code_lens(
    state: &SharedState,
    params: CodeLensParams,
) -> Result<Option<Vec<CodeLens>>> {
    let uri = params.text_document.uri;
    debug!("Code lens request: {}", uri);

    let Some(provider) = state.provider() else {
        return Ok(None);
    };
    let Some(text) = state.document_text(&uri) else {
        return Ok(None);
    };
    let Ok(path) = uri.to_file_path() else {
        debug!("Skipping non-file URI: {}", uri);
        return Ok(None);
    };

    let lenses = provider
        .provide_annotations(&path, &text)
        .await
        .iter()
        .map(|anchored| to_code_lens(anchored, &uri))
        .collect();
    Ok(Some(lenses))
}

/// Handles the `codeLens/resolve` request.
///
/// A lens that cannot be resolved is returned without a command.
pub async fn handle_code_lens_resolve(state: &SharedState, mut lens: CodeLens) -> Result<CodeLens> {
    if lens.command.is_some() {
        return Ok(lens);
    }
    let Some((uri, row)) = lens.data.as_ref().and_then(parse_lens_data) else {
        return Ok(lens);
    };
    let (Some(provider), Ok(path)) = (state.provider(), uri.to_file_path()) else {
        return Ok(lens);
    };

    debug!("Resolving code lens for {} row {}", uri, row);
    if let Some(annotation) = provider.resolve_annotation(&path, row).await {
        lens.command = Some(to_command(&annotation));
    }
    Ok(lens)
}
