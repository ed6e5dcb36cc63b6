#![allow(dead_code)]

use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tower_lsp::lsp_types::*;
use tower_lsp::{LanguageServer, LspService};

use stenolens_lsp::Backend;

pub async fn send_msg<W: AsyncWriteExt + Unpin>(writer: &mut W, msg: &str) {
    let content = format!("Content-Length: {}\r\n\r\n{}", msg.len(), msg);
    writer.write_all(content.as_bytes()).await.unwrap();
    writer.flush().await.unwrap();
}

pub async fn recv_msg<R: AsyncReadExt + Unpin>(reader: &mut R) -> Option<String> {
    let mut buffer = Vec::new();
    let mut content_length = 0;

    loop {
        let byte = reader.read_u8().await.ok()?;
        buffer.push(byte);
        if buffer.ends_with(b"\r\n\r\n") {
            let headers = String::from_utf8_lossy(&buffer);
            for line in headers.lines() {
                if line.to_lowercase().starts_with("content-length:") {
                    let parts: Vec<&str> = line.split(':').collect();
                    if parts.len() == 2 {
                        content_length = parts[1].trim().parse().unwrap_or_else(|e| {
                            panic!("Failed to parse Content-Length: {e}, header: {line}")
                        });
                    }
                }
            }
            break;
        }
    }

    if content_length == 0 {
        return None;
    }

    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).await.ok()?;

    Some(String::from_utf8(body).unwrap())
}

/// Autopilot response with one explained fragment per `(row, code, explanation)`.
pub fn autopilot_body(blocks: &[(u32, &str, &str)]) -> Value {
    let code_blocks: Vec<Value> = blocks
        .iter()
        .map(|(row, code, explanation)| {
            json!({
                "stenographyResult": { "pm": explanation, "code": code, "metadata": {} },
                "startPosition": { "row": row, "column": 1 },
                "endPosition": { "row": row, "column": code.len() + 1 }
            })
        })
        .collect();
    json!({ "invocation_counter": 3, "code_blocks": code_blocks })
}

/// Dry-run response that only locates fragments.
pub fn dry_run_body(blocks: &[(u32, &str)]) -> Value {
    let code_blocks: Vec<Value> = blocks
        .iter()
        .map(|(row, code)| {
            json!({
                "startPosition": { "row": row, "column": 1 },
                "endPosition": { "row": row, "column": code.len() + 1 }
            })
        })
        .collect();
    json!({ "invocation_counter": 3, "code_blocks": code_blocks })
}

pub fn options(base_url: &str) -> Value {
    json!({ "apiKey": "test-key", "baseUrl": base_url, "persist": false })
}

pub async fn initialize(service: &LspService<Backend>, options: Value) -> InitializeResult {
    let params = InitializeParams {
        initialization_options: Some(options),
        ..Default::default()
    };
    service.inner().initialize(params).await.unwrap()
}

pub fn file_uri(path: &str) -> Url {
    Url::from_file_path(path).unwrap()
}

pub async fn open(service: &LspService<Backend>, uri: &Url, text: &str) {
    service
        .inner()
        .did_open(DidOpenTextDocumentParams {
            text_document: TextDocumentItem::new(uri.clone(), "python".to_string(), 1, text.to_string()),
        })
        .await;
}

pub async fn change(service: &LspService<Backend>, uri: &Url, version: i32, text: &str) {
    service
        .inner()
        .did_change(DidChangeTextDocumentParams {
            text_document: VersionedTextDocumentIdentifier::new(uri.clone(), version),
            content_changes: vec![TextDocumentContentChangeEvent {
                range: None,
                range_length: None,
                text: text.to_string(),
            }],
        })
        .await;
}

pub async fn save(service: &LspService<Backend>, uri: &Url) {
    service
        .inner()
        .did_save(DidSaveTextDocumentParams {
            text_document: TextDocumentIdentifier::new(uri.clone()),
            text: None,
        })
        .await;
}

pub async fn code_lens(service: &LspService<Backend>, uri: &Url) -> Option<Vec<CodeLens>> {
    service
        .inner()
        .code_lens(CodeLensParams {
            text_document: TextDocumentIdentifier::new(uri.clone()),
            work_done_progress_params: Default::default(),
            partial_result_params: Default::default(),
        })
        .await
        .unwrap()
}

pub async fn execute(
    service: &LspService<Backend>,
    command: &str,
    arguments: Vec<Value>,
) -> tower_lsp::jsonrpc::Result<Option<Value>> {
    service
        .inner()
        .execute_command(ExecuteCommandParams {
            command: command.to_string(),
            arguments,
            work_done_progress_params: Default::default(),
        })
        .await
}
