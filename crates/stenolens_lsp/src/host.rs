//! Host editor services backed by the LSP client.

use tokio::sync::mpsc;
use tower_lsp::Client;
use tower_lsp::lsp_types::notification::Progress;
use tower_lsp::lsp_types::request::WorkDoneProgressCreate;
use tower_lsp::lsp_types::*;
use tracing::{debug, warn};

use stenolens_core::{DASHBOARD_URL, HostEditor, LensError, UserAction};

/// Which optional client features may be used.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostCapabilities {
    /// `workspace/codeLens/refresh`
    pub code_lens_refresh: bool,
    /// `window/workDoneProgress`
    pub work_done_progress: bool,
}

impl HostCapabilities {
    pub fn from_client(capabilities: &ClientCapabilities) -> Self {
        Self {
            code_lens_refresh: capabilities
                .workspace
                .as_ref()
                .and_then(|w| w.code_lens.as_ref())
                .and_then(|c| c.refresh_support)
                .unwrap_or(false),
            work_done_progress: capabilities
                .window
                .as_ref()
                .and_then(|w| w.work_done_progress)
                .unwrap_or(false),
        }
    }
}

#[derive(Debug)]
enum HostMessage {
    Refresh,
    BeginProgress { key: String, title: String },
    EndProgress { key: String },
}

/// [`HostEditor`] that forwards to the editor over LSP.
///
/// Refreshes and progress updates are delivered in order by one worker
/// task. Error prompts run on their own task because they wait for the user.
#[derive(Debug, Clone)]
pub struct LspHost {
    client: Client,
    capabilities: HostCapabilities,
    tx: mpsc::UnboundedSender<HostMessage>,
}

impl LspHost {
    /// Creates the host and starts its worker. Must be called inside a
    /// Tokio runtime.
    pub fn spawn(client: Client, capabilities: HostCapabilities) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(client.clone(), rx));
        Self {
            client,
            capabilities,
            tx,
        }
    }

    fn send(&self, message: HostMessage) {
        if self.tx.send(message).is_err() {
            debug!("Host worker stopped; dropping message");
        }
    }
}

fn progress_token(key: &str) -> ProgressToken {
    NumberOrString::String(format!("stenolens/{key}"))
}

async fn run_worker(client: Client, mut rx: mpsc::UnboundedReceiver<HostMessage>) {
    while let Some(message) = rx.recv().await {
        match message {
            HostMessage::Refresh => {
                if let Err(e) = client.code_lens_refresh().await {
                    warn!("Code lens refresh failed: {}", e);
                }
            }
            HostMessage::BeginProgress { key, title } => {
                let token = progress_token(&key);
                let created = client
                    .send_request::<WorkDoneProgressCreate>(WorkDoneProgressCreateParams {
                        token: token.clone(),
                    })
                    .await;
                if let Err(e) = created {
                    warn!("Failed to create progress token: {}", e);
                    continue;
                }
                client
                    .send_notification::<Progress>(ProgressParams {
                        token,
                        value: ProgressParamsValue::WorkDone(WorkDoneProgress::Begin(
                            WorkDoneProgressBegin {
                                title,
                                ..Default::default()
                            },
                        )),
                    })
                    .await;
            }
            HostMessage::EndProgress { key } => {
                client
                    .send_notification::<Progress>(ProgressParams {
                        token: progress_token(&key),
                        value: ProgressParamsValue::WorkDone(WorkDoneProgress::End(
                            WorkDoneProgressEnd::default(),
                        )),
                    })
                    .await;
            }
        }
    }
}

async fn prompt_error(client: Client, message: String, actions: Vec<UserAction>) {
    let items = (!actions.is_empty()).then(|| {
        actions
            .iter()
            .map(|action| MessageActionItem {
                title: action.label().to_string(),
                properties: Default::default(),
            })
            .collect()
    });

    let chosen = match client
        .show_message_request(MessageType::ERROR, message, items)
        .await
    {
        Ok(Some(item)) => UserAction::from_label(&item.title),
        Ok(None) => None,
        Err(e) => {
            warn!("Error prompt failed: {}", e);
            None
        }
    };

    match chosen {
        Some(action) if action.opens_dashboard() => open_dashboard(&client).await,
        Some(UserAction::InputApiKey) => {
            client
                .show_message(
                    MessageType::INFO,
                    "Run the `stenolens.setKey` command with your API key.",
                )
                .await;
        }
        _ => {}
    }
}

async fn open_dashboard(client: &Client) {
    let Ok(uri) = Url::parse(DASHBOARD_URL) else {
        return;
    };
    let params = ShowDocumentParams {
        uri,
        external: Some(true),
        take_focus: Some(true),
        selection: None,
    };
    if let Err(e) = client.show_document(params).await {
        warn!("Failed to open dashboard: {}", e);
    }
}

impl HostEditor for LspHost {
    fn report_error(&self, error: &LensError) {
        let client = self.client.clone();
        let message = error.to_string();
        let actions = error.actions().to_vec();
        tokio::spawn(prompt_error(client, message, actions));
    }

    fn show_info(&self, message: &str) {
        let client = self.client.clone();
        let message = message.to_string();
        tokio::spawn(async move { client.show_message(MessageType::INFO, message).await });
    }

    fn annotations_changed(&self) {
        if self.capabilities.code_lens_refresh {
            self.send(HostMessage::Refresh);
        }
    }

    fn begin_progress(&self, key: &str, title: &str) {
        if self.capabilities.work_done_progress {
            self.send(HostMessage::BeginProgress {
                key: key.to_string(),
                title: title.to_string(),
            });
        }
    }

    fn end_progress(&self, key: &str) {
        if self.capabilities.work_done_progress {
            self.send(HostMessage::EndProgress {
                key: key.to_string(),
            });
        }
    }
}
