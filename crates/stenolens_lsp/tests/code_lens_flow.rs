mod common;

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use tower_lsp::lsp_types::*;
use tower_lsp::{LanguageServer, LspService};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use stenolens_lsp::{Backend, COMMANDS, TOGGLE_ANNOTATIONS_COMMAND};

use common::*;

#[tokio::test]
async fn test_initialize_advertises_code_lens_and_commands() {
    let (service, _socket) = LspService::new(Backend::new);

    let result = initialize(&service, options("http://127.0.0.1:9")).await;

    assert_eq!(
        result.capabilities.code_lens_provider,
        Some(CodeLensOptions {
            resolve_provider: Some(true)
        })
    );
    let commands = result.capabilities.execute_command_provider.unwrap().commands;
    assert_eq!(commands.len(), COMMANDS.len());
    assert!(commands.contains(&"stenolens.showExplanation".to_string()));
}

#[tokio::test]
async fn test_code_lens_before_initialize_is_empty() {
    let (service, _socket) = LspService::new(Backend::new);
    let uri = file_uri("/work/a.py");
    open(&service, &uri, "def f(): pass").await;

    assert_eq!(code_lens(&service, &uri).await, None);
}

#[tokio::test]
async fn test_code_lens_is_fetched_once_and_cached() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/autopilot"))
        .and(body_partial_json(json!({ "dry_run": false, "language": "python" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(autopilot_body(&[(1, "def f(): pass", "defines f")])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (service, _socket) = LspService::new(Backend::new);
    initialize(&service, options(&server.uri())).await;
    let uri = file_uri("/work/a.py");
    open(&service, &uri, "def f(): pass").await;

    let first = code_lens(&service, &uri).await.unwrap();
    let second = code_lens(&service, &uri).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.len(), 1);
    assert_eq!(
        first[0].range,
        Range::new(Position::new(0, 0), Position::new(0, 13))
    );
    let command = first[0].command.clone().unwrap();
    assert_eq!(command.command, "stenolens.showExplanation");
    let arguments = command.arguments.unwrap();
    assert!(arguments[0].as_str().unwrap().starts_with("defines f"));
    assert_eq!(arguments[1], json!("def f(): pass"));
}

#[tokio::test]
async fn test_unsaved_edits_reanchor_without_fetching() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/autopilot"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(autopilot_body(&[(1, "def f(): pass", "defines f")])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (service, _socket) = LspService::new(Backend::new);
    initialize(&service, options(&server.uri())).await;
    let uri = file_uri("/work/a.py");
    open(&service, &uri, "def f(): pass").await;
    code_lens(&service, &uri).await;

    change(&service, &uri, 2, "import os\n\ndef f(): pass\n").await;
    let lenses = code_lens(&service, &uri).await.unwrap();

    assert_eq!(lenses.len(), 1);
    assert_eq!(lenses[0].range.start.line, 2);
}

#[tokio::test]
async fn test_save_invalidates_and_refetches() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/autopilot"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(autopilot_body(&[(1, "def f(): pass", "defines f")])),
        )
        .expect(2)
        .mount(&server)
        .await;

    let (service, _socket) = LspService::new(Backend::new);
    initialize(&service, options(&server.uri())).await;
    let uri = file_uri("/work/a.py");
    open(&service, &uri, "def f(): pass").await;
    code_lens(&service, &uri).await;

    save(&service, &uri).await;
    let lenses = code_lens(&service, &uri).await.unwrap();

    assert_eq!(lenses.len(), 1);
}

#[tokio::test]
async fn test_lazy_lens_is_resolved_on_demand() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/autopilot"))
        .and(body_partial_json(json!({ "dry_run": true })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(dry_run_body(&[(1, "x = 1"), (2, "y = x + 1")])),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_partial_json(json!({ "code": "y = x + 1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "pm": "adds one to x",
            "code": "y = x + 1",
            "metadata": {}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (service, _socket) = LspService::new(Backend::new);
    let mut lazy = options(&server.uri());
    lazy["lazyResolve"] = json!(true);
    initialize(&service, lazy).await;
    let uri = file_uri("/work/b.py");
    open(&service, &uri, "x = 1\ny = x + 1\n").await;

    let lenses = code_lens(&service, &uri).await.unwrap();
    assert_eq!(lenses.len(), 2);
    assert!(lenses.iter().all(|lens| lens.command.is_none()));

    let resolved = service
        .inner()
        .code_lens_resolve(lenses[1].clone())
        .await
        .unwrap();
    let command = resolved.command.unwrap();
    assert!(
        command.arguments.unwrap()[0]
            .as_str()
            .unwrap()
            .starts_with("adds one to x")
    );

    let lenses = code_lens(&service, &uri).await.unwrap();
    assert!(lenses[0].command.is_none());
    assert!(lenses[1].command.is_some());
}

#[tokio::test]
async fn test_unauthorized_yields_no_lenses() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/autopilot"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": { "message": "Unauthorized POST /autopilot" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (service, _socket) = LspService::new(Backend::new);
    initialize(&service, options(&server.uri())).await;
    let uri = file_uri("/work/a.py");
    open(&service, &uri, "def f(): pass").await;

    assert_eq!(code_lens(&service, &uri).await, Some(vec![]));
}

#[tokio::test]
async fn test_toggle_command_disables_lenses() {
    let server = MockServer::start().await;
    let (service, _socket) = LspService::new(Backend::new);
    initialize(&service, options(&server.uri())).await;
    let uri = file_uri("/work/a.py");
    open(&service, &uri, "def f(): pass").await;

    let result = execute(&service, TOGGLE_ANNOTATIONS_COMMAND, vec![])
        .await
        .unwrap();

    assert_eq!(result, Some(json!({ "annotations": false })));
    assert_eq!(code_lens(&service, &uri).await, Some(vec![]));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_config_file_is_reloaded_without_settings() {
    let server = MockServer::start().await;
    let workspace = tempfile::tempdir().unwrap();
    let config_path = workspace.path().join(".stenolens.json");
    let file_config = |annotations: bool| {
        json!({
            "apiKey": "test-key",
            "baseUrl": server.uri(),
            "persist": false,
            "annotations": annotations
        })
        .to_string()
    };
    std::fs::write(&config_path, file_config(true)).unwrap();

    let (service, _socket) = LspService::new(Backend::new);
    #[allow(deprecated)]
    let params = InitializeParams {
        root_uri: Some(Url::from_directory_path(workspace.path()).unwrap()),
        ..Default::default()
    };
    service.inner().initialize(params).await.unwrap();

    std::fs::write(&config_path, file_config(false)).unwrap();
    service
        .inner()
        .did_change_configuration(DidChangeConfigurationParams {
            settings: serde_json::Value::Null,
        })
        .await;

    let uri = file_uri("/work/a.py");
    open(&service, &uri, "def f(): pass").await;
    assert_eq!(code_lens(&service, &uri).await, Some(vec![]));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_set_key_command_requires_argument() {
    let (service, _socket) = LspService::new(Backend::new);
    initialize(&service, options("http://127.0.0.1:9")).await;

    assert!(execute(&service, "stenolens.setKey", vec![]).await.is_err());
    assert!(
        execute(&service, "stenolens.setKey", vec![json!("new-key")])
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_unknown_command_is_rejected() {
    let (service, _socket) = LspService::new(Backend::new);
    initialize(&service, options("http://127.0.0.1:9")).await;

    assert!(execute(&service, "stenolens.frobnicate", vec![]).await.is_err());
}

#[tokio::test]
async fn test_server_answers_code_lens_over_transport() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/autopilot"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(autopilot_body(&[(1, "def f(): pass", "defines f")])),
        )
        .mount(&server)
        .await;

    let (client_read, server_write) = tokio::io::duplex(4096);
    let (server_read, client_write) = tokio::io::duplex(4096);
    let (service, socket) = LspService::new(Backend::new);
    tokio::spawn(async move {
        tower_lsp::Server::new(server_read, server_write, socket)
            .serve(service)
            .await;
    });

    let mut reader = tokio::io::BufReader::new(client_read);
    let mut writer = client_write;
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(msg) = recv_msg(&mut reader).await {
            if tx.send(msg).is_err() {
                break;
            }
        }
    });

    let init_req = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": { "capabilities": {}, "initializationOptions": options(&server.uri()) }
    });
    send_msg(&mut writer, &init_req.to_string()).await;
    let _resp = rx.recv().await.unwrap();
    send_msg(
        &mut writer,
        r#"{"jsonrpc":"2.0","method":"initialized","params":{}}"#,
    )
    .await;

    let uri = file_uri("/work/a.py");
    let did_open = json!({
        "jsonrpc": "2.0",
        "method": "textDocument/didOpen",
        "params": { "textDocument": {
            "uri": uri, "languageId": "python", "version": 1, "text": "def f(): pass"
        }}
    });
    send_msg(&mut writer, &did_open.to_string()).await;
    let lens_req = json!({
        "jsonrpc": "2.0",
        "id": 2,
        "method": "textDocument/codeLens",
        "params": { "textDocument": { "uri": uri } }
    });
    send_msg(&mut writer, &lens_req.to_string()).await;

    let timeout = tokio::time::sleep(Duration::from_secs(5));
    tokio::pin!(timeout);
    let response = loop {
        tokio::select! {
            msg = rx.recv() => {
                let msg = msg.expect("server closed the stream");
                let value: serde_json::Value = serde_json::from_str(&msg).unwrap();
                if value["id"] == json!(2) {
                    break value;
                }
            }
            _ = &mut timeout => panic!("no code lens response"),
        }
    };

    let lenses = response["result"].as_array().unwrap();
    assert_eq!(lenses.len(), 1);
    assert_eq!(lenses[0]["command"]["command"], "stenolens.showExplanation");
}
