//! Ollama client integration tests
//!
//! Runs the client, the model directory and streaming sessions against a
//! `wiremock` server speaking the `/api/tags` and `/api/chat` protocol.

mod common;

use std::sync::Arc;

use futures::StreamExt;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use neochat::directory::ModelDirectory;
use neochat::error::NeochatError;
use neochat::providers::{ChatBackend, ChatMessage, OllamaClient};
use neochat::session::{StreamCallbacks, StreamOutcome, StreamingSession};

#[tokio::test]
async fn test_directory_lists_and_normalizes_models() {
    let server = MockServer::start().await;
    common::mount_tags(&server).await;

    let client = Arc::new(OllamaClient::new(server.uri()).unwrap());
    let models = ModelDirectory::new(client).list_models().await.unwrap();

    assert_eq!(models.len(), 2);
    assert_eq!(models[0].id, "llama3:8b");
    assert_eq!(models[0].name, "llama3");
    assert_eq!(models[0].arch, "llama");
    assert_eq!(models[0].size, "1.5GB");
    assert_eq!(models[0].format, "GGUF");
    assert_eq!(models[0].link, "https://ollama.com/library/llama3");
    assert_eq!(
        models[0].details.get("parameter_size"),
        Some(&json!("8B"))
    );

    assert_eq!(models[1].name, "Qwen3-4B");
    assert_eq!(models[1].size, "50MB");
    assert_eq!(
        models[1].link,
        "https://huggingface.co/bartowski/Qwen3-4B-GGUF"
    );
}

#[tokio::test]
async fn test_trailing_slash_in_base_url_is_tolerated() {
    let server = MockServer::start().await;
    common::mount_tags(&server).await;

    let client = OllamaClient::new(format!("{}/", server.uri())).unwrap();
    assert_eq!(client.list_models().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_directory_error_status_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "boom"})))
        .mount(&server)
        .await;

    let client = Arc::new(OllamaClient::new(server.uri()).unwrap());
    let err = ModelDirectory::new(client).list_models().await.unwrap_err();

    match err.downcast_ref::<NeochatError>() {
        Some(NeochatError::DirectoryUnavailable(msg)) => assert!(msg.contains("boom")),
        other => panic!("expected DirectoryUnavailable, got {:?}", other),
    }
}

#[tokio::test]
async fn test_directory_unreachable_server_is_unavailable() {
    // Nothing listens on the discard port
    let client = Arc::new(OllamaClient::new("http://127.0.0.1:9").unwrap());
    let err = ModelDirectory::new(client).list_models().await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<NeochatError>(),
        Some(NeochatError::DirectoryUnavailable(_))
    ));
}

#[tokio::test]
async fn test_chat_stream_sends_history_and_yields_fragments() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({
            "model": "llama3:8b",
            "stream": true,
            "messages": [
                { "role": "user", "content": "Hi" },
                { "role": "assistant", "content": "Hello" },
                { "role": "user", "content": "How are you?" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            common::ndjson_chat_body(&["Fine", ", ", "thanks"]),
            "application/x-ndjson",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let client = OllamaClient::new(server.uri()).unwrap();
    let history = vec![
        ChatMessage::user("Hi"),
        ChatMessage::assistant("Hello"),
        ChatMessage::user("How are you?"),
    ];

    let fragments: Vec<String> = client
        .chat_stream("llama3:8b", &history)
        .await
        .unwrap()
        .map(|r| r.unwrap())
        .collect()
        .await;

    assert_eq!(fragments, vec!["Fine", ", ", "thanks"]);
}

#[tokio::test]
async fn test_session_over_http_delivers_accumulated_text() {
    let server = MockServer::start().await;
    common::mount_chat(&server, &["<think>hm</think>", "The answer", " is 42."]).await;

    let client = Arc::new(OllamaClient::new(server.uri()).unwrap());
    let deltas = Arc::new(std::sync::Mutex::new(Vec::new()));
    let seen = Arc::clone(&deltas);
    let mut callbacks =
        StreamCallbacks::new().with_delta(move |text| seen.lock().unwrap().push(text.to_string()));

    let outcome = StreamingSession::new(client)
        .run("llama3:8b", &[ChatMessage::user("?")], &mut callbacks)
        .await;

    assert_eq!(
        outcome,
        StreamOutcome::Completed("<think>hm</think>The answer is 42.".to_string())
    );
    let deltas = deltas.lock().unwrap();
    assert_eq!(deltas.len(), 3);
    assert_eq!(deltas[1], "<think>hm</think>The answer");
}

#[tokio::test]
async fn test_chat_error_status_fails_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"error": "model 'nope' not found"})),
        )
        .mount(&server)
        .await;

    let client = Arc::new(OllamaClient::new(server.uri()).unwrap());
    let errors = Arc::new(std::sync::Mutex::new(Vec::new()));
    let seen = Arc::clone(&errors);
    let mut callbacks = StreamCallbacks::new()
        .with_error(move |msg, cancelled| seen.lock().unwrap().push((msg.to_string(), cancelled)));

    let outcome = StreamingSession::new(client)
        .run("nope", &[ChatMessage::user("?")], &mut callbacks)
        .await;

    let StreamOutcome::Failed(message) = outcome else {
        panic!("expected failure, got {:?}", outcome);
    };
    assert!(message.starts_with("Error: "));
    assert!(message.contains("model 'nope' not found"));

    let errors = errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(!errors[0].1);
}

#[tokio::test]
async fn test_error_chunk_mid_stream_fails_after_partial_text() {
    let server = MockServer::start().await;
    let body = concat!(
        "{\"message\":{\"role\":\"assistant\",\"content\":\"partial\"},\"done\":false}\n",
        "{\"error\":\"out of memory\"}\n"
    );
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
        .mount(&server)
        .await;

    let client = Arc::new(OllamaClient::new(server.uri()).unwrap());
    let mut callbacks = StreamCallbacks::new();
    let outcome = StreamingSession::new(client)
        .run("llama3:8b", &[ChatMessage::user("?")], &mut callbacks)
        .await;

    assert_eq!(outcome, StreamOutcome::Failed("Error: out of memory".to_string()));
}
