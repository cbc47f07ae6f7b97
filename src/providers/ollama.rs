//! Ollama backend for Neochat
//!
//! Talks to an Ollama server over HTTP: `/api/tags` for the model list and
//! `/api/chat` with `stream: true` for completions. The chat response is a
//! newline-delimited JSON body; each line carries a content fragment and the
//! last one has `done: true`.

use crate::error::{NeochatError, Result};
use crate::providers::{ChatBackend, ChatMessage, DeltaStream, ModelRecord};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// HTTP client for an Ollama server
///
/// No request timeout is configured: a stalled stream stays open until the
/// session reading it is cancelled.
///
/// # Examples
///
/// ```
/// use neochat::providers::OllamaClient;
///
/// let client = OllamaClient::new("http://localhost:11434").unwrap();
/// assert_eq!(client.base_url(), "http://localhost:11434");
/// ```
pub struct OllamaClient {
    client: Client,
    base_url: String,
}

/// Response from Ollama's /api/tags endpoint
#[derive(Debug, Deserialize)]
struct OllamaTagsResponse {
    #[serde(default)]
    models: Vec<ModelRecord>,
}

/// Request body for /api/chat
#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

/// One line of a streamed /api/chat response
#[derive(Debug, Deserialize)]
struct OllamaChatChunk {
    #[serde(default)]
    message: Option<OllamaChunkMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaChunkMessage {
    #[serde(default)]
    content: String,
}

/// Error body returned with non-success statuses
#[derive(Debug, Deserialize)]
struct OllamaErrorBody {
    error: String,
}

impl OllamaClient {
    /// Create a client for the server at `base_url`
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = Client::builder()
            .user_agent(concat!("neochat/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| NeochatError::Config(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!("Initialized Ollama client: host={}", base_url);

        Ok(Self { client, base_url })
    }

    /// The server base URL without trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

/// Pull a readable message out of an error response body
fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<OllamaErrorBody>(body) {
        Ok(parsed) => format!("Ollama returned error {}: {}", status, parsed.error),
        Err(_) if body.trim().is_empty() => format!("Ollama returned error {}", status),
        Err(_) => format!("Ollama returned error {}: {}", status, body.trim()),
    }
}

#[async_trait]
impl ChatBackend for OllamaClient {
    async fn list_models(&self) -> Result<Vec<ModelRecord>> {
        let url = self.endpoint("api/tags");
        tracing::debug!("Fetching models from Ollama: {}", url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            tracing::warn!("Failed to fetch Ollama models: {}", e);
            NeochatError::DirectoryUnavailable(format!("Failed to connect to Ollama server: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Ollama returned error {}: {}", status, body);
            return Err(NeochatError::DirectoryUnavailable(error_message(status, &body)).into());
        }

        let tags: OllamaTagsResponse = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse Ollama tags response: {}", e);
            NeochatError::DirectoryUnavailable(format!("Failed to parse Ollama response: {}", e))
        })?;

        tracing::debug!("Fetched {} models from Ollama", tags.models.len());
        Ok(tags.models)
    }

    async fn chat_stream(&self, model: &str, messages: &[ChatMessage]) -> Result<DeltaStream> {
        let url = self.endpoint("api/chat");
        tracing::debug!(
            "Starting chat stream: model={}, messages={}",
            model,
            messages.len()
        );

        let request = OllamaChatRequest {
            model,
            messages,
            stream: true,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| NeochatError::StreamFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Ollama chat returned error {}: {}", status, body);
            return Err(NeochatError::StreamFailed(error_message(status, &body)).into());
        }

        Ok(Box::pin(parse_chat_stream(Box::pin(response.bytes_stream()))))
    }
}

/// Line-splitting state for an NDJSON chat body
struct NdjsonState<S> {
    inner: S,
    buffer: Vec<u8>,
    queue: VecDeque<Result<String>>,
    finished: bool,
}

impl<S> NdjsonState<S> {
    fn drain_lines(&mut self) {
        while !self.finished {
            let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') else {
                break;
            };
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.handle_line(&line[..line.len() - 1]);
        }
    }

    fn drain_remainder(&mut self) {
        if !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            self.handle_line(&line);
        }
        self.finished = true;
    }

    fn handle_line(&mut self, line: &[u8]) {
        let line = match std::str::from_utf8(line) {
            Ok(s) => s.trim(),
            Err(e) => {
                self.fail(format!("Invalid UTF-8 in chat stream: {}", e));
                return;
            }
        };
        if line.is_empty() {
            return;
        }

        let chunk: OllamaChatChunk = match serde_json::from_str(line) {
            Ok(chunk) => chunk,
            Err(e) => {
                self.fail(format!("Malformed chat chunk: {}", e));
                return;
            }
        };

        if let Some(error) = chunk.error {
            self.fail(error);
            return;
        }

        if let Some(message) = chunk.message {
            if !message.content.is_empty() {
                self.queue.push_back(Ok(message.content));
            }
        }

        if chunk.done {
            self.finished = true;
        }
    }

    fn fail(&mut self, message: String) {
        tracing::warn!("Chat stream failed: {}", message);
        self.queue
            .push_back(Err(NeochatError::StreamFailed(message).into()));
        self.finished = true;
    }
}

/// Turn an NDJSON `/api/chat` body into a stream of content fragments
///
/// The stream ends after the chunk marked `done`, when the body closes, or
/// right after the first error item.
pub fn parse_chat_stream<S>(byte_stream: S) -> impl Stream<Item = Result<String>> + Send
where
    S: Stream<Item = reqwest::Result<Bytes>> + Send + Unpin + 'static,
{
    let state = NdjsonState {
        inner: byte_stream,
        buffer: Vec::new(),
        queue: VecDeque::new(),
        finished: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.queue.pop_front() {
                if item.is_err() {
                    state.queue.clear();
                }
                return Some((item, state));
            }
            if state.finished {
                return None;
            }
            match state.inner.next().await {
                Some(Ok(chunk)) => {
                    state.buffer.extend_from_slice(&chunk);
                    state.drain_lines();
                }
                Some(Err(e)) => state.fail(e.to_string()),
                None => state.drain_remainder(),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(parts: &[&str]) -> impl Stream<Item = reqwest::Result<Bytes>> + Send + Unpin {
        futures::stream::iter(
            parts
                .iter()
                .map(|p| Ok(Bytes::from(p.to_string())))
                .collect::<Vec<_>>(),
        )
    }

    async fn collect(parts: &[&str]) -> Vec<std::result::Result<String, String>> {
        parse_chat_stream(body(parts))
            .map(|item| item.map_err(|e| e.to_string()))
            .collect()
            .await
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = OllamaClient::new("http://localhost:11434/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:11434");
        assert_eq!(client.endpoint("api/tags"), "http://localhost:11434/api/tags");
    }

    #[tokio::test]
    async fn test_parse_stream_yields_fragments_until_done() {
        let items = collect(&[
            "{\"message\":{\"role\":\"assistant\",\"content\":\"Hel\"},\"done\":false}\n",
            "{\"message\":{\"role\":\"assistant\",\"content\":\"lo\"},\"done\":false}\n",
            "{\"message\":{\"role\":\"assistant\",\"content\":\"\"},\"done\":true}\n",
            "{\"message\":{\"role\":\"assistant\",\"content\":\"ignored\"},\"done\":false}\n",
        ])
        .await;
        assert_eq!(items, vec![Ok("Hel".to_string()), Ok("lo".to_string())]);
    }

    #[tokio::test]
    async fn test_parse_stream_handles_lines_split_across_chunks() {
        let items = collect(&[
            "{\"message\":{\"content\":\"a",
            "b\"},\"done\":false}\n{\"message\":",
            "{\"content\":\"c\"},\"done\":true}",
        ])
        .await;
        assert_eq!(items, vec![Ok("ab".to_string()), Ok("c".to_string())]);
    }

    #[tokio::test]
    async fn test_parse_stream_handles_multibyte_split() {
        let line = "{\"message\":{\"content\":\"é\"},\"done\":true}\n";
        let bytes = line.as_bytes();
        let split = line.find('é').unwrap() + 1;
        let parts = vec![
            Ok(Bytes::copy_from_slice(&bytes[..split])),
            Ok(Bytes::copy_from_slice(&bytes[split..])),
        ];
        let items: Vec<String> = parse_chat_stream(futures::stream::iter(parts))
            .map(|item| item.unwrap())
            .collect()
            .await;
        assert_eq!(items, vec!["é".to_string()]);
    }

    #[tokio::test]
    async fn test_parse_stream_reports_server_error_chunk() {
        let items = collect(&[
            "{\"message\":{\"content\":\"partial\"},\"done\":false}\n",
            "{\"error\":\"model crashed\"}\n",
            "{\"message\":{\"content\":\"after\"},\"done\":false}\n",
        ])
        .await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0], Ok("partial".to_string()));
        assert!(items[1].as_ref().unwrap_err().contains("model crashed"));
    }

    #[tokio::test]
    async fn test_parse_stream_reports_malformed_line() {
        let items = collect(&["not json\n"]).await;
        assert_eq!(items.len(), 1);
        assert!(items[0].as_ref().unwrap_err().contains("Malformed chat chunk"));
    }

    #[tokio::test]
    async fn test_parse_stream_ends_on_close_without_done() {
        let items = collect(&["{\"message\":{\"content\":\"x\"}}\n"]).await;
        assert_eq!(items, vec![Ok("x".to_string())]);
    }

    #[test]
    fn test_error_message_prefers_json_error_field() {
        let msg = error_message(
            reqwest::StatusCode::NOT_FOUND,
            r#"{"error":"model 'x' not found"}"#,
        );
        assert_eq!(msg, "Ollama returned error 404 Not Found: model 'x' not found");

        let msg = error_message(reqwest::StatusCode::BAD_GATEWAY, "");
        assert_eq!(msg, "Ollama returned error 502 Bad Gateway");
    }
}
