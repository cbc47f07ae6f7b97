//! Base provider types and the chat backend abstraction
//!
//! These are the wire-level shapes shared by every backend: the role/content
//! pairs sent to the server, the raw model records it lists, and the stream of
//! content fragments a chat request produces.

use crate::error::Result;
use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person chatting
    User,
    /// The model
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A role/content pair as sent to the chat endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender
    pub role: Role,
    /// Message text
    pub content: String,
}

impl ChatMessage {
    /// Creates a user message
    ///
    /// # Examples
    ///
    /// ```
    /// use neochat::providers::{ChatMessage, Role};
    ///
    /// let msg = ChatMessage::user("Hello");
    /// assert_eq!(msg.role, Role::User);
    /// ```
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Creates an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A model record as reported by the server's listing endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    /// Canonical name, possibly carrying a `:tag`
    pub name: String,
    /// Size of the weights in bytes
    #[serde(default)]
    pub size: Option<u64>,
    /// Last modification time as reported
    #[serde(default)]
    pub modified_at: Option<String>,
    /// Content digest
    #[serde(default)]
    pub digest: Option<String>,
    /// Free-form detail fields (family, format, parameter_size, ...)
    #[serde(default)]
    pub details: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Incremental content fragments of one chat response
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// A model server able to list models and stream chat completions
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// List the models available on the server
    async fn list_models(&self) -> Result<Vec<ModelRecord>>;

    /// Start a streaming chat completion
    ///
    /// The returned stream yields content fragments in arrival order (not
    /// the running total) and ends when the server signals completion.
    async fn chat_stream(&self, model: &str, messages: &[ChatMessage]) -> Result<DeltaStream>;
}
