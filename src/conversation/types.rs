use crate::providers::{ChatMessage, Role};
use chrono::Local;
use serde::{Deserialize, Serialize};

/// An entry in the conversation list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// Millisecond creation timestamp, as a string
    pub id: String,
    /// Display title; "New Chat" until generated or renamed
    pub title: String,
    /// Recency label such as "Today"
    pub category: String,
}

/// Server-side details attached to an assistant reply
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMetadata {
    /// Model that produced the reply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Server-assigned identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// One message in a conversation log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
    /// Display timestamp (RFC 3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Set while an assistant reply is still arriving
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub streaming: bool,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            metadata: None,
            timestamp: Some(Local::now().to_rfc3339()),
            streaming: false,
        }
    }

    /// A user message stamped with the current time
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// An assistant message stamped with the current time
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Attach the producing model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.metadata
            .get_or_insert_with(MessageMetadata::default)
            .model = Some(model.into());
        self
    }

    /// The role/content pair sent to the server
    pub fn to_chat_message(&self) -> ChatMessage {
        ChatMessage {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

/// Convert a log into the history sent with a chat request
pub fn to_chat_messages(messages: &[Message]) -> Vec<ChatMessage> {
    messages.iter().map(Message::to_chat_message).collect()
}

/// A title change, delivered to subscribers of the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameEvent {
    pub conversation_id: String,
    pub title: String,
}
