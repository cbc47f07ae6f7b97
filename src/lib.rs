//! Neochat - terminal chat client library for a local Ollama server
//!
//! This library provides the core functionality for Neochat: persisted
//! conversations, streamed model replies, automatic conversation titles and
//! safe rendering of untrusted model output.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `render`: Markdown to sanitized HTML, reasoning widgets, code highlighting
//! - `storage`: Namespaced JSON persistence over a key-value backend
//! - `providers`: Model server abstraction and the Ollama client
//! - `directory`: Model listing and display normalization
//! - `session`: Cancellable streaming chat sessions
//! - `conversation`: Conversation store, titles and recency categories
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli` / `commands`: Command-line interface and its handlers
//!
//! # Example
//!
//! ```no_run
//! use neochat::{ConversationStore, Message, PersistenceGateway};
//! use neochat::providers::create_backend;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let backend = create_backend("http://localhost:11434")?;
//!     let store = ConversationStore::load(PersistenceGateway::in_memory("neo2_"))
//!         .with_backend(backend);
//!
//!     let id = store.create_conversation();
//!     if let Some(title) = store.append_message(&id, Message::user("Hi!"), Some("llama3:8b"))? {
//!         println!("Titled: {}", title.await?);
//!     }
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod conversation;
pub mod directory;
pub mod error;
pub mod providers;
pub mod render;
pub mod session;
pub mod storage;

// Re-export commonly used types
pub use config::Config;
pub use conversation::{Conversation, ConversationStore, Message, RenameEvent};
pub use directory::{ModelDescriptor, ModelDirectory};
pub use error::{NeochatError, Result, TypedResult};
pub use render::{render, RenderedMessage, Renderer};
pub use session::{StreamHandler, StreamOutcome, Streamer, StreamingSession};
pub use storage::{PersistenceGateway, SessionSettings};
