//! Provider module for Neochat
//!
//! This module contains the model-server abstraction and the Ollama
//! implementation used by the directory, streaming sessions and the CLI.

pub mod base;
pub mod ollama;

pub use base::{ChatBackend, ChatMessage, DeltaStream, ModelRecord, Role};
pub use ollama::{parse_chat_stream, OllamaClient};

use crate::error::Result;
use std::sync::Arc;

/// Create a shared backend for the server at `base_url`
///
/// # Arguments
///
/// * `base_url` - Server base URL, with or without trailing slash
///
/// # Errors
///
/// Returns error if the HTTP client cannot be initialized
pub fn create_backend(base_url: &str) -> Result<Arc<dyn ChatBackend>> {
    Ok(Arc::new(OllamaClient::new(base_url)?))
}
