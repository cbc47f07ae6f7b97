//! Model directory
//!
//! Lists the models on the server and normalizes them for display: a short
//! display name, a link to the registry the weights came from, and a
//! human-readable size.

use crate::error::{NeochatError, Result};
use crate::providers::{ChatBackend, ModelRecord};
use serde::Serialize;
use std::sync::Arc;

/// Registry prefix for models pulled from Hugging Face
const HF_PREFIX: &str = "hf.co/";

/// Suffix stripped from Hugging Face repository names for display
const FORMAT_SUFFIX: &str = "-gguf";

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
const MIB: f64 = 1024.0 * 1024.0;

/// A model as presented to the user
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelDescriptor {
    /// Canonical server-side name, possibly with a `:tag`
    pub id: String,
    /// Name with tag and registry path stripped
    pub name: String,
    /// Architecture family, or "Unknown"
    pub arch: String,
    /// Formatted size, or "Unknown"
    pub size: String,
    /// Upper-cased weight format, or "Unknown"
    pub format: String,
    /// External reference page for the model
    pub link: String,
    /// Modification time as reported by the server
    pub modified_at: Option<String>,
    /// Raw detail fields
    pub details: serde_json::Map<String, serde_json::Value>,
}

impl From<ModelRecord> for ModelDescriptor {
    fn from(record: ModelRecord) -> Self {
        let (name, link) = derive_display(&record.name);
        let details = record.details.unwrap_or_default();

        let arch = detail_str(&details, "family")
            .map(str::to_string)
            .unwrap_or_else(|| "Unknown".to_string());
        let format = detail_str(&details, "format")
            .map(str::to_uppercase)
            .unwrap_or_else(|| "Unknown".to_string());

        Self {
            id: record.name,
            name,
            arch,
            size: format_size(record.size),
            format,
            link,
            modified_at: record.modified_at,
            details,
        }
    }
}

fn detail_str<'a>(
    details: &'a serde_json::Map<String, serde_json::Value>,
    key: &str,
) -> Option<&'a str> {
    details
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
}

/// Derive the display name and reference link for a server-side model name
///
/// # Examples
///
/// ```
/// use neochat::directory::derive_display;
///
/// let (name, link) = derive_display("llama3:8b");
/// assert_eq!(name, "llama3");
/// assert_eq!(link, "https://ollama.com/library/llama3");
/// ```
pub fn derive_display(model_name: &str) -> (String, String) {
    let base = model_name
        .split_once(':')
        .map_or(model_name, |(base, _)| base);

    if let Some(path) = base.strip_prefix(HF_PREFIX) {
        let last = path.rsplit('/').next().unwrap_or(path);
        let display = strip_suffix_ignore_case(last, FORMAT_SUFFIX);
        return (
            display.to_string(),
            format!("https://huggingface.co/{}", path),
        );
    }

    (
        base.to_string(),
        format!("https://ollama.com/library/{}", base),
    )
}

fn strip_suffix_ignore_case<'a>(s: &'a str, suffix: &str) -> &'a str {
    if s.len() >= suffix.len() {
        let split = s.len() - suffix.len();
        if s.is_char_boundary(split) && s[split..].eq_ignore_ascii_case(suffix) {
            return &s[..split];
        }
    }
    s
}

/// Format a byte count as "X.YGB" (at least 1 GiB) or "NMB"
///
/// Zero and absent sizes read "Unknown".
pub fn format_size(bytes: Option<u64>) -> String {
    match bytes {
        None | Some(0) => "Unknown".to_string(),
        Some(bytes) => {
            // Ties round up, not to even
            let gb = bytes as f64 / GIB;
            if gb >= 1.0 {
                format!("{:.1}GB", (gb * 10.0).round() / 10.0)
            } else {
                format!("{:.0}MB", (bytes as f64 / MIB).round())
            }
        }
    }
}

/// Keep a stored selection when the server still lists it, else pick the first model
pub fn resolve_selected_model(models: &[ModelDescriptor], stored: Option<&str>) -> Option<String> {
    if let Some(stored) = stored {
        if models.iter().any(|m| m.id == stored) {
            return Some(stored.to_string());
        }
        tracing::debug!("Stored model '{}' is no longer available", stored);
    }
    models.first().map(|m| m.id.clone())
}

/// Lists models from a chat backend
pub struct ModelDirectory {
    backend: Arc<dyn ChatBackend>,
}

impl ModelDirectory {
    /// Create a directory over `backend`
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self { backend }
    }

    /// Fetch and normalize the available models
    ///
    /// # Errors
    ///
    /// Returns `NeochatError::DirectoryUnavailable` when the fetch fails for
    /// any reason; nothing is retried
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use neochat::directory::ModelDirectory;
    /// use neochat::error::NeochatError;
    /// use neochat::providers::OllamaClient;
    ///
    /// # tokio_test::block_on(async {
    /// // Nothing listens on the discard port
    /// let client = Arc::new(OllamaClient::new("http://127.0.0.1:9").unwrap());
    /// let err = ModelDirectory::new(client).list_models().await.unwrap_err();
    /// assert!(matches!(
    ///     err.downcast_ref::<NeochatError>(),
    ///     Some(NeochatError::DirectoryUnavailable(_))
    /// ));
    /// # });
    /// ```
    pub async fn list_models(&self) -> Result<Vec<ModelDescriptor>> {
        let records = self.backend.list_models().await.map_err(|e| {
            match e.downcast::<NeochatError>() {
                Ok(NeochatError::DirectoryUnavailable(msg)) => {
                    NeochatError::DirectoryUnavailable(msg)
                }
                Ok(other) => NeochatError::DirectoryUnavailable(other.to_string()),
                Err(e) => NeochatError::DirectoryUnavailable(e.to_string()),
            }
        })?;

        Ok(records.into_iter().map(ModelDescriptor::from).collect())
    }
}
