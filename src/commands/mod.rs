/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint:

- `chat`     - Interactive chat with streamed replies
- `models`   - List and select models on the server
- `history`  - Browse stored conversations
- `render`   - Render Markdown to sanitized HTML
- `copy`     - Copy a code block of a stored message
- `settings` - Show or change persisted session settings

Handlers share an [`AppContext`] holding the loaded configuration, the
persistence gateway and the session settings read from it.
*/

use crate::config::Config;
use crate::conversation::ConversationStore;
use crate::error::Result;
use crate::providers::{create_backend, ChatBackend};
use crate::storage::{PersistenceGateway, SessionSettings};
use std::sync::Arc;

pub mod chat;
pub mod copy;
pub mod history;
pub mod models;
pub mod render;
pub mod settings;

/// State shared by command handlers
#[derive(Clone)]
pub struct AppContext {
    /// Loaded and validated configuration
    pub config: Config,
    /// Gateway to the persisted key-value store
    pub gateway: PersistenceGateway,
    /// Selected model and server URL
    pub settings: SessionSettings,
}

impl AppContext {
    /// Open the configured store and read the session settings from it
    ///
    /// A `host_override` given on the command line wins over the persisted
    /// server URL for this run without being persisted.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use neochat::commands::AppContext;
    /// use neochat::config::Config;
    ///
    /// let ctx = AppContext::open(Config::default(), None);
    /// println!("{}", ctx.server_url());
    /// ```
    pub fn open(config: Config, host_override: Option<&str>) -> Self {
        let gateway = PersistenceGateway::open(&config.storage);
        Self::with_gateway(config, gateway, host_override)
    }

    /// Build a context over an already opened gateway
    pub fn with_gateway(
        config: Config,
        gateway: PersistenceGateway,
        host_override: Option<&str>,
    ) -> Self {
        let mut settings = SessionSettings::load(&gateway, &config.server.host);
        if let Some(host) = host_override {
            tracing::debug!("Server URL overridden for this run: {}", host);
            settings.server_url = host.trim_end_matches('/').to_string();
        }
        Self {
            config,
            gateway,
            settings,
        }
    }

    /// Base URL of the model server in effect
    pub fn server_url(&self) -> &str {
        &self.settings.server_url
    }

    /// Model to use when none is given explicitly
    ///
    /// The persisted selection wins over the configured default.
    pub fn preferred_model(&self) -> Option<&str> {
        self.settings
            .selected_model
            .as_deref()
            .or(self.config.chat.default_model.as_deref())
    }

    /// Chat backend for the server URL in effect
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn backend(&self) -> Result<Arc<dyn ChatBackend>> {
        create_backend(self.server_url())
    }

    /// Load the conversation store, without a backend for title generation
    pub fn store(&self) -> ConversationStore {
        ConversationStore::load(self.gateway.clone())
    }
}
