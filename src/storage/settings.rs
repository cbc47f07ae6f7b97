use super::{keys, PersistenceGateway};
use crate::config::validate_server_url;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Scalars persisted independently of any conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Model chosen for new chats, if any
    pub selected_model: Option<String>,
    /// Base URL of the model server
    pub server_url: String,
}

impl SessionSettings {
    /// Load settings, using `default_url` when no URL has been persisted
    pub fn load(gateway: &PersistenceGateway, default_url: &str) -> Self {
        Self {
            selected_model: gateway.load(keys::SELECTED_MODEL, None),
            server_url: gateway.load(keys::SERVER_URL, default_url.to_string()),
        }
    }

    /// Persist a newly selected model
    pub fn save_model(&mut self, gateway: &PersistenceGateway, model: impl Into<String>) {
        let model = model.into();
        gateway.save_or_log(keys::SELECTED_MODEL, &model);
        self.selected_model = Some(model);
    }

    /// Persist a new server URL after validating it
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `url` is not an http(s) URL
    pub fn save_url(&mut self, gateway: &PersistenceGateway, url: &str) -> Result<()> {
        validate_server_url(url)?;
        let url = url.trim_end_matches('/').to_string();
        gateway.save_or_log(keys::SERVER_URL, &url);
        self.server_url = url;
        Ok(())
    }
}
