//! Command-line interface definition for Neochat
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for chatting, model management, history browsing,
//! rendering, and session settings.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Neochat - chat with models served by a local Ollama instance
///
/// Conversations and settings persist between runs; replies stream
/// into the terminal as they arrive.
#[derive(Parser, Debug, Clone)]
#[command(name = "neochat")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    pub json_logs: bool,

    /// Override the model server base URL
    #[arg(long)]
    pub host: Option<String>,

    /// Override the storage directory
    #[arg(long)]
    pub storage_path: Option<PathBuf>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Neochat
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start an interactive chat
    Chat {
        /// Model to chat with (defaults to the selected model)
        #[arg(short, long)]
        model: Option<String>,

        /// Continue an existing conversation by id
        #[arg(long)]
        conversation: Option<String>,
    },

    /// Manage models available on the server
    Models {
        /// Model management subcommand
        #[command(subcommand)]
        command: ModelCommand,
    },

    /// Browse stored conversations
    History {
        /// History subcommand
        #[command(subcommand)]
        command: HistoryCommand,
    },

    /// Render Markdown (file or stdin) to sanitized HTML
    Render {
        /// Input file; stdin when omitted
        file: Option<PathBuf>,
    },

    /// Copy a code block from a stored message to the clipboard
    Copy {
        /// Conversation id
        conversation: String,

        /// Zero-based message index within the conversation
        message: usize,

        /// Zero-based code block index within the message
        #[arg(default_value_t = 0)]
        block: usize,
    },

    /// Show or change persisted session settings
    Settings {
        /// Settings subcommand
        #[command(subcommand)]
        command: SettingsCommand,
    },
}

/// Model management subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ModelCommand {
    /// List available models
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Persist the model used by future chats
    Select {
        /// Model id as reported by the server (e.g. llama3:8b)
        model: String,
    },
}

/// History subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum HistoryCommand {
    /// List stored conversations
    List,

    /// Print the messages of a conversation
    Show {
        /// Conversation id
        id: String,

        /// Print rendered HTML instead of raw text
        #[arg(long)]
        html: bool,
    },
}

/// Settings subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum SettingsCommand {
    /// Print the persisted settings
    Show,

    /// Persist a new model server base URL
    SetUrl {
        /// Base URL, e.g. http://localhost:11434
        url: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            verbose: false,
            json_logs: false,
            host: None,
            storage_path: None,
            command: Commands::Settings {
                command: SettingsCommand::Show,
            },
        }
    }
}
