//! Interactive chat mode handler.
//!
//! Runs a readline loop that appends each line to a conversation and streams
//! the model's reply into the terminal. Replies are mirrored into the
//! conversation store chunk by chunk, so an interrupted reply keeps what
//! had arrived. Ctrl-C while a reply streams cancels that reply only.

use crate::commands::AppContext;
use crate::conversation::{
    to_chat_messages, ConversationStore, Message, MessageMetadata, RenameEvent,
};
use crate::directory::{resolve_selected_model, ModelDirectory};
use crate::error::{NeochatError, Result};
use crate::providers::ChatBackend;
use crate::session::{StreamHandler, StreamOutcome, Streamer};
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::Receiver;
use tokio::task::JoinHandle;

/// How long to wait for pending titles when leaving the chat
const TITLE_GRACE: Duration = Duration::from_secs(5);

/// A line typed at the chat prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    /// Leave the chat
    Exit,
    /// Start a new conversation
    New,
    /// Show the available commands
    Help,
    /// A slash command that is not recognized
    Unknown(String),
    /// Text to send to the model
    Message(String),
}

/// Classify a line of input
///
/// # Examples
///
/// ```
/// use neochat::commands::chat::{parse_repl_command, ReplCommand};
///
/// assert_eq!(parse_repl_command("/exit"), ReplCommand::Exit);
/// assert_eq!(
///     parse_repl_command("hello"),
///     ReplCommand::Message("hello".to_string())
/// );
/// ```
pub fn parse_repl_command(input: &str) -> ReplCommand {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();

    match lower.as_str() {
        "/exit" | "/quit" | "exit" | "quit" => ReplCommand::Exit,
        "/new" => ReplCommand::New,
        "/help" | "/?" => ReplCommand::Help,
        other if other.starts_with('/') => ReplCommand::Unknown(trimmed.to_string()),
        _ => ReplCommand::Message(trimmed.to_string()),
    }
}

/// Start interactive chat mode
///
/// # Arguments
///
/// * `ctx` - Shared command context
/// * `model` - Model override; defaults to the selected or configured model,
///   then to the first model the server lists
/// * `conversation` - Id of a stored conversation to continue
///
/// # Errors
///
/// Returns `ConversationNotFound` for an unknown `conversation`, and
/// `DirectoryUnavailable` if a model has to be discovered and the listing
/// fails
///
/// # Examples
///
/// ```no_run
/// use neochat::commands::{chat, AppContext};
/// use neochat::config::Config;
///
/// # async fn example() -> anyhow::Result<()> {
/// let ctx = AppContext::open(Config::default(), None);
/// chat::run_chat(ctx, Some("llama3:8b".to_string()), None).await?;
/// # Ok(())
/// # }
/// ```
pub async fn run_chat(
    ctx: AppContext,
    model: Option<String>,
    conversation: Option<String>,
) -> Result<()> {
    tracing::info!("Starting interactive chat mode");

    let backend = ctx.backend()?;
    let store = ctx.store().with_backend(Arc::clone(&backend));

    if let Some(id) = &conversation {
        if store.get_conversation(id).is_none() {
            return Err(NeochatError::ConversationNotFound(id.clone()).into());
        }
    }

    let model = choose_model(&ctx, Arc::clone(&backend), model).await?;
    let streamer = Streamer::new(backend);
    let mut renames = store.subscribe();
    let mut current = conversation;
    let mut pending_titles: Vec<JoinHandle<String>> = Vec::new();

    let mut rl = DefaultEditor::new()?;

    print_welcome_banner(&model, ctx.server_url());
    if let Some(id) = &current {
        print_continuation(&store, id);
    }

    loop {
        print_renames(&mut renames);

        match rl.readline(&format!("{} ", ">>".cyan().bold())) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                rl.add_history_entry(trimmed)?;

                match parse_repl_command(trimmed) {
                    ReplCommand::Exit => break,
                    ReplCommand::New => {
                        current = None;
                        println!("{}\n", "Started a new conversation.".green());
                    }
                    ReplCommand::Help => print_help(),
                    ReplCommand::Unknown(command) => {
                        println!(
                            "{} {} (type /help for commands)\n",
                            "Unknown command:".yellow(),
                            command
                        );
                    }
                    ReplCommand::Message(text) => {
                        let id = current
                            .get_or_insert_with(|| store.create_conversation())
                            .clone();
                        let title =
                            store.append_message(&id, Message::user(text), Some(&model))?;
                        pending_titles.extend(title);

                        let outcome = send_and_stream(&store, &streamer, &id, &model).await;
                        if let Err(e) = outcome.into_result() {
                            if e.is_cancellation() {
                                tracing::debug!("Reply in {} cancelled", id);
                            } else {
                                tracing::warn!("Reply in {} failed: {}", id, e);
                            }
                        }
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                tracing::error!("Readline error: {:?}", err);
                break;
            }
        }
    }

    await_titles(pending_titles).await;
    print_renames(&mut renames);
    println!("Goodbye!");
    Ok(())
}

/// Pick the model for this chat
async fn choose_model(
    ctx: &AppContext,
    backend: Arc<dyn ChatBackend>,
    explicit: Option<String>,
) -> Result<String> {
    if let Some(model) = explicit {
        return Ok(model);
    }

    let models = ModelDirectory::new(backend).list_models().await?;
    resolve_selected_model(&models, ctx.preferred_model()).ok_or_else(|| {
        NeochatError::Config(format!(
            "No models available on {}; pull one with `ollama pull <model>`",
            ctx.server_url()
        ))
        .into()
    })
}

/// Stream a reply to the conversation's current log
///
/// Returns once the session reaches a terminal state. Ctrl-C cancels the
/// session; whatever arrived before stays in the log.
async fn send_and_stream(
    store: &ConversationStore,
    streamer: &Streamer,
    conversation_id: &str,
    model: &str,
) -> StreamOutcome {
    let history = to_chat_messages(&store.get_messages(conversation_id));
    let mut printer = TerminalReply::new(store.clone(), conversation_id, model);

    let session = streamer.begin();
    let handle = session.handle();
    println!();

    let run = session.run(model, &history, &mut printer);
    tokio::pin!(run);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            outcome = &mut run => {
                println!("\n");
                return outcome;
            }
            _ = &mut ctrl_c, if !handle.is_cancelled() => {
                tracing::debug!("Ctrl-C received while streaming");
                handle.cancel();
            }
        }
    }
}

/// Prints a streaming reply and mirrors it into the conversation store
struct TerminalReply {
    store: ConversationStore,
    conversation_id: String,
    model: String,
    printed: usize,
}

impl TerminalReply {
    fn new(store: ConversationStore, conversation_id: &str, model: &str) -> Self {
        Self {
            store,
            conversation_id: conversation_id.to_string(),
            model: model.to_string(),
            printed: 0,
        }
    }

    fn finish(&self) {
        let metadata = MessageMetadata {
            model: Some(self.model.clone()),
            id: None,
        };
        if let Err(e) = self
            .store
            .finish_streaming_message(&self.conversation_id, Some(metadata))
        {
            tracing::warn!("Failed to finalize reply: {}", e);
        }
    }
}

impl StreamHandler for TerminalReply {
    fn on_delta(&mut self, accumulated: &str) {
        if let Err(e) = self
            .store
            .update_streaming_message(&self.conversation_id, accumulated)
        {
            tracing::warn!("Failed to record reply chunk: {}", e);
        }

        if let Some(fresh) = accumulated.get(self.printed..) {
            print!("{}", fresh);
            let _ = std::io::stdout().flush();
        }
        self.printed = accumulated.len();
    }

    fn on_done(&mut self, _final_text: &str) {
        self.finish();
    }

    fn on_error(&mut self, message: &str, cancelled: bool) {
        self.finish();
        if cancelled {
            print!("\n{}", format!("[{}]", message).yellow());
        } else {
            print!("\n{}", message.red());
        }
        let _ = std::io::stdout().flush();
    }
}

/// Wait briefly for background title generation to settle
async fn await_titles(pending: Vec<JoinHandle<String>>) {
    for handle in pending.into_iter().filter(|h| !h.is_finished()) {
        match tokio::time::timeout(TITLE_GRACE, handle).await {
            Ok(Ok(title)) => tracing::debug!("Title settled: {}", title),
            Ok(Err(e)) => tracing::warn!("Title task failed: {}", e),
            Err(_) => tracing::debug!("Gave up waiting for a title"),
        }
    }
}

fn print_renames(renames: &mut Receiver<RenameEvent>) {
    while let Ok(event) = renames.try_recv() {
        println!("{} {}", "Title:".dimmed(), event.title.bold());
    }
}

fn print_welcome_banner(model: &str, server: &str) {
    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║              Neochat Interactive Chat - Welcome!             ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");
    println!("Model:  {}", model.cyan());
    println!("Server: {}\n", server);
    println!("Type '/help' for available commands, '/exit' to quit");
    println!("Press Ctrl-C while a reply streams to cancel it\n");
}

fn print_continuation(store: &ConversationStore, id: &str) {
    let Some(conversation) = store.get_conversation(id) else {
        return;
    };
    let count = store.get_messages(id).len();
    println!(
        "Continuing {} ({} messages)\n",
        conversation.title.bold(),
        count
    );
}

fn print_help() {
    println!("\nAvailable commands:");
    println!("  {}   Start a new conversation", "/new".cyan());
    println!("  {}  Show this help", "/help".cyan());
    println!("  {}  Leave the chat (also: exit, quit, Ctrl-D)", "/exit".cyan());
    println!();
}
