use crate::cli::HistoryCommand;
use crate::commands::AppContext;
use crate::conversation::{Conversation, ConversationStore, Message};
use crate::error::{NeochatError, Result};
use crate::providers::Role;
use crate::render::Renderer;
use colored::Colorize;
use prettytable::{format, Table};

/// Longest title shown in the list before truncation
const MAX_LISTED_TITLE: usize = 40;

/// Handle history commands
pub fn handle_history(ctx: &AppContext, command: HistoryCommand) -> Result<()> {
    let store = ctx.store();

    match command {
        HistoryCommand::List => list_conversations(&store),
        HistoryCommand::Show { id, html } => show_conversation(&store, &id, html),
    }
}

fn list_conversations(store: &ConversationStore) -> Result<()> {
    let conversations = store.get_conversations();

    if conversations.is_empty() {
        println!("{}", "No conversation history found.".yellow());
        return Ok(());
    }

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);

    table.add_row(prettytable::row![
        "ID".bold(),
        "Title".bold(),
        "Category".bold(),
        "Messages".bold()
    ]);

    for conversation in conversations {
        let count = store.get_messages(&conversation.id).len();
        table.add_row(prettytable::row![
            conversation.id.cyan(),
            truncate_title(&conversation.title),
            conversation.category,
            count
        ]);
    }

    println!("\nConversation History:");
    table.printstd();
    println!();
    println!(
        "Use {} to continue a conversation.",
        "neochat chat --conversation <ID>".cyan()
    );
    println!();
    Ok(())
}

fn show_conversation(store: &ConversationStore, id: &str, html: bool) -> Result<()> {
    let conversation = store
        .get_conversation(id)
        .ok_or_else(|| NeochatError::ConversationNotFound(id.to_string()))?;
    let messages = store.get_messages(id);

    print_header(&conversation, messages.len());

    let renderer = Renderer::new();
    for (index, message) in messages.iter().enumerate() {
        println!("{} {}", format!("[{}]", index).dimmed(), speaker(message));
        if html {
            println!("{}", renderer.render(&message.content));
        } else {
            println!("{}", message.content);
        }
        println!();
    }
    Ok(())
}

fn print_header(conversation: &Conversation, count: usize) {
    println!();
    println!("{}", conversation.title.bold());
    println!(
        "{} · {} · {} messages",
        conversation.id.cyan(),
        conversation.category,
        count
    );
    println!();
}

/// Label for the author of a message
fn speaker(message: &Message) -> String {
    match message.role {
        Role::User => "You".green().bold().to_string(),
        Role::Assistant => {
            let model = message
                .metadata
                .as_ref()
                .and_then(|m| m.model.as_deref());
            let label = match model {
                Some(model) => format!("Assistant ({})", model),
                None => "Assistant".to_string(),
            };
            let label = if message.streaming {
                format!("{} [incomplete]", label)
            } else {
                label
            };
            label.blue().bold().to_string()
        }
    }
}

fn truncate_title(title: &str) -> String {
    if title.chars().count() > MAX_LISTED_TITLE {
        let head: String = title.chars().take(MAX_LISTED_TITLE - 3).collect();
        format!("{}...", head)
    } else {
        title.to_string()
    }
}
