//! Copy command handler
//!
//! Renders a stored message and sends one of its code blocks to the
//! clipboard, reporting the same "Copied!" / "Error" feedback a copy button
//! shows.

use crate::commands::AppContext;
use crate::conversation::ConversationStore;
use crate::error::{NeochatError, Result, TypedResult};
use crate::render::{CodeCopier, CopyFeedback, CopyStatus, Renderer};
use colored::Colorize;
use std::time::Instant;

/// Copy code block `block` of message `message` in `conversation`
///
/// # Arguments
///
/// * `ctx` - Shared command context
/// * `conversation` - Conversation id
/// * `message` - Zero-based message index
/// * `block` - Zero-based code block index within the message
///
/// # Errors
///
/// Returns `ConversationNotFound` for an unknown conversation, and
/// `ClipboardFailure` when the message or block does not exist or the
/// clipboard rejects the write
pub fn copy_code_block(
    ctx: &AppContext,
    conversation: &str,
    message: usize,
    block: usize,
) -> Result<()> {
    let store = ctx.store();
    let renderer = Renderer::with_copier(CodeCopier::system());
    let mut feedback = CopyFeedback::new();

    let result = copy_from_store(&store, &renderer, conversation, message, block, &mut feedback);

    let now = Instant::now();
    let label = feedback.label_at(now);
    if feedback.status_at(now) == CopyStatus::Copied {
        println!("{}", label.green());
    } else {
        println!("{}", label.red());
    }
    result
}

/// Render the addressed message and copy one of its blocks through `renderer`
pub(crate) fn copy_from_store(
    store: &ConversationStore,
    renderer: &Renderer,
    conversation: &str,
    message: usize,
    block: usize,
    feedback: &mut CopyFeedback,
) -> Result<()> {
    if store.get_conversation(conversation).is_none() {
        return Err(NeochatError::ConversationNotFound(conversation.to_string()).into());
    }

    let messages = store.get_messages(conversation);
    let Some(target) = messages.get(message) else {
        let result: TypedResult<()> = Err(NeochatError::ClipboardFailure(format!(
            "conversation {} has no message {}",
            conversation, message
        )));
        feedback.record(&result, Instant::now());
        return result.map_err(Into::into);
    };

    let rendered = renderer.render_message(&target.content);
    renderer.copy_code(&rendered, block, feedback)?;
    tracing::info!(
        "Copied block {} of message {} in {}",
        block,
        message,
        conversation
    );
    Ok(())
}
