//! Conversation title generation
//!
//! Titles are produced by asking the model for a short summary of the first
//! user message and cleaning whatever comes back. Cleaning runs on every
//! partial response so the title can update live while it streams.

use crate::render::tags::{leading_orphan_think_end, parse_segments};

/// Title given to new conversations and used when generation yields nothing
pub const FALLBACK_TITLE: &str = "New Chat";

/// Maximum number of words kept in a title
pub const MAX_TITLE_WORDS: usize = 7;

/// Instruction sent ahead of the user's message
const TITLE_INSTRUCTION: &str = "Generate a short descriptive title (at most 7 words) for the \
following request. Do not use markup, quotes or punctuation decoration. Respond with the title \
only.\n\nRequest: ";

/// Markdown punctuation removed from titles
const MARKUP_CHARS: &[char] = &['*', '_', '`', '#', '~', '>', '[', ']', '|', '"'];

/// Build the title-generation prompt for a user message
///
/// # Examples
///
/// ```
/// use neochat::conversation::title::title_prompt;
///
/// let prompt = title_prompt("How do I reverse a list in Python?");
/// assert!(prompt.ends_with("How do I reverse a list in Python?"));
/// ```
pub fn title_prompt(user_content: &str) -> String {
    format!("{}{}", TITLE_INSTRUCTION, user_content)
}

/// Reduce raw model output to a plain title of at most seven words
///
/// Thinking content is removed entirely, including an unterminated trailing
/// block and reasoning closed by a `</think>` with no opener. Answer markers
/// and Markdown punctuation are stripped and whitespace is collapsed. The
/// result may be empty. Cleaning a cleaned title returns it unchanged.
///
/// # Examples
///
/// ```
/// use neochat::conversation::title::clean_title;
///
/// assert_eq!(
///     clean_title("<think>user wants a title</think>**Reversing Lists in Python**"),
///     "Reversing Lists in Python"
/// );
/// ```
pub fn clean_title(raw: &str) -> String {
    let text = match leading_orphan_think_end(raw) {
        Some(end) => &raw[end..],
        None => raw,
    };

    let visible: String = parse_segments(text)
        .into_iter()
        .filter(|s| !s.is_think())
        .map(|s| s.text())
        .collect::<Vec<_>>()
        .join(" ");

    let stripped: String = visible
        .chars()
        .filter(|c| !MARKUP_CHARS.contains(c))
        .collect();

    stripped
        .split_whitespace()
        .take(MAX_TITLE_WORDS)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Tracks the best title seen during one generation
///
/// Each method returns the title to apply, if any.
#[derive(Debug, Default, Clone)]
pub struct TitleTracker {
    last_good: Option<String>,
}

impl TitleTracker {
    /// Start with no good title
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recent non-empty cleaned title
    pub fn last_good(&self) -> Option<&str> {
        self.last_good.as_deref()
    }

    /// Clean a partial response; returns a title worth showing now
    pub fn on_delta(&mut self, accumulated: &str) -> Option<String> {
        let cleaned = clean_title(accumulated);
        if cleaned.is_empty() || cleaned == FALLBACK_TITLE {
            return None;
        }
        self.last_good = Some(cleaned.clone());
        Some(cleaned)
    }

    /// Final title from the complete response
    pub fn on_done(&mut self, final_text: &str) -> String {
        let cleaned = clean_title(final_text);
        if !cleaned.is_empty() {
            self.last_good = Some(cleaned.clone());
            return cleaned;
        }
        self.fallback()
    }

    /// Title to settle on after a failure or cancellation
    pub fn on_error(&self) -> String {
        self.fallback()
    }

    fn fallback(&self) -> String {
        self.last_good
            .clone()
            .unwrap_or_else(|| FALLBACK_TITLE.to_string())
    }
}
