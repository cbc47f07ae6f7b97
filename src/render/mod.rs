//! Message rendering
//!
//! Turns raw model or user text into HTML that is safe to display. The
//! stages run in a fixed order:
//!
//! 1. [`tags`] splits out `<think>` reasoning and unwraps `<answer>` blocks
//! 2. [`markdown`] renders each run of Markdown, highlighting code via
//!    [`highlight`]
//! 3. reasoning is wrapped in a disclosure widget, open while it streams
//! 4. [`sanitize`] neutralizes embedded scripts and `javascript:` links
//!
//! Rendering is a pure function of the raw text, so re-rendering a growing
//! stream never nests widgets.

pub mod clipboard;
pub mod highlight;
pub mod markdown;
pub mod sanitize;
pub mod tags;

pub use clipboard::{ClipboardWriter, CodeCopier, CopyFeedback, CopyStatus, SystemClipboard};
pub use markdown::CodeBlock;

use crate::error::{NeochatError, TypedResult};
use markdown::markdown_to_html;
use sanitize::sanitize_html;
use serde::Serialize;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use tags::{parse_segments, Segment};

/// Summary line of the reasoning disclosure widget
const THINK_SUMMARY: &str = "💭 Thinking process (click to expand)";

/// Shown while a reasoning block has no content yet
const THINK_PLACEHOLDER: &str = "<em>Thinking…</em>";

/// HTML for a message plus the sources behind its copy buttons
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenderedMessage {
    pub html: String,
    /// Indexed by each copy button's `data-code-index`
    pub code_blocks: Vec<CodeBlock>,
}

/// Escape text for inclusion in HTML content or attribute values
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

fn think_widget(content: &str, complete: bool, blocks: &mut Vec<CodeBlock>) -> String {
    let body = markdown_to_html(content.trim(), blocks);
    let body = if body.is_empty() && !complete {
        THINK_PLACEHOLDER.to_string()
    } else {
        body
    };
    let open = if complete { "" } else { " open" };

    format!(
        "<details class=\"think-accordion\"{open}><summary class=\"think-summary\">{summary}</summary><div class=\"think-content\">{body}</div></details>\n",
        open = open,
        summary = THINK_SUMMARY,
        body = body,
    )
}

fn render_document(raw: &str) -> RenderedMessage {
    let mut html = String::new();
    let mut blocks = Vec::new();
    let mut pending = String::new();

    for segment in parse_segments(raw) {
        match segment {
            Segment::Plain(text) | Segment::Answer(text) => pending.push_str(text),
            Segment::Think { content, complete } => {
                html.push_str(&markdown_to_html(&pending, &mut blocks));
                pending.clear();
                html.push_str(&think_widget(content, complete, &mut blocks));
            }
        }
    }
    html.push_str(&markdown_to_html(&pending, &mut blocks));

    RenderedMessage {
        html: sanitize_html(&html),
        code_blocks: blocks,
    }
}

/// Renders message text, optionally wired to a clipboard for copy buttons
#[derive(Clone, Default)]
pub struct Renderer {
    copier: Option<CodeCopier>,
}

impl Renderer {
    /// A renderer without a copy action
    pub fn new() -> Self {
        Self::default()
    }

    /// A renderer whose copy buttons write through `copier`
    pub fn with_copier(copier: CodeCopier) -> Self {
        Self {
            copier: Some(copier),
        }
    }

    /// Render `raw`, reporting internal failures
    ///
    /// # Errors
    ///
    /// Returns `NeochatError::RenderFailure` if the Markdown or highlighting
    /// stage fails internally
    pub fn try_render(&self, raw: &str) -> TypedResult<RenderedMessage> {
        if raw.is_empty() {
            return Ok(RenderedMessage::default());
        }
        panic::catch_unwind(AssertUnwindSafe(|| render_document(raw))).map_err(|cause| {
            let detail = cause
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| cause.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "renderer panicked".to_string());
            NeochatError::RenderFailure(detail)
        })
    }

    /// Render `raw`; on internal failure, the escaped raw text is returned
    pub fn render_message(&self, raw: &str) -> RenderedMessage {
        match self.try_render(raw) {
            Ok(rendered) => rendered,
            Err(e) => {
                tracing::warn!("{}; showing escaped text", e);
                RenderedMessage {
                    html: escape_html(raw),
                    code_blocks: Vec::new(),
                }
            }
        }
    }

    /// Render `raw` to HTML; never fails
    pub fn render(&self, raw: &str) -> String {
        self.render_message(raw).html
    }

    /// Render any displayable value, using its string form
    pub fn render_value<T: fmt::Display + ?Sized>(&self, value: &T) -> String {
        self.render(&value.to_string())
    }

    /// Run the copy action for button `index` of `rendered`
    ///
    /// # Errors
    ///
    /// Returns `NeochatError::ClipboardFailure` if no copier is attached, the
    /// index is unknown, or the clipboard write fails
    pub fn copy_code(
        &self,
        rendered: &RenderedMessage,
        index: usize,
        feedback: &mut CopyFeedback,
    ) -> TypedResult<()> {
        match &self.copier {
            Some(copier) => copier.copy(rendered, index, feedback),
            None => {
                let result = Err(NeochatError::ClipboardFailure(
                    "no clipboard attached".to_string(),
                ));
                feedback.record(&result, std::time::Instant::now());
                result
            }
        }
    }
}

/// Render `raw` to safe HTML with a default [`Renderer`]
///
/// # Examples
///
/// ```
/// use neochat::render::render;
///
/// let html = render("**hi** <script>alert(1)</script>");
/// assert!(html.contains("<strong>hi</strong>"));
/// assert!(!html.contains("<script>"));
/// ```
pub fn render(raw: &str) -> String {
    Renderer::new().render(raw)
}
