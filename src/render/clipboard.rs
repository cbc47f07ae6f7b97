//! Copying code blocks to the clipboard
//!
//! Rendered copy buttons only carry a `data-code-index`; the action behind
//! them is a [`CodeCopier`] holding an injected [`ClipboardWriter`].
//! [`CopyFeedback`] tracks the button label, which shows "Copied!" or
//! "Error" for two seconds before reverting to "Copy".

use crate::error::{NeochatError, TypedResult};
use crate::render::RenderedMessage;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How long a copy result stays visible
pub const FEEDBACK_WINDOW: Duration = Duration::from_secs(2);

/// Anything that can receive text
pub trait ClipboardWriter: Send + Sync {
    /// Replace the clipboard contents with `text`
    fn write_text(&self, text: &str) -> TypedResult<()>;
}

/// The operating system clipboard
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

impl ClipboardWriter for SystemClipboard {
    fn write_text(&self, text: &str) -> TypedResult<()> {
        let mut clipboard = arboard::Clipboard::new()
            .map_err(|e| NeochatError::ClipboardFailure(format!("clipboard unavailable: {}", e)))?;
        clipboard
            .set_text(text.to_string())
            .map_err(|e| NeochatError::ClipboardFailure(e.to_string()))
    }
}

/// State of a copy button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyStatus {
    Idle,
    Copied,
    Failed,
}

impl CopyStatus {
    /// Button text for this state
    pub fn label(&self) -> &'static str {
        match self {
            CopyStatus::Idle => "Copy",
            CopyStatus::Copied => "Copied!",
            CopyStatus::Failed => "Error",
        }
    }
}

/// Transient result shown on a copy button
#[derive(Debug, Clone, Copy)]
pub struct CopyFeedback {
    status: CopyStatus,
    since: Option<Instant>,
}

impl Default for CopyFeedback {
    fn default() -> Self {
        Self {
            status: CopyStatus::Idle,
            since: None,
        }
    }
}

impl CopyFeedback {
    /// A button that has not been used
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of a copy made at `at`
    pub fn record<T>(&mut self, result: &TypedResult<T>, at: Instant) {
        self.status = if result.is_ok() {
            CopyStatus::Copied
        } else {
            CopyStatus::Failed
        };
        self.since = Some(at);
    }

    /// State as seen at `now`; reverts to idle once the window has passed
    pub fn status_at(&self, now: Instant) -> CopyStatus {
        match self.since {
            Some(since) if now.saturating_duration_since(since) < FEEDBACK_WINDOW => self.status,
            _ => CopyStatus::Idle,
        }
    }

    /// Button text as seen at `now`
    pub fn label_at(&self, now: Instant) -> &'static str {
        self.status_at(now).label()
    }

    /// Button text right now
    pub fn label(&self) -> &'static str {
        self.label_at(Instant::now())
    }
}

/// Copies code blocks of rendered messages through a [`ClipboardWriter`]
#[derive(Clone)]
pub struct CodeCopier {
    writer: Arc<dyn ClipboardWriter>,
}

impl CodeCopier {
    /// Create a copier writing to `writer`
    pub fn new(writer: Arc<dyn ClipboardWriter>) -> Self {
        Self { writer }
    }

    /// A copier for the system clipboard
    pub fn system() -> Self {
        Self::new(Arc::new(SystemClipboard))
    }

    /// Copy block `index` of `rendered`, recording the outcome in `feedback`
    ///
    /// # Errors
    ///
    /// Returns `NeochatError::ClipboardFailure` when the index is out of
    /// range or the writer fails
    pub fn copy(
        &self,
        rendered: &RenderedMessage,
        index: usize,
        feedback: &mut CopyFeedback,
    ) -> TypedResult<()> {
        let result = match rendered.code_blocks.get(index) {
            Some(block) => self.writer.write_text(&block.code),
            None => Err(NeochatError::ClipboardFailure(format!(
                "no code block at index {}",
                index
            ))),
        };

        if let Err(e) = &result {
            tracing::warn!("Copy failed: {}", e);
        }
        feedback.record(&result, Instant::now());
        result
    }
}
