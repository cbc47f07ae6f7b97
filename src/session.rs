//! Streaming chat sessions
//!
//! A [`StreamingSession`] drives one chat completion from a [`ChatBackend`]
//! and reports progress through a [`StreamHandler`]:
//!
//! - `on_delta` receives the full text accumulated so far, once per fragment
//! - exactly one of `on_done` / `on_error` fires, exactly once, at the end
//! - after [`SessionHandle::cancel`] no further `on_delta` fires and `on_error`
//!   is invoked with the cancellation flag set
//!
//! Cancellation is cooperative: it is checked before every delta, and any
//! pending network read is abandoned via `tokio::select!`.

use crate::error::{NeochatError, TypedResult};
use crate::providers::{ChatBackend, ChatMessage};
use futures::StreamExt;
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Message passed to `on_error` when a session is cancelled
pub const CANCELLED_MESSAGE: &str = "Stream cancelled";

/// Lifecycle of a streaming session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, not yet started
    Idle,
    /// Request sent, fragments arriving
    Streaming,
    /// Server signalled completion
    Completed,
    /// Stopped by the caller
    Cancelled,
    /// Network or server error
    Failed,
}

impl SessionState {
    /// Whether the session has reached a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Cancelled | SessionState::Failed
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Idle => "idle",
            SessionState::Streaming => "streaming",
            SessionState::Completed => "completed",
            SessionState::Cancelled => "cancelled",
            SessionState::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Final result of a session, mirroring the terminal callback that fired
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The full response text
    Completed(String),
    /// Cancelled; carries the text received before cancellation
    Cancelled(String),
    /// Failed with a human-readable message
    Failed(String),
}

impl StreamOutcome {
    /// The complete text, or the error matching how the session ended
    ///
    /// # Examples
    ///
    /// ```
    /// use neochat::session::StreamOutcome;
    ///
    /// let err = StreamOutcome::Cancelled("par".to_string()).into_result().unwrap_err();
    /// assert!(err.is_cancellation());
    /// ```
    pub fn into_result(self) -> TypedResult<String> {
        match self {
            StreamOutcome::Completed(text) => Ok(text),
            StreamOutcome::Cancelled(_) => Err(NeochatError::StreamCancelled),
            StreamOutcome::Failed(message) => {
                let detail = message.strip_prefix("Error: ").unwrap_or(&message);
                Err(NeochatError::StreamFailed(detail.to_string()))
            }
        }
    }
}

/// Receives the progress of a streaming session
pub trait StreamHandler: Send {
    /// Called with the accumulated response after each fragment
    fn on_delta(&mut self, accumulated: &str);

    /// Called once with the complete response
    fn on_done(&mut self, final_text: &str);

    /// Called once on failure or cancellation
    fn on_error(&mut self, message: &str, cancelled: bool);
}

type DeltaFn = Box<dyn FnMut(&str) + Send>;
type ErrorFn = Box<dyn FnMut(&str, bool) + Send>;

/// Closure-based [`StreamHandler`]
///
/// # Examples
///
/// ```
/// use neochat::session::{StreamCallbacks, StreamHandler};
///
/// let mut handler = StreamCallbacks::new()
///     .with_delta(|text| println!("{}", text))
///     .with_error(|msg, cancelled| eprintln!("{} ({})", msg, cancelled));
/// handler.on_done("final");
/// ```
#[derive(Default)]
pub struct StreamCallbacks {
    delta: Option<DeltaFn>,
    done: Option<DeltaFn>,
    error: Option<ErrorFn>,
}

impl StreamCallbacks {
    /// Callbacks that ignore every event
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the delta callback
    pub fn with_delta(mut self, f: impl FnMut(&str) + Send + 'static) -> Self {
        self.delta = Some(Box::new(f));
        self
    }

    /// Set the completion callback
    pub fn with_done(mut self, f: impl FnMut(&str) + Send + 'static) -> Self {
        self.done = Some(Box::new(f));
        self
    }

    /// Set the error callback
    pub fn with_error(mut self, f: impl FnMut(&str, bool) + Send + 'static) -> Self {
        self.error = Some(Box::new(f));
        self
    }
}

impl StreamHandler for StreamCallbacks {
    fn on_delta(&mut self, accumulated: &str) {
        if let Some(f) = self.delta.as_mut() {
            f(accumulated);
        }
    }

    fn on_done(&mut self, final_text: &str) {
        if let Some(f) = self.done.as_mut() {
            f(final_text);
        }
    }

    fn on_error(&mut self, message: &str, cancelled: bool) {
        if let Some(f) = self.error.as_mut() {
            f(message, cancelled);
        }
    }
}

/// Cloneable control over a running session
#[derive(Clone)]
pub struct SessionHandle {
    token: CancellationToken,
    state: Arc<Mutex<SessionState>>,
}

impl SessionHandle {
    /// Request cancellation; repeated calls have no further effect
    pub fn cancel(&self) {
        if !self.token.is_cancelled() {
            tracing::debug!("Cancelling streaming session");
            self.token.cancel();
        }
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
            .lock()
            .map(|s| *s)
            .unwrap_or(SessionState::Failed)
    }
}

/// One chat completion request
pub struct StreamingSession {
    backend: Arc<dyn ChatBackend>,
    handle: SessionHandle,
}

impl StreamingSession {
    /// Create an idle session against `backend`
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            backend,
            handle: SessionHandle {
                token: CancellationToken::new(),
                state: Arc::new(Mutex::new(SessionState::Idle)),
            },
        }
    }

    /// A handle that can cancel this session from another task
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Cancel this session
    pub fn cancel(&self) {
        self.handle.cancel();
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.handle.state()
    }

    fn set_state(&self, state: SessionState) {
        if let Ok(mut guard) = self.handle.state.lock() {
            *guard = state;
        }
    }

    /// Stream a completion for `messages` from `model`
    ///
    /// Consumes the session; exactly one terminal callback fires before this
    /// returns, and the returned outcome matches it.
    ///
    /// # Arguments
    ///
    /// * `model` - Model id as reported by the server
    /// * `messages` - Ordered role/content history
    /// * `handler` - Receiver of deltas and the terminal event
    pub async fn run<H>(self, model: &str, messages: &[ChatMessage], handler: &mut H) -> StreamOutcome
    where
        H: StreamHandler + ?Sized,
    {
        self.set_state(SessionState::Streaming);
        tracing::debug!("Streaming session started: model={}", model);

        let token = self.handle.token.clone();
        let mut accumulated = String::new();

        let opened = tokio::select! {
            biased;

            _ = token.cancelled() => None,
            result = self.backend.chat_stream(model, messages) => Some(result),
        };

        let mut stream = match opened {
            None => return self.finish_cancelled(accumulated, handler),
            Some(Err(e)) => return self.finish_failed(e, accumulated, handler),
            Some(Ok(stream)) => stream,
        };

        loop {
            let next = tokio::select! {
                biased;

                _ = token.cancelled() => {
                    return self.finish_cancelled(accumulated, handler);
                }

                next = stream.next() => next,
            };

            match next {
                Some(Ok(fragment)) => {
                    if token.is_cancelled() {
                        return self.finish_cancelled(accumulated, handler);
                    }
                    accumulated.push_str(&fragment);
                    handler.on_delta(&accumulated);
                }
                Some(Err(e)) => return self.finish_failed(e, accumulated, handler),
                None => break,
            }
        }

        if token.is_cancelled() {
            return self.finish_cancelled(accumulated, handler);
        }

        self.set_state(SessionState::Completed);
        tracing::debug!("Streaming session completed: {} chars", accumulated.len());
        handler.on_done(&accumulated);
        StreamOutcome::Completed(accumulated)
    }

    fn finish_cancelled<H>(&self, partial: String, handler: &mut H) -> StreamOutcome
    where
        H: StreamHandler + ?Sized,
    {
        self.set_state(SessionState::Cancelled);
        tracing::info!("Streaming session cancelled");
        handler.on_error(CANCELLED_MESSAGE, true);
        StreamOutcome::Cancelled(partial)
    }

    fn finish_failed<H>(&self, error: anyhow::Error, partial: String, handler: &mut H) -> StreamOutcome
    where
        H: StreamHandler + ?Sized,
    {
        if matches!(
            error.downcast_ref::<NeochatError>(),
            Some(NeochatError::StreamCancelled)
        ) {
            return self.finish_cancelled(partial, handler);
        }

        self.set_state(SessionState::Failed);
        let message = match error.downcast_ref::<NeochatError>() {
            Some(NeochatError::StreamFailed(inner)) => format!("Error: {}", inner),
            _ => format!("Error: {}", error),
        };
        tracing::warn!("Streaming session failed: {}", message);
        handler.on_error(&message, false);
        StreamOutcome::Failed(message)
    }
}

/// Starts sessions and tracks the current one for cancellation
///
/// Starting a new session replaces the current one without cancelling it.
pub struct Streamer {
    backend: Arc<dyn ChatBackend>,
    current: Mutex<Option<SessionHandle>>,
}

impl Streamer {
    /// Create a streamer over `backend`
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            backend,
            current: Mutex::new(None),
        }
    }

    /// The backend sessions are opened against
    pub fn backend(&self) -> Arc<dyn ChatBackend> {
        Arc::clone(&self.backend)
    }

    /// Create a fresh session and make it current
    pub fn begin(&self) -> StreamingSession {
        let session = StreamingSession::new(Arc::clone(&self.backend));
        if let Ok(mut current) = self.current.lock() {
            *current = Some(session.handle());
        }
        session
    }

    /// Stream a completion in a fresh current session
    pub async fn stream<H>(&self, model: &str, messages: &[ChatMessage], handler: &mut H) -> StreamOutcome
    where
        H: StreamHandler + ?Sized,
    {
        self.begin().run(model, messages, handler).await
    }

    /// Handle of the current session, if any was started
    pub fn current(&self) -> Option<SessionHandle> {
        self.current.lock().ok().and_then(|c| c.clone())
    }

    /// Cancel the current session and forget it
    pub fn cancel(&self) {
        let handle = self.current.lock().ok().and_then(|mut c| c.take());
        if let Some(handle) = handle {
            handle.cancel();
        }
    }
}
