//! Conversation store
//!
//! Owns the conversation list and the per-conversation message logs, writes
//! both through the persistence gateway after every structural change, and
//! generates a title in the background when a conversation receives its
//! first user message. A streaming reply is written when it starts and when
//! it finishes, not on every delta.
//!
//! Title changes are published on a broadcast channel; UI layers call
//! [`ConversationStore::subscribe`] to follow them.

pub mod category;
pub mod title;
pub mod types;

pub use category::Category;
pub use title::{clean_title, title_prompt, TitleTracker, FALLBACK_TITLE};
pub use types::{to_chat_messages, Conversation, Message, MessageMetadata, RenameEvent};

use crate::error::{NeochatError, TypedResult};
use crate::providers::{ChatBackend, ChatMessage, Role};
use crate::session::{StreamHandler, StreamingSession};
use crate::storage::{keys, PersistenceGateway};
use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

const RENAME_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Default)]
struct StoreState {
    conversations: Vec<Conversation>,
    messages: HashMap<String, Vec<Message>>,
    last_id: i64,
}

/// Conversations and their messages, persisted on every change
///
/// Cloning is cheap and clones share state.
#[derive(Clone)]
pub struct ConversationStore {
    state: Arc<Mutex<StoreState>>,
    gateway: PersistenceGateway,
    backend: Option<Arc<dyn ChatBackend>>,
    renames: broadcast::Sender<RenameEvent>,
}

impl ConversationStore {
    /// Load the store from `gateway`
    ///
    /// Missing or unreadable records start empty. Every listed conversation
    /// is given a message log if it lacks one, and categories are recomputed
    /// for the current day.
    pub fn load(gateway: PersistenceGateway) -> Self {
        let conversations: Vec<Conversation> = gateway.load(keys::CHATS, Vec::new());
        let mut messages: HashMap<String, Vec<Message>> =
            gateway.load(keys::CHAT_MESSAGES, HashMap::new());

        for conversation in &conversations {
            messages.entry(conversation.id.clone()).or_default();
        }

        let last_id = conversations
            .iter()
            .filter_map(|c| c.id.parse::<i64>().ok())
            .max()
            .unwrap_or(0);

        tracing::debug!("Loaded {} conversations", conversations.len());

        let (renames, _) = broadcast::channel(RENAME_CHANNEL_CAPACITY);
        let store = Self {
            state: Arc::new(Mutex::new(StoreState {
                conversations,
                messages,
                last_id,
            })),
            gateway,
            backend: None,
            renames,
        };
        store.refresh_categories(Local::now());
        store
    }

    /// Backend used for background title generation
    pub fn with_backend(mut self, backend: Arc<dyn ChatBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, state: &StoreState) {
        self.gateway
            .save_or_log(keys::CHATS, &state.conversations);
        self.gateway
            .save_or_log(keys::CHAT_MESSAGES, &state.messages);
    }

    /// Create an empty conversation at the top of the list
    ///
    /// # Returns
    ///
    /// The new conversation id, strictly greater than every id handed out
    /// before by this store
    pub fn create_conversation(&self) -> String {
        let now = Local::now();
        let mut state = self.lock();

        let millis = now.timestamp_millis().max(state.last_id + 1);
        state.last_id = millis;
        let id = millis.to_string();

        state.conversations.insert(
            0,
            Conversation {
                id: id.clone(),
                title: FALLBACK_TITLE.to_string(),
                category: Category::Today.label().to_string(),
            },
        );
        state.messages.insert(id.clone(), Vec::new());
        self.persist(&state);

        tracing::info!("Created conversation {}", id);
        id
    }

    /// Append `message` to a conversation and persist
    ///
    /// When this is the conversation's first message, it is from the user and
    /// a `model` is given, a title is generated in the background. The
    /// returned handle resolves to the title it settled on.
    ///
    /// # Errors
    ///
    /// Returns `ConversationNotFound` for an unknown id
    pub fn append_message(
        &self,
        conversation_id: &str,
        message: Message,
        model: Option<&str>,
    ) -> TypedResult<Option<JoinHandle<String>>> {
        let user_content = {
            let mut state = self.lock();
            if !state.conversations.iter().any(|c| c.id == conversation_id) {
                return Err(NeochatError::ConversationNotFound(
                    conversation_id.to_string(),
                ));
            }
            let log = state
                .messages
                .entry(conversation_id.to_string())
                .or_default();
            let first = log.is_empty();
            let user_content = (first && message.role == Role::User).then(|| message.content.clone());
            log.push(message);
            self.persist(&state);
            user_content
        };

        let (Some(content), Some(model)) = (user_content, model) else {
            return Ok(None);
        };
        Ok(self.spawn_title_generation(conversation_id, model, content))
    }

    fn spawn_title_generation(
        &self,
        conversation_id: &str,
        model: &str,
        user_content: String,
    ) -> Option<JoinHandle<String>> {
        let Some(backend) = self.backend.clone() else {
            tracing::debug!("No backend attached; skipping title generation");
            return None;
        };
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!("Cannot generate title outside a runtime: {}", e);
                return None;
            }
        };

        let store = self.clone();
        let conversation_id = conversation_id.to_string();
        let model = model.to_string();
        tracing::debug!("Generating title for {} with {}", conversation_id, model);

        Some(runtime.spawn(async move {
            store
                .generate_title(backend, conversation_id, model, user_content)
                .await
        }))
    }

    async fn generate_title(
        self,
        backend: Arc<dyn ChatBackend>,
        conversation_id: String,
        model: String,
        user_content: String,
    ) -> String {
        let prompt = [ChatMessage::user(title_prompt(&user_content))];
        let mut handler = TitleHandler {
            store: self,
            conversation_id,
            tracker: TitleTracker::new(),
            settled: None,
        };

        StreamingSession::new(backend)
            .run(&model, &prompt, &mut handler)
            .await;

        handler
            .settled
            .unwrap_or_else(|| FALLBACK_TITLE.to_string())
    }

    /// Messages of a conversation in chronological order; empty when unknown
    pub fn get_messages(&self, conversation_id: &str) -> Vec<Message> {
        self.lock()
            .messages
            .get(conversation_id)
            .cloned()
            .unwrap_or_default()
    }

    /// All conversations, newest first
    pub fn get_conversations(&self) -> Vec<Conversation> {
        self.lock().conversations.clone()
    }

    /// A single conversation
    pub fn get_conversation(&self, conversation_id: &str) -> Option<Conversation> {
        self.lock()
            .conversations
            .iter()
            .find(|c| c.id == conversation_id)
            .cloned()
    }

    /// Set a conversation's title, persist, and notify subscribers
    ///
    /// # Errors
    ///
    /// Returns `ConversationNotFound` for an unknown id
    pub fn rename_conversation(&self, conversation_id: &str, title: &str) -> TypedResult<()> {
        {
            let mut state = self.lock();
            let conversation = state
                .conversations
                .iter_mut()
                .find(|c| c.id == conversation_id)
                .ok_or_else(|| NeochatError::ConversationNotFound(conversation_id.to_string()))?;
            conversation.title = title.to_string();
            self.persist(&state);
        }

        tracing::debug!("Renamed {} to '{}'", conversation_id, title);
        // no subscribers is not an error
        let _ = self.renames.send(RenameEvent {
            conversation_id: conversation_id.to_string(),
            title: title.to_string(),
        });
        Ok(())
    }

    /// Receive every subsequent rename
    pub fn subscribe(&self) -> broadcast::Receiver<RenameEvent> {
        self.renames.subscribe()
    }

    /// Replace the in-progress assistant reply with `content`
    ///
    /// Starts a new streaming assistant message when the log does not end
    /// with one. Only starting a reply is persisted; the final text is
    /// written by [`ConversationStore::finish_streaming_message`].
    ///
    /// # Errors
    ///
    /// Returns `ConversationNotFound` for an unknown id
    pub fn update_streaming_message(&self, conversation_id: &str, content: &str) -> TypedResult<()> {
        let mut state = self.lock();
        let log = state
            .messages
            .get_mut(conversation_id)
            .ok_or_else(|| NeochatError::ConversationNotFound(conversation_id.to_string()))?;

        let started = match log.last_mut() {
            Some(last) if last.streaming && last.role == Role::Assistant => {
                last.content = content.to_string();
                false
            }
            _ => {
                let mut message = Message::assistant(content);
                message.streaming = true;
                log.push(message);
                true
            }
        };

        // Later deltas stay in memory until the reply finishes
        if started {
            self.persist(&state);
        }
        Ok(())
    }

    /// Mark the in-progress reply as final, attaching `metadata`
    ///
    /// Does nothing when no reply is streaming.
    ///
    /// # Errors
    ///
    /// Returns `ConversationNotFound` for an unknown id
    pub fn finish_streaming_message(
        &self,
        conversation_id: &str,
        metadata: Option<MessageMetadata>,
    ) -> TypedResult<()> {
        let mut state = self.lock();
        let log = state
            .messages
            .get_mut(conversation_id)
            .ok_or_else(|| NeochatError::ConversationNotFound(conversation_id.to_string()))?;

        if let Some(last) = log.last_mut().filter(|m| m.streaming) {
            last.streaming = false;
            if metadata.is_some() {
                last.metadata = metadata;
            }
            self.persist(&state);
        }
        Ok(())
    }

    /// Recompute every conversation's category relative to `now`
    pub fn refresh_categories(&self, now: DateTime<Local>) {
        let mut state = self.lock();
        for conversation in state.conversations.iter_mut() {
            conversation.category = Category::for_id(&conversation.id, &now).label().to_string();
        }
    }
}

/// Applies streamed title candidates to a conversation
struct TitleHandler {
    store: ConversationStore,
    conversation_id: String,
    tracker: TitleTracker,
    settled: Option<String>,
}

impl TitleHandler {
    fn apply(&self, title: &str) {
        if let Err(e) = self.store.rename_conversation(&self.conversation_id, title) {
            tracing::debug!("Dropping generated title: {}", e);
        }
    }
}

impl StreamHandler for TitleHandler {
    fn on_delta(&mut self, accumulated: &str) {
        if let Some(title) = self.tracker.on_delta(accumulated) {
            self.apply(&title);
        }
    }

    fn on_done(&mut self, final_text: &str) {
        let title = self.tracker.on_done(final_text);
        self.apply(&title);
        self.settled = Some(title);
    }

    fn on_error(&mut self, message: &str, cancelled: bool) {
        tracing::debug!("Title generation ended early: {} (cancelled={})", message, cancelled);
        let title = self.tracker.on_error();
        self.apply(&title);
        self.settled = Some(title);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::providers::{DeltaStream, ModelRecord};
    use async_trait::async_trait;
    use chrono::Duration;

    struct FixedBackend {
        fragments: Vec<&'static str>,
        fail: bool,
    }

    #[async_trait]
    impl ChatBackend for FixedBackend {
        async fn list_models(&self) -> Result<Vec<ModelRecord>> {
            Ok(vec![])
        }

        async fn chat_stream(&self, _model: &str, messages: &[ChatMessage]) -> Result<DeltaStream> {
            assert!(messages[0].content.contains("at most 7 words"));
            if self.fail {
                return Err(NeochatError::StreamFailed("down".to_string()).into());
            }
            let items: Vec<Result<String>> =
                self.fragments.iter().map(|f| Ok(f.to_string())).collect();
            Ok(Box::pin(futures::stream::iter(items)))
        }
    }

    fn store_with(fragments: Vec<&'static str>, fail: bool) -> ConversationStore {
        ConversationStore::load(PersistenceGateway::in_memory("neo2_"))
            .with_backend(Arc::new(FixedBackend { fragments, fail }))
    }

    #[test]
    fn test_create_conversation_defaults() {
        let store = ConversationStore::load(PersistenceGateway::in_memory("neo2_"));
        let id = store.create_conversation();
        let conversation = store.get_conversation(&id).unwrap();
        assert_eq!(conversation.title, "New Chat");
        assert_eq!(conversation.category, "Today");
        assert!(store.get_messages(&id).is_empty());
    }

    #[test]
    fn test_ids_are_strictly_increasing_and_newest_first() {
        let store = ConversationStore::load(PersistenceGateway::in_memory("neo2_"));
        let a = store.create_conversation();
        let b = store.create_conversation();
        let c = store.create_conversation();
        assert!(a.parse::<i64>().unwrap() < b.parse::<i64>().unwrap());
        assert!(b.parse::<i64>().unwrap() < c.parse::<i64>().unwrap());

        let ids: Vec<String> = store.get_conversations().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![c, b, a]);
    }

    #[test]
    fn test_append_persists_and_reloads() {
        let gateway = PersistenceGateway::in_memory("neo2_");
        let store = ConversationStore::load(gateway.clone());
        let id = store.create_conversation();
        store.append_message(&id, Message::user("hi"), None).unwrap();
        store.append_message(&id, Message::assistant("hello"), None).unwrap();

        let reloaded = ConversationStore::load(gateway);
        let messages = reloaded.get_messages(&id);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "hi");
        assert_eq!(messages[1].role, Role::Assistant);
    }

    #[test]
    fn test_append_to_unknown_conversation_fails() {
        let store = ConversationStore::load(PersistenceGateway::in_memory("neo2_"));
        let err = store.append_message("123", Message::user("x"), None).unwrap_err();
        assert!(matches!(err, NeochatError::ConversationNotFound(_)));
    }

    #[test]
    fn test_load_backfills_missing_logs() {
        let gateway = PersistenceGateway::in_memory("neo2_");
        gateway
            .save(
                keys::CHATS,
                &vec![Conversation {
                    id: "1".to_string(),
                    title: "Old".to_string(),
                    category: "Today".to_string(),
                }],
            )
            .unwrap();
        let store = ConversationStore::load(gateway);
        assert!(store.get_messages("1").is_empty());
        assert!(store.append_message("1", Message::user("x"), None).is_ok());
        assert_eq!(store.get_conversation("1").unwrap().category, "Older");
    }

    #[tokio::test]
    async fn test_rename_notifies_subscribers() {
        let store = ConversationStore::load(PersistenceGateway::in_memory("neo2_"));
        let mut events = store.subscribe();
        let id = store.create_conversation();

        store.rename_conversation(&id, "Renamed").unwrap();

        let event = events.recv().await.unwrap();
        assert_eq!(
            event,
            RenameEvent {
                conversation_id: id.clone(),
                title: "Renamed".to_string()
            }
        );
        assert!(matches!(
            store.rename_conversation("missing", "x"),
            Err(NeochatError::ConversationNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_first_user_message_generates_title() {
        let store = store_with(vec!["<think>", "hmm", "</think>", "Python ", "List Tips"], false);
        let mut events = store.subscribe();
        let id = store.create_conversation();

        let handle = store
            .append_message(&id, Message::user("How do I reverse a list?"), Some("m"))
            .unwrap()
            .expect("title generation should start");
        let title = handle.await.unwrap();

        assert_eq!(title, "Python List Tips");
        assert_eq!(store.get_conversation(&id).unwrap().title, "Python List Tips");

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event.title);
        }
        assert_eq!(seen, vec!["Python", "Python List Tips", "Python List Tips"]);
    }

    #[tokio::test]
    async fn test_title_resolves_even_when_every_delta_is_empty() {
        let store = store_with(vec!["<think>", "reasoning only"], false);
        let mut events = store.subscribe();
        let id = store.create_conversation();

        let title = store
            .append_message(&id, Message::user("hello"), Some("m"))
            .unwrap()
            .unwrap()
            .await
            .unwrap();

        assert_eq!(title, "New Chat");
        let event = events.try_recv().unwrap();
        assert_eq!(event.title, "New Chat");
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_title_failure_falls_back() {
        let store = store_with(vec![], true);
        let id = store.create_conversation();
        let title = store
            .append_message(&id, Message::user("hello"), Some("m"))
            .unwrap()
            .unwrap()
            .await
            .unwrap();
        assert_eq!(title, "New Chat");
    }

    #[tokio::test]
    async fn test_title_only_for_first_user_message_with_model() {
        let store = store_with(vec!["Title"], false);
        let id = store.create_conversation();

        assert!(store
            .append_message(&id, Message::assistant("greeting"), Some("m"))
            .unwrap()
            .is_none());
        assert!(store
            .append_message(&id, Message::user("second"), Some("m"))
            .unwrap()
            .is_none());

        let other = store.create_conversation();
        assert!(store
            .append_message(&other, Message::user("no model"), None)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_streaming_message_is_replaced_then_finished() {
        let store = ConversationStore::load(PersistenceGateway::in_memory("neo2_"));
        let id = store.create_conversation();
        store.append_message(&id, Message::user("q"), None).unwrap();

        store.update_streaming_message(&id, "Hel").unwrap();
        store.update_streaming_message(&id, "Hello").unwrap();
        let messages = store.get_messages(&id);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, "Hello");
        assert!(messages[1].streaming);

        store
            .finish_streaming_message(
                &id,
                Some(MessageMetadata {
                    model: Some("m".to_string()),
                    id: None,
                }),
            )
            .unwrap();
        let messages = store.get_messages(&id);
        assert!(!messages[1].streaming);
        assert_eq!(messages[1].metadata.as_ref().unwrap().model.as_deref(), Some("m"));

        store.update_streaming_message(&id, "Next").unwrap();
        assert_eq!(store.get_messages(&id).len(), 3);
    }

    #[derive(Default)]
    struct CountingStore {
        inner: crate::storage::MemoryStore,
        inserts: std::sync::atomic::AtomicUsize,
    }

    impl crate::storage::KeyValueStore for CountingStore {
        fn get(&self, key: &str) -> TypedResult<Option<Vec<u8>>> {
            self.inner.get(key)
        }

        fn insert(&self, key: &str, value: Vec<u8>) -> TypedResult<()> {
            self.inserts
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            self.inner.insert(key, value)
        }

        fn remove(&self, key: &str) -> TypedResult<()> {
            self.inner.remove(key)
        }

        fn clear_prefix(&self, prefix: &str) -> TypedResult<()> {
            self.inner.clear_prefix(prefix)
        }
    }

    #[test]
    fn test_streamed_reply_is_not_written_per_delta() {
        use std::sync::atomic::Ordering;

        let backend = Arc::new(CountingStore::default());
        let gateway = PersistenceGateway::new(backend.clone(), "neo2_");
        let store = ConversationStore::load(gateway.clone());
        let id = store.create_conversation();
        store.append_message(&id, Message::user("q"), None).unwrap();
        let before = backend.inserts.load(Ordering::SeqCst);

        let mut text = String::new();
        for fragment in ["a", "b", "c", "d", "e", "f", "g", "h"] {
            text.push_str(fragment);
            store.update_streaming_message(&id, &text).unwrap();
        }
        store.finish_streaming_message(&id, None).unwrap();

        // One write of both records when the reply starts, one when it finishes
        assert_eq!(backend.inserts.load(Ordering::SeqCst) - before, 4);

        let reloaded = ConversationStore::load(gateway);
        let messages = reloaded.get_messages(&id);
        assert_eq!(messages[1].content, "abcdefgh");
        assert!(!messages[1].streaming);
    }

    #[test]
    fn test_refresh_categories() {
        let store = ConversationStore::load(PersistenceGateway::in_memory("neo2_"));
        let id = store.create_conversation();
        store.refresh_categories(Local::now() + Duration::days(1));
        assert_eq!(store.get_conversation(&id).unwrap().category, "Yesterday");
    }

    #[test]
    fn test_unavailable_storage_keeps_working_in_memory() {
        let store = ConversationStore::load(PersistenceGateway::unavailable("neo2_"));
        let id = store.create_conversation();
        store.append_message(&id, Message::user("x"), None).unwrap();
        assert_eq!(store.get_messages(&id).len(), 1);
    }
}
