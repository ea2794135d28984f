//! In-memory session store.
//!
//! Sessions map a client-supplied id to conversation history plus an optional
//! document context. Nothing is persisted and nothing expires; a session lives
//! until it is reset or the process exits.
//!
//! Every session carries two locks:
//! - a *turn lock*, held for the whole duration of a chat turn so that two
//!   turns on the same id run one after the other;
//! - a data lock around the history and document context, held only for the
//!   short critical sections that read or append.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Session id used when the client does not send one.
pub const DEFAULT_SESSION_ID: &str = "default";

pub(crate) fn default_session_id() -> String {
    DEFAULT_SESSION_ID.to_string()
}

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Conversation state of one session.
#[derive(Debug, Default)]
pub struct Session {
    history: Vec<ChatMessage>,
    document_context: Option<String>,
}

impl Session {
    /// Messages in conversation order.
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn document_context(&self) -> Option<&str> {
        self.document_context.as_deref()
    }

    pub fn has_document(&self) -> bool {
        self.document_context.is_some()
    }

    /// Append a message. History is append-only.
    pub fn push(&mut self, message: ChatMessage) {
        self.history.push(message);
    }

    /// Replace the document context.
    pub fn set_document_context(&mut self, text: String) {
        self.document_context = Some(text);
    }
}

/// Point-in-time copy of a session, safe to serialize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub history: Vec<ChatMessage>,
    pub has_document: bool,
}

/// Held for the duration of a chat turn.
pub type TurnGuard = OwnedMutexGuard<()>;

#[derive(Debug, Default)]
struct SessionCell {
    turn: Arc<Mutex<()>>,
    state: RwLock<Session>,
}

/// Shared reference to a registered session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: Arc<str>,
    cell: Arc<SessionCell>,
}

impl SessionHandle {
    fn new(id: &str) -> Self {
        Self {
            id: Arc::from(id),
            cell: Arc::new(SessionCell::default()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, Session> {
        self.cell.state.read().await
    }

    pub async fn write(&self) -> RwLockWriteGuard<'_, Session> {
        self.cell.state.write().await
    }

    /// Wait for any in-flight turn on this session to finish, then claim it.
    pub async fn begin_turn(&self) -> TurnGuard {
        Arc::clone(&self.cell.turn).lock_owned().await
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let session = self.read().await;
        SessionSnapshot {
            history: session.history().to_vec(),
            has_document: session.has_document(),
        }
    }

    /// Whether both handles point at the same registered session.
    pub fn same_session(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}

/// Registry of live sessions. Owned by the router state, never global.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the session for `id`, registering an empty one if needed.
    pub async fn get_or_create(&self, id: &str) -> SessionHandle {
        if let Some(handle) = self.sessions.read().await.get(id) {
            return handle.clone();
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(id.to_string())
            .or_insert_with(|| {
                tracing::debug!(session_id = %id, "Session created");
                SessionHandle::new(id)
            })
            .clone()
    }

    /// Look up a session without creating it.
    pub async fn get(&self, id: &str) -> Option<SessionHandle> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Drop the session for `id`. Returns whether one existed.
    pub async fn reset(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            tracing::debug!(session_id = %id, "Session removed");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn get_or_create_returns_same_session() {
        let store = SessionStore::new();

        let first = store.get_or_create("s1").await;
        first.write().await.push(ChatMessage::user("Hi"));
        first.write().await.set_document_context("doc".into());

        let second = store.get_or_create("s1").await;
        assert!(first.same_session(&second));

        let snapshot = second.snapshot().await;
        assert_eq!(snapshot.history, vec![ChatMessage::user("Hi")]);
        assert!(snapshot.has_document);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn new_session_is_empty() {
        let store = SessionStore::new();
        let handle = store.get_or_create("fresh").await;

        assert_eq!(handle.id(), "fresh");
        let snapshot = handle.snapshot().await;
        assert!(snapshot.history.is_empty());
        assert!(!snapshot.has_document);
    }

    #[tokio::test]
    async fn reset_removes_session() {
        let store = SessionStore::new();
        let old = store.get_or_create("s1").await;
        old.write().await.push(ChatMessage::user("Hi"));

        assert!(store.reset("s1").await);
        assert!(store.get("s1").await.is_none());
        assert!(store.is_empty().await);

        let fresh = store.get_or_create("s1").await;
        assert!(!fresh.same_session(&old));
        assert!(fresh.snapshot().await.history.is_empty());
    }

    #[tokio::test]
    async fn reset_missing_session_is_noop() {
        let store = SessionStore::new();
        store.get_or_create("keep").await;

        assert!(!store.reset("missing").await);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn document_context_is_overwritten() {
        let store = SessionStore::new();
        let handle = store.get_or_create("s1").await;

        handle.write().await.set_document_context("first".into());
        handle.write().await.set_document_context("second".into());

        assert_eq!(handle.read().await.document_context(), Some("second"));
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let store = SessionStore::new();
        store
            .get_or_create("a")
            .await
            .write()
            .await
            .push(ChatMessage::user("only in a"));

        let b = store.get_or_create("b").await;
        assert!(b.snapshot().await.history.is_empty());
    }

    #[tokio::test]
    async fn turns_on_same_session_are_serialized() {
        let store = SessionStore::new();
        let handle = store.get_or_create("s1").await;

        let guard = handle.begin_turn().await;
        let blocked = tokio::time::timeout(Duration::from_millis(50), handle.begin_turn()).await;
        assert!(blocked.is_err());

        drop(guard);
        let acquired = tokio::time::timeout(Duration::from_millis(50), handle.begin_turn()).await;
        assert!(acquired.is_ok());
    }

    #[tokio::test]
    async fn reads_are_not_blocked_by_a_turn() {
        let store = SessionStore::new();
        let handle = store.get_or_create("s1").await;

        let _turn = handle.begin_turn().await;
        let snapshot = tokio::time::timeout(Duration::from_millis(50), handle.snapshot()).await;
        assert!(snapshot.is_ok());
    }

    #[test]
    fn message_serializes_lowercase_role() {
        let json = serde_json::to_value(ChatMessage::assistant("Hello")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "assistant", "content": "Hello"}));
        assert_eq!(Role::User.as_str(), "user");
    }
}
