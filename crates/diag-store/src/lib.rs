#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! In-memory conversation store: an ordered, invariant-checked message
//! sequence per session, with per-session locking.
//!
//! Durable persistence is a collaborator's concern; this crate only holds
//! state for the lifetime of the process and notifies an optional
//! `onMessage`-style hook as each message lands.

mod error;
mod session;

use std::sync::Arc;

use dashmap::DashMap;
use diag_types::Message;
use tokio::sync::Mutex;

pub use error::StoreError;
pub use session::{SessionState, SessionSummary};

/// Called after every successful append, in append order.
pub type MessageHook = Arc<dyn Fn(&str, &Message, usize) + Send + Sync>;

/// Owns every session's message sequence behind a per-session lock.
#[derive(Clone)]
pub struct ConversationStore {
    sessions: Arc<DashMap<String, Arc<Mutex<SessionState>>>>,
    on_message: Option<MessageHook>,
}

impl ConversationStore {
    /// Builds an empty store with no persistence hook.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            on_message: None,
        }
    }

    /// Attaches a hook invoked after every successful append.
    #[must_use]
    pub fn with_message_hook(mut self, hook: MessageHook) -> Self {
        self.on_message = Some(hook);
        self
    }

    /// Lazily creates the session if this is the first reference, seeding
    /// it with a `System` message holding `system_prompt`. Existing
    /// sessions are returned unchanged.
    pub fn session(&self, session_id: &str, system_prompt: &str) -> Arc<Mutex<SessionState>> {
        self.sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                log::info!("created session {session_id}");
                Arc::new(Mutex::new(SessionState::new(session_id.to_string(), system_prompt)))
            })
            .clone()
    }

    /// Appends `message` to `session_id`, enforcing the §3 ordering
    /// invariants.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SessionNotFound`] if `session_id` was never
    /// created via [`Self::session`], or [`StoreError::InvariantViolation`]
    /// if the append would break message ordering.
    pub async fn append(&self, session_id: &str, message: Message) -> Result<usize, StoreError> {
        let handle = self
            .sessions
            .get(session_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| StoreError::SessionNotFound {
                session_id: session_id.to_string(),
            })?;

        let mut session = handle.lock().await;
        let position = session.push(message.clone())?;
        drop(session);

        if let Some(hook) = &self.on_message {
            hook(session_id, &message, position);
        }
        Ok(position)
    }

    /// Returns a defensive copy of the session's full message sequence.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SessionNotFound`] if the session does not
    /// exist.
    pub async fn messages(&self, session_id: &str) -> Result<Vec<Message>, StoreError> {
        let handle = self
            .sessions
            .get(session_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| StoreError::SessionNotFound {
                session_id: session_id.to_string(),
            })?;
        Ok(handle.lock().await.messages())
    }

    /// Returns a summary of every known session.
    pub async fn list_summaries(&self) -> Vec<SessionSummary> {
        let mut summaries = Vec::with_capacity(self.sessions.len());
        for entry in self.sessions.iter() {
            summaries.push(entry.value().lock().await.summary());
        }
        summaries
    }

    /// Removes all in-memory state for `session_id`. A no-op if the
    /// session does not exist.
    pub fn delete(&self, session_id: &str) {
        self.sessions.remove(session_id);
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn session_is_lazily_created_with_system_prompt_at_index_zero() {
        let store = ConversationStore::new();
        store.session("s1", "you are a diagnostic agent");
        let messages = store.messages("s1").await.unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].is_system());
    }

    #[tokio::test]
    async fn append_to_unknown_session_is_an_error() {
        let store = ConversationStore::new();
        let err = store.append("ghost", Message::user("hi")).await.unwrap_err();
        assert!(matches!(err, StoreError::SessionNotFound { .. }));
    }

    #[tokio::test]
    async fn append_order_matches_read_order() {
        let store = ConversationStore::new();
        store.session("s1", "sys");
        store.append("s1", Message::user("one")).await.unwrap();
        store
            .append("s1", Message::Assistant { text: Some("two".to_string()), tool_requests: None })
            .await
            .unwrap();
        let messages = store.messages("s1").await.unwrap();
        assert_eq!(messages.len(), 3);
    }

    #[tokio::test]
    async fn message_hook_fires_in_append_order() {
        let count = Arc::new(AtomicUsize::new(1));
        let count_clone = count.clone();
        let store = ConversationStore::new().with_message_hook(Arc::new(move |_session, _message, position| {
            assert_eq!(position, count_clone.fetch_add(1, Ordering::SeqCst));
        }));
        store.session("s1", "sys");
        store.append("s1", Message::user("one")).await.unwrap();
        store
            .append("s1", Message::Assistant { text: Some("two".to_string()), tool_requests: None })
            .await
            .unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn delete_removes_session_state() {
        let store = ConversationStore::new();
        store.session("s1", "sys");
        store.delete("s1");
        assert!(matches!(store.messages("s1").await, Err(StoreError::SessionNotFound { .. })));
    }
}
