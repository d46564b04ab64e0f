//! Per-session chat state passed explicitly through a turn.

use crate::auth::SessionProvider;
use crate::conversation::{new_id, ChatMessage};
use crate::store::ConversationStore;
use chrono::{DateTime, Utc};
use profrag_core::AppResult;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// In-memory messages of one chat.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatContext {
    pub chat_id: String,

    /// Append-only, in display order
    pub messages: Vec<ChatMessage>,

    /// When the chat started; kept across saves
    pub created_at: DateTime<Utc>,
}

impl ChatContext {
    /// A new chat with a fresh id.
    pub fn new() -> Self {
        Self::with_id(new_id())
    }

    pub fn with_id(chat_id: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            messages: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Default for ChatContext {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedContext = Arc<tokio::sync::Mutex<ChatContext>>;

/// `(user_id, chat_id)`
type SessionKey = (String, String);

/// Live chat contexts of authenticated users.
///
/// Turns of the same user on the same chat lock the same context, so they run
/// one at a time. Anonymous turns get a private context that is never cached.
#[derive(Default)]
pub struct ChatSessions {
    contexts: Mutex<HashMap<SessionKey, SharedContext>>,
}

impl ChatSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context for `chat_id`, resumed from the store when this user owns a
    /// saved chat with that id.
    pub async fn get_or_load(
        &self,
        chat_id: &str,
        store: &dyn ConversationStore,
        session: &dyn SessionProvider,
    ) -> AppResult<SharedContext> {
        let Some(session) = session.current_session() else {
            return Ok(Arc::new(tokio::sync::Mutex::new(ChatContext::with_id(
                chat_id,
            ))));
        };

        if let Some(existing) = self.get(&session.user_id, chat_id)? {
            return Ok(existing);
        }

        let mut context = ChatContext::with_id(chat_id);
        if let Some(saved) = store.load(chat_id, &session.user_id).await? {
            tracing::debug!(chat_id, messages = saved.messages.len(), "Resumed chat");
            context.messages = saved.messages;
            context.created_at = saved.created_at;
        }

        let mut contexts = self.lock()?;
        let shared = contexts
            .entry((session.user_id, chat_id.to_string()))
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(context)))
            .clone();
        Ok(shared)
    }

    pub fn get(&self, user_id: &str, chat_id: &str) -> AppResult<Option<SharedContext>> {
        Ok(self
            .lock()?
            .get(&(user_id.to_string(), chat_id.to_string()))
            .cloned())
    }

    /// Drop a cached context whose state is already in the store.
    ///
    /// The entry stays while any other turn still holds `shared`. Returns
    /// whether the entry was removed.
    pub fn release(&self, user_id: &str, chat_id: &str, shared: &SharedContext) -> AppResult<bool> {
        let mut contexts = self.lock()?;
        let key = (user_id.to_string(), chat_id.to_string());
        let idle = match contexts.get(&key) {
            // One reference in the map, one held by the caller
            Some(cached) => Arc::ptr_eq(cached, shared) && Arc::strong_count(shared) <= 2,
            None => false,
        };
        if idle {
            contexts.remove(&key);
            tracing::debug!(chat_id, "Released chat context");
        }
        Ok(idle)
    }

    pub fn len(&self) -> usize {
        self.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> AppResult<std::sync::MutexGuard<'_, HashMap<SessionKey, SharedContext>>> {
        self.contexts
            .lock()
            .map_err(|_| profrag_core::AppError::Chat("Session map lock poisoned".to_string()))
    }
}
