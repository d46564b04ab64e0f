//! Durable conversation storage.

use crate::auth::SessionProvider;
use crate::context::ChatContext;
use crate::conversation::{ChatMessage, Conversation};
use chrono::{DateTime, Utc};
use profrag_core::{AppError, AppResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Chat records keyed by chat id.
#[async_trait::async_trait]
pub trait ConversationStore: Send + Sync {
    /// Insert or overwrite the conversation with the same chat id.
    ///
    /// A chat id already owned by another user is rejected.
    async fn save(&self, conversation: &Conversation) -> AppResult<()>;

    /// Load a chat owned by `user_id`.
    async fn load(&self, chat_id: &str, user_id: &str) -> AppResult<Option<Conversation>>;

    /// Chats owned by `user_id`, newest first.
    async fn list(&self, user_id: &str) -> AppResult<Vec<Conversation>>;
}

/// Persist `context` for the current user.
///
/// Returns `false` without writing when there is no session.
pub async fn save_context(
    store: &dyn ConversationStore,
    session: &dyn SessionProvider,
    context: &ChatContext,
) -> AppResult<bool> {
    let Some(session) = session.current_session() else {
        tracing::debug!(chat_id = %context.chat_id, "No session; conversation not saved");
        return Ok(false);
    };

    let conversation = Conversation::new(
        context.chat_id.clone(),
        session.user_id,
        context.messages.clone(),
        context.created_at,
    );
    store.save(&conversation).await?;
    Ok(true)
}

/// Conversation store in a single SQLite file.
pub struct SqliteConversationStore {
    conn: Mutex<Connection>,
}

impl SqliteConversationStore {
    pub fn open(db_path: &Path) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Storage(format!("Failed to create storage directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| AppError::Storage(format!("Failed to open conversation store: {}", e)))?;
        tracing::debug!("Opened conversation store at {:?}", db_path);
        Self::from_connection(conn)
    }

    pub fn in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Storage(format!("Failed to open conversation store: {}", e)))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> AppResult<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS conversations (
                chat_id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL,
                created_at TEXT NOT NULL,
                path TEXT NOT NULL,
                messages TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_conversations_user ON conversations(user_id);
            "#,
        )
        .map_err(|e| AppError::Storage(format!("Failed to create tables: {}", e)))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Storage("Conversation store lock poisoned".to_string()))
    }
}

type Row = (String, String, String, String, String, String);

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Row> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn decode(row: Row) -> AppResult<Conversation> {
    let (chat_id, user_id, title, created_at, path, messages) = row;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| AppError::Storage(format!("Invalid timestamp for chat {}: {}", chat_id, e)))?
        .with_timezone(&Utc);
    let messages: Vec<ChatMessage> = serde_json::from_str(&messages)?;

    Ok(Conversation {
        chat_id,
        user_id,
        title,
        created_at,
        messages,
        path,
    })
}

const SELECT_COLUMNS: &str =
    "SELECT chat_id, user_id, title, created_at, path, messages FROM conversations";

#[async_trait::async_trait]
impl ConversationStore for SqliteConversationStore {
    async fn save(&self, conversation: &Conversation) -> AppResult<()> {
        let messages = serde_json::to_string(&conversation.messages)?;
        let conn = self.lock()?;
        let written = conn.execute(
            "INSERT INTO conversations (chat_id, user_id, title, created_at, path, messages)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(chat_id) DO UPDATE SET
                title = excluded.title,
                created_at = excluded.created_at,
                path = excluded.path,
                messages = excluded.messages
             WHERE conversations.user_id = excluded.user_id",
            params![
                conversation.chat_id,
                conversation.user_id,
                conversation.title,
                conversation.created_at.to_rfc3339(),
                conversation.path,
                messages,
            ],
        )?;
        if written == 0 {
            return Err(AppError::Storage(format!(
                "Chat '{}' belongs to another user",
                conversation.chat_id
            )));
        }

        tracing::debug!(
            chat_id = %conversation.chat_id,
            messages = conversation.messages.len(),
            "Saved conversation"
        );
        Ok(())
    }

    async fn load(&self, chat_id: &str, user_id: &str) -> AppResult<Option<Conversation>> {
        let row = {
            let conn = self.lock()?;
            conn.query_row(
                &format!("{} WHERE chat_id = ?1 AND user_id = ?2", SELECT_COLUMNS),
                params![chat_id, user_id],
                read_row,
            )
            .optional()?
        };

        row.map(decode).transpose()
    }

    async fn list(&self, user_id: &str) -> AppResult<Vec<Conversation>> {
        let rows = {
            let conn = self.lock()?;
            let mut stmt = conn.prepare(&format!(
                "{} WHERE user_id = ?1 ORDER BY created_at DESC",
                SELECT_COLUMNS
            ))?;
            let rows = stmt
                .query_map(params![user_id], read_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        rows.into_iter().map(decode).collect()
    }
}
