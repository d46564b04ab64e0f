//! History command handler.
//!
//! Lists saved conversations of the local user, or shows one.

use clap::Args;
use profrag_chat::{load_ui_state, ChatRole, LocalSession, LOCAL_USER};
use profrag_core::{config::AppConfig, AppResult};

use crate::services::open_conversation_store;

/// List or show saved conversations
#[derive(Args, Debug)]
pub struct HistoryCommand {
    /// Chat to show (default: list all chats)
    pub chat_id: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl HistoryCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing history command");

        let store = open_conversation_store(config)?;

        let Some(ref chat_id) = self.chat_id else {
            let chats = store.list(LOCAL_USER).await?;
            if self.json {
                let output: Vec<_> = chats
                    .iter()
                    .map(|c| {
                        serde_json::json!({
                            "chatId": c.chat_id,
                            "title": c.title,
                            "createdAt": c.created_at,
                            "path": c.path,
                            "messages": c.messages.len(),
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else if chats.is_empty() {
                println!("No saved chats");
            } else {
                for chat in chats {
                    println!(
                        "{}  {}  {}",
                        chat.created_at.format("%Y-%m-%d %H:%M"),
                        chat.chat_id,
                        chat.title
                    );
                }
            }
            return Ok(());
        };

        let messages = load_ui_state(store.as_ref(), &LocalSession, chat_id).await?;
        if self.json {
            println!("{}", serde_json::to_string_pretty(&messages)?);
            return Ok(());
        }

        if messages.is_empty() {
            println!("No saved chat '{}'", chat_id);
            return Ok(());
        }

        for message in messages {
            let label = match message.role {
                ChatRole::User => "You",
                ChatRole::Assistant => "Assistant",
                ChatRole::Tool => "Reviews",
                ChatRole::System => "System",
            };
            println!("{}:\n{}\n", label, message.display.to_plain_text());
        }

        Ok(())
    }
}
