//! Projection of stored messages into what the UI renders.

use crate::auth::SessionProvider;
use crate::conversation::{ChatMessage, ChatRole, MessageContent};
use crate::store::ConversationStore;
use crate::ui::UiNode;
use profrag_core::AppResult;
use profrag_prompt::RETRIEVAL_TOOL_NAME;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiMessage {
    pub id: String,
    pub role: ChatRole,
    pub display: UiNode,
}

/// Visible messages in order. System messages are hidden; retrieval results
/// become evidence cards and results of any other tool are not shown.
pub fn project(messages: &[ChatMessage]) -> Vec<UiMessage> {
    messages
        .iter()
        .filter_map(|message| {
            let display = match (&message.role, &message.content) {
                (ChatRole::System, _) => return None,
                (_, MessageContent::Text(text)) => UiNode::Text { text: text.clone() },
                (_, MessageContent::ToolResults(results)) => {
                    let mut retrievals = results
                        .iter()
                        .filter(|r| r.tool_name == RETRIEVAL_TOOL_NAME)
                        .peekable();
                    retrievals.peek()?;
                    UiNode::Evidence {
                        matches: retrievals.flat_map(|r| r.result.clone()).collect(),
                    }
                }
            };
            Some(UiMessage {
                id: message.id.clone(),
                role: message.role,
                display,
            })
        })
        .collect()
}

/// UI state of a saved chat. Empty without a session or when the chat is
/// not found.
pub async fn load_ui_state(
    store: &dyn ConversationStore,
    session: &dyn SessionProvider,
    chat_id: &str,
) -> AppResult<Vec<UiMessage>> {
    let Some(session) = session.current_session() else {
        return Ok(Vec::new());
    };

    Ok(store
        .load(chat_id, &session.user_id)
        .await?
        .map(|conv| project(&conv.messages))
        .unwrap_or_default())
}
