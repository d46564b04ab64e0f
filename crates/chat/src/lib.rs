//! Chat turn handling for the professor review assistant.
//!
//! A turn takes a user message through the keyword gate, the model and (when
//! requested) the retrieval tool, streams text to the UI, and persists the
//! resulting conversation.

pub mod assembler;
pub mod auth;
pub mod context;
pub mod conversation;
pub mod gate;
pub mod store;
pub mod streamable;
pub mod ui;
pub mod ui_state;

pub use assembler::{ResponseAssembler, TurnKind, TurnOutcome, TurnPhase};
pub use auth::{LocalSession, Session, SessionProvider, StaticTokenAuth, LOCAL_USER};
pub use context::{ChatContext, ChatSessions, SharedContext};
pub use conversation::{
    chat_path, new_id, title_from, ChatMessage, ChatRole, Conversation, MessageContent,
    ToolResult,
};
pub use gate::{should_retrieve, RETRIEVAL_KEYWORDS};
pub use store::{save_context, ConversationStore, SqliteConversationStore};
pub use streamable::{StreamableText, TextSnapshot, TextSubscriber};
pub use ui::{ui_channel, UiNode, UiReceiver, UiSender, UiUpdate};
pub use ui_state::{load_ui_state, project, UiMessage};
