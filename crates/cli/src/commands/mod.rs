//! Command handlers for the Profrag CLI.
//!
//! This module organizes all CLI commands into separate submodules.

pub mod ask;
pub mod chat;
pub mod history;
pub mod ingest;
pub mod search;
pub mod serve;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use chat::ChatCommand;
pub use history::HistoryCommand;
pub use ingest::IngestCommand;
pub use search::SearchCommand;
pub use serve::ServeCommand;
