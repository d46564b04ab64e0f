//! Ask command handler.
//!
//! Runs a single chat turn and prints the streamed answer.

use clap::Args;
use profrag_chat::{ui_channel, LocalSession, UiNode, UiUpdate};
use profrag_core::{config::AppConfig, AppError, AppResult};
use std::path::PathBuf;

use super::chat::{load_context, run_terminal_turn};
use crate::services::build_assembler;

/// Ask a single question
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub prompt: Option<String>,

    /// Read the question from a file
    #[arg(short, long, conflicts_with = "prompt")]
    pub file: Option<PathBuf>,

    /// Continue a saved chat
    #[arg(long)]
    pub chat_id: Option<String>,

    /// Hide retrieved review cards
    #[arg(long)]
    pub no_evidence: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");

        let question = self.get_prompt()?;
        let assembler = build_assembler(config)?;
        let mut context = load_context(&assembler, self.chat_id.as_deref()).await?;

        if !self.json {
            run_terminal_turn(&assembler, &mut context, &question, !self.no_evidence).await?;
            tracing::debug!("Chat id: {}", context.chat_id);
            return Ok(());
        }

        // Collect nodes instead of rendering
        let (ui, mut rx) = ui_channel();
        let outcome = assembler
            .submit_user_message(&mut context, &LocalSession, &question, &ui)
            .await?;
        drop(ui);

        let mut evidence = Vec::new();
        while let Some(update) = rx.recv().await {
            if let UiUpdate::Node(UiNode::Evidence { matches }) = update {
                evidence.extend(matches);
            }
        }

        let answer = match outcome.display {
            UiNode::Text { text } => text,
            other => other.to_plain_text(),
        };
        let output = serde_json::json!({
            "chatId": context.chat_id,
            "messageId": outcome.message_id,
            "answer": answer,
            "kind": outcome.kind,
            "evidence": evidence,
            "model": config.model,
            "provider": config.provider,
            "persisted": outcome.persisted,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);

        Ok(())
    }

    /// Get the question text from the argument or the file.
    fn get_prompt(&self) -> AppResult<String> {
        let prompt = match (&self.prompt, &self.file) {
            (Some(prompt), _) => prompt.clone(),
            (None, Some(path)) => std::fs::read_to_string(path).map_err(|e| {
                AppError::Config(format!("Failed to read prompt file {:?}: {}", path, e))
            })?,
            (None, None) => return Err(AppError::Config("No prompt provided".to_string())),
        };

        let prompt = prompt.trim().to_string();
        if prompt.is_empty() {
            return Err(AppError::Config("Prompt is empty".to_string()));
        }
        Ok(prompt)
    }
}
