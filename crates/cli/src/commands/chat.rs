//! Chat command handler.
//!
//! Interactive terminal chat; each line is one turn.

use clap::Args;
use profrag_chat::{
    ui_channel, ChatContext, ChatSessions, LocalSession, ResponseAssembler, TurnOutcome,
};
use profrag_core::{config::AppConfig, AppResult};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::render::spawn_terminal_renderer;
use crate::services::build_assembler;

const WELCOME: &str = "Welcome to the AI-Powered Rate My Professor App!";

const EXAMPLE_QUESTIONS: [&str; 3] = [
    "Who is the best Math professor?",
    "What do students say about Dr. Smith's Chemistry class?",
    "Which English Literature professor has the highest rating?",
];

/// Interactive chat in the terminal
#[derive(Args, Debug)]
pub struct ChatCommand {
    /// Resume a saved chat
    #[arg(long)]
    pub chat_id: Option<String>,

    /// Hide retrieved review cards
    #[arg(long)]
    pub no_evidence: bool,
}

impl ChatCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing chat command");

        let assembler = build_assembler(config)?;
        let mut context = load_context(&assembler, self.chat_id.as_deref()).await?;

        println!("{}", WELCOME);
        println!("Ask anything about professors, for example:");
        for question in EXAMPLE_QUESTIONS {
            println!("  - {}", question);
        }
        println!("Type 'exit' to quit.\n");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            eprint!("> ");
            let Some(line) = lines.next_line().await? else {
                break;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line == "exit" || line == "quit" {
                break;
            }

            if let Err(e) = run_terminal_turn(&assembler, &mut context, line, !self.no_evidence).await
            {
                eprintln!("Error: {}", e);
            }
        }

        if !context.is_empty() {
            println!("Chat saved as {}", context.chat_id);
        }
        Ok(())
    }
}

/// A fresh chat, or the saved one with `chat_id`.
pub async fn load_context(
    assembler: &ResponseAssembler,
    chat_id: Option<&str>,
) -> AppResult<ChatContext> {
    let Some(chat_id) = chat_id else {
        return Ok(ChatContext::new());
    };

    let sessions = ChatSessions::new();
    let shared = sessions
        .get_or_load(chat_id, assembler.store().as_ref(), &LocalSession)
        .await?;
    let context = shared.lock().await.clone();
    if context.is_empty() {
        tracing::warn!("No saved chat '{}'; starting a new one with that id", chat_id);
    }
    Ok(context)
}

/// Run one turn, streaming to the terminal.
pub async fn run_terminal_turn(
    assembler: &ResponseAssembler,
    context: &mut ChatContext,
    content: &str,
    show_evidence: bool,
) -> AppResult<TurnOutcome> {
    let (ui, rx) = ui_channel();
    let renderer = spawn_terminal_renderer(rx, show_evidence);

    let result = assembler
        .submit_user_message(context, &LocalSession, content, &ui)
        .await;

    drop(ui);
    if let Err(e) = renderer.await {
        tracing::warn!("Terminal renderer failed: {}", e);
    }
    result
}
