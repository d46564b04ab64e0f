//! Serve command handler.
//!
//! Runs the HTTP chat server.

use clap::Args;
use profrag_core::{config::AppConfig, AppError, AppResult};

use crate::server::{router, AppState};
use crate::services::build_assembler;

/// Serve the chat over HTTP with Server-Sent Events
#[derive(Args, Debug)]
pub struct ServeCommand {
    /// Address to bind (default: server.bind)
    #[arg(short, long)]
    pub bind: Option<String>,
}

impl ServeCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let bind = self.bind.as_deref().unwrap_or(&config.server.bind);
        tracing::info!("Executing serve command on {}", bind);

        if config.auth.tokens.is_empty() {
            tracing::warn!("No auth tokens configured; chats will not be saved");
        }

        let state = AppState::new(build_assembler(config)?, &config.auth);
        let app = router(state, &config.server.allowed_origins)?;

        let listener = tokio::net::TcpListener::bind(bind)
            .await
            .map_err(|e| AppError::Config(format!("Failed to bind {}: {}", bind, e)))?;
        tracing::info!("Listening on http://{}", bind);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
