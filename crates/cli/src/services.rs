//! Wiring of configured providers, stores and the response assembler.

use profrag_chat::{ConversationStore, ResponseAssembler, SqliteConversationStore};
use profrag_core::{config::AppConfig, AppResult};
use profrag_knowledge::{create_provider, create_store, Retriever};
use profrag_llm::{create_client, LlmClient};
use profrag_prompt::PromptSet;
use std::sync::Arc;

pub fn build_retriever(config: &AppConfig) -> AppResult<Retriever> {
    let embedder = create_provider(&config.embedding, config.resolve_embedding_key().as_deref())?;
    let store = create_store(config)?;
    tracing::debug!(
        embedder = embedder.provider_name(),
        store = store.backend_name(),
        index = %config.vector_store.index_name,
        "Built retriever"
    );

    Ok(Retriever::new(embedder, store, config.vector_store.index_name.clone())
        .with_top_k(config.retrieval.top_k))
}

pub fn build_llm(config: &AppConfig) -> AppResult<Arc<dyn LlmClient>> {
    let endpoint = config.provider_endpoint(&config.provider);
    let api_key = config.resolve_api_key(&config.provider);
    create_client(&config.provider, endpoint.as_deref(), api_key.as_deref())
}

pub fn open_conversation_store(config: &AppConfig) -> AppResult<Arc<dyn ConversationStore>> {
    Ok(Arc::new(SqliteConversationStore::open(
        &config.conversation_db_path(),
    )?))
}

/// Everything a chat turn needs.
pub fn build_assembler(config: &AppConfig) -> AppResult<Arc<ResponseAssembler>> {
    let prompts = PromptSet::load(Some(&config.workspace))?;
    Ok(Arc::new(ResponseAssembler::new(
        build_llm(config)?,
        config.model.clone(),
        Arc::new(prompts),
        build_retriever(config)?,
        open_conversation_store(config)?,
    )))
}
