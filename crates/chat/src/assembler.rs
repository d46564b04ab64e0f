//! Response assembly for one chat turn.
//!
//! A turn moves `Idle -> AwaitingModel -> StreamingText -> Done`, with the
//! side branch `AwaitingModel -> ToolExecuting -> StreamingText` when the
//! model asks for the retrieval tool. Text deltas go into a
//! [`StreamableText`] the UI observes; the session state and the store only
//! change once the turn reaches `Done`.

use crate::auth::SessionProvider;
use crate::context::ChatContext;
use crate::conversation::{new_id, ChatMessage, ChatRole, MessageContent, ToolResult};
use crate::gate::should_retrieve;
use crate::store::{save_context, ConversationStore};
use crate::streamable::{StreamableText, TextSubscriber};
use crate::ui::{push, UiNode, UiSender, UiUpdate};
use futures::StreamExt;
use profrag_core::{AppError, AppResult};
use profrag_knowledge::Retriever;
use profrag_llm::{LlmClient, LlmEvent, LlmMessage, LlmRequest, Role, ToolCall, ToolDefinition};
use profrag_prompt::{PromptSet, RETRIEVAL_TOOL_NAME};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    AwaitingModel,
    ToolExecuting,
    StreamingText,
    Done,
}

impl TurnPhase {
    fn can_advance_to(self, next: TurnPhase) -> bool {
        use TurnPhase::*;
        matches!(
            (self, next),
            (Idle, AwaitingModel)
                | (AwaitingModel, ToolExecuting)
                | (AwaitingModel, StreamingText)
                | (AwaitingModel, Done)
                // Some models say a few words before calling the tool
                | (StreamingText, ToolExecuting)
                | (ToolExecuting, StreamingText)
                | (ToolExecuting, Done)
                | (StreamingText, Done)
        )
    }
}

#[derive(Debug)]
struct TurnState {
    phase: TurnPhase,
}

impl TurnState {
    fn new() -> Self {
        Self {
            phase: TurnPhase::Idle,
        }
    }

    fn advance(&mut self, next: TurnPhase) -> AppResult<()> {
        if !self.phase.can_advance_to(next) {
            return Err(AppError::Chat(format!(
                "Invalid turn transition {:?} -> {:?}",
                self.phase, next
            )));
        }
        tracing::trace!(from = ?self.phase, to = ?next, "Turn phase");
        self.phase = next;
        Ok(())
    }
}

/// Which branch a turn took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TurnKind {
    PlainText,
    ToolInvocation,
}

/// Result of a completed turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    /// Fresh id for the rendered assistant message
    pub message_id: String,

    /// Finalized assistant text node
    pub display: UiNode,

    pub kind: TurnKind,

    /// Whether the conversation reached the store
    pub persisted: bool,
}

/// What one model request asked for beyond its streamed text.
struct ModelPass {
    tool_calls: Vec<ToolCall>,
}

/// Live text of a turn; the subscriber goes to the UI on first use.
struct TurnText {
    writer: StreamableText,
    unsent: Option<TextSubscriber>,
}

impl TurnText {
    fn new() -> Self {
        let (writer, subscriber) = StreamableText::new();
        Self {
            writer,
            unsent: Some(subscriber),
        }
    }

    fn announce(&mut self, ui: &UiSender) {
        if let Some(subscriber) = self.unsent.take() {
            push(ui, UiUpdate::Text(subscriber));
        }
    }
}

/// Orchestrates chat turns against a model, the retriever and the store.
pub struct ResponseAssembler {
    llm: Arc<dyn LlmClient>,
    model: String,
    prompts: Arc<PromptSet>,
    retriever: Retriever,
    store: Arc<dyn ConversationStore>,
}

impl ResponseAssembler {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        model: impl Into<String>,
        prompts: Arc<PromptSet>,
        retriever: Retriever,
        store: Arc<dyn ConversationStore>,
    ) -> Self {
        Self {
            llm,
            model: model.into(),
            prompts,
            retriever,
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    fn retrieval_tool(&self) -> ToolDefinition {
        ToolDefinition {
            name: RETRIEVAL_TOOL_NAME.to_string(),
            description: self.prompts.retrieval_tool_description().to_string(),
            parameters: self.prompts.retrieval_tool_parameters(),
        }
    }

    /// Run one turn for `content`.
    ///
    /// UI updates are pushed to `ui` as they happen. On error the context is
    /// left exactly as it was.
    #[tracing::instrument(skip_all, fields(chat_id = %context.chat_id))]
    pub async fn submit_user_message(
        &self,
        context: &mut ChatContext,
        session: &dyn SessionProvider,
        content: &str,
        ui: &UiSender,
    ) -> AppResult<TurnOutcome> {
        let mut state = TurnState::new();
        let mut pending = context.messages.clone();
        pending.push(ChatMessage::user(content));
        state.advance(TurnPhase::AwaitingModel)?;

        let offer_tool = should_retrieve(content);
        tracing::debug!(offer_tool, "Keyword gate");

        let system = self.prompts.system_prompt()?;
        let mut history = self.to_llm_messages(&pending)?;
        let mut request =
            LlmRequest::new(self.model.clone(), history.clone()).with_system(system.clone());
        if offer_tool {
            request = request.with_tools(vec![self.retrieval_tool()]);
        }

        let mut text = TurnText::new();
        let first = self.run_model(&request, &mut text, ui, &mut state).await?;

        let tool_call = select_tool_call(first.tool_calls, offer_tool);
        let mut tool_message = None;
        let kind = match tool_call {
            None => TurnKind::PlainText,
            Some(call) => {
                state.advance(TurnPhase::ToolExecuting)?;
                push(ui, UiUpdate::Node(UiNode::searching()));

                let query = call.str_arg("query").unwrap_or(content).to_string();
                tracing::info!(query = %query, "Running retrieval tool");
                let matches = self.retriever.retrieve(&query).await;
                let evidence = self.prompts.render_evidence(&matches)?;
                push(
                    ui,
                    UiUpdate::Node(UiNode::Evidence {
                        matches: matches.clone(),
                    }),
                );

                history.push(LlmMessage::tool_request(vec![call.clone()]));
                history.push(LlmMessage::tool_result(call.id.clone(), evidence));

                // No tools on the continuation: the tool runs at most once
                let continuation = LlmRequest::new(self.model.clone(), history).with_system(system);
                let second = self
                    .run_model(&continuation, &mut text, ui, &mut state)
                    .await?;
                if !second.tool_calls.is_empty() {
                    tracing::warn!(
                        count = second.tool_calls.len(),
                        "Ignoring tool calls in continuation"
                    );
                }

                tool_message = Some(ChatMessage::tool_results(vec![ToolResult {
                    tool_name: call.name,
                    tool_call_id: call.id,
                    arguments: call.arguments,
                    result: matches,
                }]));
                TurnKind::ToolInvocation
            }
        };

        text.announce(ui);
        state.advance(TurnPhase::Done)?;
        let final_text = text.writer.seal()?;

        pending.extend(tool_message);
        pending.push(ChatMessage::assistant(final_text.clone()));
        context.messages = pending;

        let persisted = match save_context(self.store.as_ref(), session, context).await {
            Ok(saved) => saved,
            Err(e) => {
                tracing::error!(error = %e, "Failed to save conversation");
                false
            }
        };

        tracing::info!(kind = ?kind, chars = final_text.chars().count(), "Turn complete");
        Ok(TurnOutcome {
            message_id: new_id(),
            display: UiNode::Text { text: final_text },
            kind,
            persisted,
        })
    }

    async fn run_model(
        &self,
        request: &LlmRequest,
        text: &mut TurnText,
        ui: &UiSender,
        state: &mut TurnState,
    ) -> AppResult<ModelPass> {
        let mut stream = self.llm.stream(request).await?;
        let mut streamed_calls = Vec::new();

        while let Some(event) = stream.next().await {
            match event? {
                LlmEvent::TextDelta(delta) => {
                    if state.phase != TurnPhase::StreamingText {
                        state.advance(TurnPhase::StreamingText)?;
                    }
                    text.announce(ui);
                    text.writer.append(&delta)?;
                }
                LlmEvent::ToolCall(call) => streamed_calls.push(call),
                LlmEvent::Done(completion) => {
                    tracing::debug!(
                        model = %completion.model,
                        total_tokens = completion.usage.total_tokens,
                        "Model pass complete"
                    );
                    let tool_calls = if completion.tool_calls.is_empty() {
                        streamed_calls
                    } else {
                        completion.tool_calls
                    };
                    return Ok(ModelPass { tool_calls });
                }
            }
        }

        Err(AppError::Llm(
            "Model stream ended without completing".to_string(),
        ))
    }

    /// History as model messages. Tool results are replayed as the call
    /// followed by its rendered evidence.
    fn to_llm_messages(&self, messages: &[ChatMessage]) -> AppResult<Vec<LlmMessage>> {
        let mut out = Vec::with_capacity(messages.len());
        for message in messages {
            match &message.content {
                MessageContent::Text(text) => {
                    let role = match message.role {
                        ChatRole::User => Role::User,
                        ChatRole::Assistant => Role::Assistant,
                        ChatRole::System => Role::System,
                        ChatRole::Tool => {
                            tracing::warn!(id = %message.id, "Skipping tool message without results");
                            continue;
                        }
                    };
                    out.push(LlmMessage::new(role, text.clone()));
                }
                MessageContent::ToolResults(results) => {
                    for result in results {
                        out.push(LlmMessage::tool_request(vec![ToolCall {
                            id: result.tool_call_id.clone(),
                            name: result.tool_name.clone(),
                            arguments: result.arguments.clone(),
                        }]));
                        out.push(LlmMessage::tool_result(
                            result.tool_call_id.clone(),
                            self.prompts.render_evidence(&result.result)?,
                        ));
                    }
                }
            }
        }
        Ok(out)
    }
}

/// The retrieval call to run, if the tool was offered and requested.
fn select_tool_call(calls: Vec<ToolCall>, offered: bool) -> Option<ToolCall> {
    if calls.is_empty() {
        return None;
    }
    if !offered {
        tracing::warn!(count = calls.len(), "Model called a tool that was not offered");
        return None;
    }

    let mut calls = calls.into_iter();
    let selected = calls.by_ref().find(|c| c.name == RETRIEVAL_TOOL_NAME);
    let ignored = calls.count();
    if ignored > 0 {
        tracing::warn!(ignored, "Only one retrieval call runs per turn");
    }
    if selected.is_none() {
        tracing::warn!("Model called an unknown tool");
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{LocalSession, Session};
    use crate::store::SqliteConversationStore;
    use crate::ui::{ui_channel, UiReceiver, NO_EVIDENCE_TEXT, SEARCHING_PLACEHOLDER};
    use crate::ui_state::load_ui_state;
    use profrag_knowledge::embeddings::providers::mock::MockProvider;
    use profrag_knowledge::{
        builtin_reviews, ingest, EmbeddingProvider, IndexSpec, IndexedVector, SqliteVectorStore,
        VectorMatch, VectorQuery, VectorStore,
    };
    use profrag_llm::{LlmCompletion, LlmStream, LlmUsage};
    use std::sync::Mutex;

    type Script = Box<dyn Fn(&LlmRequest) -> Vec<AppResult<LlmEvent>> + Send + Sync>;

    /// Answers each request with the events its script produces.
    struct ScriptedClient {
        script: Script,
        requests: Mutex<Vec<LlmRequest>>,
    }

    impl ScriptedClient {
        fn new(script: Script) -> Arc<Self> {
            Arc::new(Self {
                script,
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<LlmRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl LlmClient for ScriptedClient {
        fn provider_name(&self) -> &str {
            "scripted"
        }

        async fn stream(&self, request: &LlmRequest) -> AppResult<LlmStream> {
            self.requests.lock().unwrap().push(request.clone());
            let events = (self.script)(request);
            Ok(Box::pin(futures::stream::iter(events)))
        }
    }

    struct UnreachableStore;

    #[async_trait::async_trait]
    impl VectorStore for UnreachableStore {
        fn backend_name(&self) -> &str {
            "unreachable"
        }

        async fn exists(&self, _collection: &str) -> AppResult<bool> {
            Err(AppError::VectorStore("connection refused".to_string()))
        }

        async fn create(&self, _collection: &str, _spec: &IndexSpec) -> AppResult<()> {
            Err(AppError::VectorStore("connection refused".to_string()))
        }

        async fn upsert(&self, _collection: &str, _records: &[IndexedVector]) -> AppResult<usize> {
            Err(AppError::VectorStore("connection refused".to_string()))
        }

        async fn query(&self, _collection: &str, _query: &VectorQuery) -> AppResult<Vec<VectorMatch>> {
            Err(AppError::VectorStore("connection refused".to_string()))
        }

        async fn count(&self, _collection: &str) -> AppResult<usize> {
            Err(AppError::VectorStore("connection refused".to_string()))
        }
    }

    fn done(content: &str, tool_calls: Vec<ToolCall>) -> AppResult<LlmEvent> {
        Ok(LlmEvent::Done(LlmCompletion {
            content: content.to_string(),
            model: "scripted".to_string(),
            tool_calls,
            usage: LlmUsage::new(10, 5),
        }))
    }

    fn text_reply(parts: &[&str]) -> Vec<AppResult<LlmEvent>> {
        let mut events: Vec<AppResult<LlmEvent>> = parts
            .iter()
            .map(|p| Ok(LlmEvent::TextDelta(p.to_string())))
            .collect();
        events.push(done(&parts.concat(), vec![]));
        events
    }

    fn retrieval_call(query: &str) -> ToolCall {
        ToolCall {
            id: "call_0".to_string(),
            name: RETRIEVAL_TOOL_NAME.to_string(),
            arguments: serde_json::json!({"query": query}),
        }
    }

    /// Calls the tool when offered, then names the first professor in the
    /// evidence it gets back.
    fn rag_script() -> Script {
        Box::new(|request: &LlmRequest| {
            if !request.tools.is_empty() {
                let call = retrieval_call("best Math professor");
                return vec![Ok(LlmEvent::ToolCall(call.clone())), done("", vec![call])];
            }

            let evidence = request
                .messages
                .iter()
                .rev()
                .find(|m| m.role == Role::Tool)
                .map(|m| m.content.clone())
                .unwrap_or_default();
            let name = evidence
                .lines()
                .find_map(|l| l.strip_prefix("Professor: "))
                .unwrap_or("nobody")
                .to_string();
            let answer = format!("Based on the reviews, {} stands out.", name);
            vec![
                Ok(LlmEvent::TextDelta("Based on the reviews, ".to_string())),
                Ok(LlmEvent::TextDelta(format!("{} stands out.", name))),
                done(&answer, vec![]),
            ]
        })
    }

    async fn indexed_retriever() -> Retriever {
        let store = Arc::new(SqliteVectorStore::in_memory().unwrap());
        let embedder = Arc::new(MockProvider::new(64));
        let spec = IndexSpec {
            dimension: 64,
            ..Default::default()
        };
        ingest(embedder.as_ref(), store.as_ref(), &builtin_reviews(), "professors", &spec)
            .await
            .unwrap();
        Retriever::new(embedder, store, "professors")
    }

    /// Two-dimensional embedding: anything about maths points one way,
    /// everything else the other.
    #[derive(Debug)]
    struct TopicEmbedder;

    #[async_trait::async_trait]
    impl EmbeddingProvider for TopicEmbedder {
        fn provider_name(&self) -> &str {
            "topic"
        }

        fn model_name(&self) -> &str {
            "topic"
        }

        fn dimensions(&self) -> usize {
            2
        }

        async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    if t.to_lowercase().contains("math") {
                        vec![1.0, 0.0]
                    } else {
                        vec![0.0, 1.0]
                    }
                })
                .collect())
        }
    }

    /// Built-in reviews stored with vectors placed by subject.
    async fn subject_retriever() -> Retriever {
        let store = Arc::new(SqliteVectorStore::in_memory().unwrap());
        let spec = IndexSpec {
            dimension: 2,
            ..Default::default()
        };
        store.create("professors", &spec).await.unwrap();

        let vectors: Vec<IndexedVector> = builtin_reviews()
            .iter()
            .map(|review| IndexedVector {
                id: review.id.clone(),
                values: if review.subject == "Mathematics" {
                    vec![1.0, 0.0]
                } else {
                    vec![0.0, 1.0]
                },
                metadata: review.metadata(),
            })
            .collect();
        store.upsert("professors", &vectors).await.unwrap();

        Retriever::new(Arc::new(TopicEmbedder), store, "professors")
    }

    fn assembler(
        llm: Arc<ScriptedClient>,
        retriever: Retriever,
    ) -> (ResponseAssembler, Arc<SqliteConversationStore>) {
        let store = Arc::new(SqliteConversationStore::in_memory().unwrap());
        let assembler = ResponseAssembler::new(
            llm,
            "test-model",
            Arc::new(PromptSet::builtin().unwrap()),
            retriever,
            store.clone(),
        );
        (assembler, store)
    }

    fn drain(rx: &mut UiReceiver) -> Vec<UiUpdate> {
        let mut updates = Vec::new();
        while let Ok(update) = rx.try_recv() {
            updates.push(update);
        }
        updates
    }

    #[tokio::test]
    async fn test_math_question_runs_retrieval_and_cites_professor() {
        let llm = ScriptedClient::new(rag_script());
        let (assembler, store) = assembler(llm.clone(), subject_retriever().await);
        let (ui, mut rx) = ui_channel();
        let mut context = ChatContext::with_id("chat-a");

        let outcome = assembler
            .submit_user_message(&mut context, &LocalSession, "Who is the best Math professor?", &ui)
            .await
            .unwrap();

        assert_eq!(outcome.kind, TurnKind::ToolInvocation);
        assert!(outcome.persisted);

        let updates = drain(&mut rx);
        assert!(matches!(
            &updates[0],
            UiUpdate::Node(UiNode::Placeholder { text }) if text == SEARCHING_PLACEHOLDER
        ));
        let matches = match &updates[1] {
            UiUpdate::Node(UiNode::Evidence { matches }) => matches.clone(),
            other => panic!("expected evidence, got {:?}", other),
        };
        assert_eq!(matches.len(), 10);
        assert!(matches.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(matches[0].subject, "Mathematics");
        assert_eq!(
            matches.iter().filter(|m| m.subject == "Mathematics").count(),
            2
        );
        assert!(matches!(updates[2], UiUpdate::Text(_)));
        assert_eq!(updates.len(), 3);

        let UiNode::Text { text } = &outcome.display else {
            panic!("expected text node");
        };
        assert!(text.contains(&matches[0].professor));

        // user, tool results, assistant
        let roles: Vec<ChatRole> = context.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![ChatRole::User, ChatRole::Tool, ChatRole::Assistant]);

        // Tool offered once, continuation without tools
        let requests = llm.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].tools.len(), 1);
        assert!(requests[1].tools.is_empty());
        assert_eq!(requests[1].messages.last().unwrap().role, Role::Tool);
        assert!(requests[0].system.as_deref().unwrap().contains(RETRIEVAL_TOOL_NAME));

        let saved = store.load("chat-a", "local").await.unwrap().unwrap();
        assert_eq!(saved.messages, context.messages);
        assert_eq!(saved.title, "Who is the best Math professor?");
    }

    #[tokio::test]
    async fn test_greeting_skips_retrieval() {
        let llm = ScriptedClient::new(Box::new(|_req: &LlmRequest| {
            text_reply(&["I'm doing well, ", "thanks!"])
        }));
        let (assembler, _store) = assembler(llm.clone(), indexed_retriever().await);
        let (ui, mut rx) = ui_channel();
        let mut context = ChatContext::new();

        let outcome = assembler
            .submit_user_message(&mut context, &LocalSession, "Hello, how are you?", &ui)
            .await
            .unwrap();

        assert_eq!(outcome.kind, TurnKind::PlainText);
        assert_eq!(
            outcome.display,
            UiNode::Text {
                text: "I'm doing well, thanks!".to_string()
            }
        );
        assert!(llm.requests()[0].tools.is_empty());

        let updates = drain(&mut rx);
        assert_eq!(updates.len(), 1);
        match &updates[0] {
            UiUpdate::Text(subscriber) => {
                let snapshot = subscriber.snapshot();
                assert!(snapshot.sealed);
                assert_eq!(snapshot.text, "I'm doing well, thanks!");
            }
            other => panic!("expected text, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_store_failure_degrades_to_empty_evidence() {
        let llm = ScriptedClient::new(rag_script());
        let retriever = Retriever::new(
            Arc::new(MockProvider::new(64)),
            Arc::new(UnreachableStore),
            "professors",
        );
        let (assembler, _store) = assembler(llm.clone(), retriever);
        let (ui, mut rx) = ui_channel();
        let mut context = ChatContext::new();

        let outcome = assembler
            .submit_user_message(&mut context, &LocalSession, "Which course is easiest?", &ui)
            .await
            .unwrap();

        assert_eq!(outcome.kind, TurnKind::ToolInvocation);
        assert_eq!(
            outcome.display,
            UiNode::Text {
                text: "Based on the reviews, nobody stands out.".to_string()
            }
        );

        let updates = drain(&mut rx);
        match &updates[1] {
            UiUpdate::Node(node) => {
                assert_eq!(node, &UiNode::Evidence { matches: vec![] });
                assert_eq!(node.to_plain_text(), NO_EVIDENCE_TEXT);
            }
            other => panic!("expected evidence, got {:?}", other),
        }

        let continuation = &llm.requests()[1];
        assert_eq!(
            continuation.messages.last().unwrap().content,
            NO_EVIDENCE_TEXT
        );
    }

    #[tokio::test]
    async fn test_model_failure_leaves_state_unchanged() {
        let llm = ScriptedClient::new(Box::new(|_req: &LlmRequest| {
            vec![
                Ok(LlmEvent::TextDelta("Partial".to_string())),
                Err(AppError::Llm("connection reset".to_string())),
            ]
        }));
        let (assembler, store) = assembler(llm, indexed_retriever().await);
        let (ui, mut rx) = ui_channel();
        let mut context = ChatContext::with_id("chat-fail");
        context.messages.push(ChatMessage::user("earlier"));
        context.messages.push(ChatMessage::assistant("earlier answer"));
        let before = context.clone();

        let result = assembler
            .submit_user_message(&mut context, &LocalSession, "Hello", &ui)
            .await;

        assert!(result.is_err());
        assert_eq!(context, before);
        assert!(store.load("chat-fail", "local").await.unwrap().is_none());

        // The UI saw partial text that never got sealed
        let updates = drain(&mut rx);
        match &updates[0] {
            UiUpdate::Text(subscriber) => assert!(!subscriber.snapshot().sealed),
            other => panic!("expected text, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stream_without_done_is_error() {
        let llm = ScriptedClient::new(Box::new(|_req: &LlmRequest| {
            vec![Ok(LlmEvent::TextDelta("cut off".to_string()))]
        }));
        let (assembler, _store) = assembler(llm, indexed_retriever().await);
        let (ui, _rx) = ui_channel();
        let mut context = ChatContext::new();

        let result = assembler
            .submit_user_message(&mut context, &LocalSession, "Hello", &ui)
            .await;
        assert!(matches!(result, Err(AppError::Llm(_))));
        assert!(context.is_empty());
    }

    #[tokio::test]
    async fn test_messages_append_in_order_across_turns() {
        let llm = ScriptedClient::new(Box::new(|req: &LlmRequest| {
            let reply = format!("reply {}", req.messages.len());
            text_reply(&[&reply])
        }));
        let (assembler, store) = assembler(llm.clone(), indexed_retriever().await);
        let (ui, _rx) = ui_channel();
        let mut context = ChatContext::with_id("chat-order");

        for question in ["first", "second", "third"] {
            assembler
                .submit_user_message(&mut context, &LocalSession, question, &ui)
                .await
                .unwrap();
        }

        let texts: Vec<&str> = context
            .messages
            .iter()
            .filter_map(|m| m.content.as_text())
            .collect();
        assert_eq!(
            texts,
            vec!["first", "reply 1", "second", "reply 3", "third", "reply 5"]
        );

        // Full history goes to the model every turn
        assert_eq!(llm.requests()[2].messages.len(), 5);

        let saved = store.load("chat-order", "local").await.unwrap().unwrap();
        assert_eq!(saved.messages.len(), 6);
        assert_eq!(saved.title, "first");
    }

    #[tokio::test]
    async fn test_history_replays_tool_results() {
        let llm = ScriptedClient::new(rag_script());
        let (assembler, _store) = assembler(llm.clone(), indexed_retriever().await);
        let (ui, _rx) = ui_channel();
        let mut context = ChatContext::new();

        assembler
            .submit_user_message(&mut context, &LocalSession, "Best professor?", &ui)
            .await
            .unwrap();
        assembler
            .submit_user_message(&mut context, &LocalSession, "And her class?", &ui)
            .await
            .unwrap();

        let third = &llm.requests()[2];
        let roles: Vec<Role> = third.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                Role::User,
                Role::Assistant,
                Role::Tool,
                Role::Assistant,
                Role::User
            ]
        );
        assert_eq!(third.messages[1].tool_calls[0].id, "call_0");
        assert_eq!(third.messages[2].tool_call_id.as_deref(), Some("call_0"));
    }

    #[tokio::test]
    async fn test_unauthenticated_turn_is_not_persisted() {
        let llm = ScriptedClient::new(Box::new(|_req: &LlmRequest| text_reply(&["Hi!"])));
        let (assembler, store) = assembler(llm, indexed_retriever().await);
        let (ui, _rx) = ui_channel();
        let mut context = ChatContext::with_id("chat-anon");
        let anonymous: Option<Session> = None;

        let outcome = assembler
            .submit_user_message(&mut context, &anonymous, "Hello", &ui)
            .await
            .unwrap();

        assert!(!outcome.persisted);
        assert_eq!(context.messages.len(), 2);
        assert!(load_ui_state(store.as_ref(), &anonymous, "chat-anon")
            .await
            .unwrap()
            .is_empty());
        assert!(store.load("chat-anon", "local").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_tool_call_ignored_when_not_offered() {
        let llm = ScriptedClient::new(Box::new(|_req: &LlmRequest| {
            let call = retrieval_call("anything");
            vec![
                Ok(LlmEvent::TextDelta("Hello!".to_string())),
                done("Hello!", vec![call]),
            ]
        }));
        let (assembler, _store) = assembler(llm.clone(), indexed_retriever().await);
        let (ui, _rx) = ui_channel();
        let mut context = ChatContext::new();

        let outcome = assembler
            .submit_user_message(&mut context, &LocalSession, "Hello", &ui)
            .await
            .unwrap();

        assert_eq!(outcome.kind, TurnKind::PlainText);
        assert_eq!(llm.requests().len(), 1);
        assert_eq!(context.messages.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_response_still_completes() {
        let llm = ScriptedClient::new(Box::new(|_req: &LlmRequest| vec![done("", vec![])]));
        let (assembler, _store) = assembler(llm, indexed_retriever().await);
        let (ui, mut rx) = ui_channel();
        let mut context = ChatContext::new();

        let outcome = assembler
            .submit_user_message(&mut context, &LocalSession, "Hello", &ui)
            .await
            .unwrap();

        assert_eq!(outcome.display, UiNode::Text { text: String::new() });
        assert!(matches!(drain(&mut rx).as_slice(), [UiUpdate::Text(_)]));
    }

    #[test]
    fn test_phase_transitions() {
        let mut state = TurnState::new();
        assert!(state.advance(TurnPhase::StreamingText).is_err());
        state.advance(TurnPhase::AwaitingModel).unwrap();
        state.advance(TurnPhase::ToolExecuting).unwrap();
        state.advance(TurnPhase::StreamingText).unwrap();
        state.advance(TurnPhase::Done).unwrap();
        assert!(state.advance(TurnPhase::StreamingText).is_err());
    }

    #[test]
    fn test_select_tool_call() {
        assert!(select_tool_call(vec![], true).is_none());
        assert!(select_tool_call(vec![retrieval_call("x")], false).is_none());

        let other = ToolCall {
            id: "call_9".to_string(),
            name: "deleteEverything".to_string(),
            arguments: serde_json::json!({}),
        };
        assert!(select_tool_call(vec![other.clone()], true).is_none());
        let picked = select_tool_call(vec![other, retrieval_call("x")], true).unwrap();
        assert_eq!(picked.name, RETRIEVAL_TOOL_NAME);
    }
}
