//! HTTP surface: chat turns streamed over Server-Sent Events.
//!
//! - `POST /api/chat` with `{ "chatId"?, "message" }` streams `node`, `text`,
//!   then `done` (or `error`) events
//! - `GET /api/chats` lists the caller's chats
//! - `GET /api/chats/:id` returns the UI state of a chat
//! - `GET /health`

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use profrag_chat::{
    load_ui_state, new_id, ui_channel, ChatSessions, ResponseAssembler, Session,
    StaticTokenAuth, UiReceiver, UiUpdate,
};
use profrag_core::{config::AuthSettings, AppError, AppResult};
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

type EventSender = mpsc::UnboundedSender<Event>;

#[derive(Clone)]
pub struct AppState {
    assembler: Arc<ResponseAssembler>,
    sessions: Arc<ChatSessions>,
    auth: Arc<StaticTokenAuth>,
}

impl AppState {
    pub fn new(assembler: Arc<ResponseAssembler>, auth: &AuthSettings) -> Self {
        Self::with_auth(assembler, StaticTokenAuth::from_settings(auth))
    }

    pub fn with_auth(assembler: Arc<ResponseAssembler>, auth: StaticTokenAuth) -> Self {
        Self {
            assembler,
            sessions: Arc::new(ChatSessions::new()),
            auth: Arc::new(auth),
        }
    }

    fn session(&self, headers: &HeaderMap) -> Option<Session> {
        let header = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        self.auth.authenticate(header)
    }
}

pub fn router(state: AppState, allowed_origins: &[String]) -> AppResult<Router> {
    Ok(Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(post_chat))
        .route("/api/chats", get(list_chats))
        .route("/api/chats/:id", get(get_chat))
        .layer(cors_layer(allowed_origins)?)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

fn cors_layer(allowed_origins: &[String]) -> AppResult<CorsLayer> {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    if allowed_origins.is_empty() {
        return Ok(layer.allow_origin(Any));
    }

    let origins = allowed_origins
        .iter()
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .map_err(|e| AppError::Config(format!("Invalid CORS origin '{}': {}", origin, e)))
        })
        .collect::<AppResult<Vec<_>>>()?;
    Ok(layer.allow_origin(AllowOrigin::list(origins)))
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest {
    #[serde(default)]
    chat_id: Option<String>,
    message: String,
}

async fn post_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Response {
    let message = request.message.trim().to_string();
    if message.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "message must not be empty");
    }

    let session = state.session(&headers);
    let chat_id = request
        .chat_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(new_id);
    tracing::info!(chat_id = %chat_id, authenticated = session.is_some(), "Chat turn requested");

    let (events, rx) = mpsc::unbounded_channel();
    tokio::spawn(run_turn(state, session, chat_id, message, events));

    let stream = UnboundedReceiverStream::new(rx).map(Ok::<_, Infallible>);
    Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}

async fn run_turn(
    state: AppState,
    session: Option<Session>,
    chat_id: String,
    message: String,
    events: EventSender,
) {
    let store = state.assembler.store().clone();
    let shared = match state
        .sessions
        .get_or_load(&chat_id, store.as_ref(), &session)
        .await
    {
        Ok(shared) => shared,
        Err(e) => {
            send_error(&events, &e);
            return;
        }
    };

    // One turn at a time per chat
    let mut context = shared.lock().await;

    let (ui, rx) = ui_channel();
    let forwarder = tokio::spawn(forward_ui(rx, events.clone()));
    let result = state
        .assembler
        .submit_user_message(&mut context, &session, &message, &ui)
        .await;
    drop(ui);
    if let Err(e) = forwarder.await {
        tracing::warn!("UI forwarder failed: {}", e);
    }

    // Saved chats are reloaded from the store on the next turn
    let saved = match &result {
        Ok(outcome) => outcome.persisted,
        Err(_) => context.is_empty(),
    };
    drop(context);
    if let (true, Some(session)) = (saved, session.as_ref()) {
        if let Err(e) = state.sessions.release(&session.user_id, &chat_id, &shared) {
            tracing::warn!(chat_id = %chat_id, "Failed to release chat context: {}", e);
        }
    }

    match result {
        Ok(outcome) => {
            let payload = serde_json::json!({
                "chatId": chat_id,
                "messageId": outcome.message_id,
                "kind": outcome.kind,
                "display": outcome.display,
                "persisted": outcome.persisted,
            });
            send_json(&events, "done", &payload);
        }
        Err(e) => {
            tracing::error!(chat_id = %chat_id, error = %e, "Chat turn failed");
            send_error(&events, &e);
        }
    }
}

/// Turn UI updates into SSE events until the turn drops its sender.
async fn forward_ui(mut rx: UiReceiver, events: EventSender) {
    let mut text_tasks = JoinSet::new();

    while let Some(update) = rx.recv().await {
        match update {
            UiUpdate::Node(node) => send_json(&events, "node", &node),
            UiUpdate::Text(subscriber) => {
                let events = events.clone();
                text_tasks.spawn(async move {
                    let deltas = subscriber.deltas();
                    tokio::pin!(deltas);
                    while let Some(delta) = deltas.next().await {
                        if delta.is_empty() {
                            continue;
                        }
                        if events.send(Event::default().event("text").data(delta)).is_err() {
                            break;
                        }
                    }
                });
            }
        }
    }

    while text_tasks.join_next().await.is_some() {}
}

fn send_json<T: serde::Serialize>(events: &EventSender, name: &str, payload: &T) {
    match Event::default().event(name).json_data(payload) {
        Ok(event) => {
            if events.send(event).is_err() {
                tracing::debug!("Client disconnected; dropping '{}' event", name);
            }
        }
        Err(e) => tracing::warn!("Failed to encode '{}' event: {}", name, e),
    }
}

fn send_error(events: &EventSender, error: &AppError) {
    send_json(events, "error", &serde_json::json!({ "error": error.to_string() }));
}

async fn list_chats(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(session) = state.session(&headers) else {
        return Json(serde_json::json!({ "chats": [] })).into_response();
    };

    match state.assembler.store().list(&session.user_id).await {
        Ok(chats) => {
            let chats: Vec<_> = chats
                .iter()
                .map(|c| {
                    serde_json::json!({
                        "chatId": c.chat_id,
                        "title": c.title,
                        "createdAt": c.created_at,
                        "path": c.path,
                    })
                })
                .collect();
            Json(serde_json::json!({ "chats": chats })).into_response()
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

async fn get_chat(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let session = state.session(&headers);
    match load_ui_state(state.assembler.store().as_ref(), &session, &chat_id).await {
        Ok(messages) => {
            Json(serde_json::json!({ "chatId": chat_id, "messages": messages })).into_response()
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}
