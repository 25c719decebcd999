//! HTTP API for Pili.
//!
//! Endpoints (under `/api`):
//!
//! - `POST /api/chat`          — Send a message, get a response + trace
//! - `POST /api/chat/stream`   — Send a message, get an SSE event stream
//! - `GET  /api/health`        — Health check
//! - `GET  /api/memory/stats`  — Session stats, or global aggregate
//! - `GET  /api/memory/history`— Recent messages for a session
//! - `GET  /api/memory/search` — Term search over a user's conversations
//! - `DELETE /api/memory/{user_id}` — Clear one session or all
//!
//! Memory endpoints touch conversation state only — they never reach the
//! agent runtime.

use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event as SseEvent, Sse},
    response::Json,
    routing::{delete, get, post},
};
use pili_agent::{ChatService, TraceEntry, TurnEvent};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Build the API router.
pub fn router(chat: Arc<ChatService>) -> Router {
    Router::new()
        .route("/api/chat", post(chat_handler))
        .route("/api/chat/stream", post(chat_stream_handler))
        .route("/api/health", get(health_handler))
        .route("/api/memory/stats", get(memory_stats_handler))
        .route("/api/memory/history", get(memory_history_handler))
        .route("/api/memory/search", get(memory_search_handler))
        .route("/api/memory/{user_id}", delete(memory_clear_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(chat)
}

// ── Request / Response types ──────────────────────────────────────────────

#[derive(Deserialize)]
struct ChatRequest {
    user_id: String,
    message: String,
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Serialize)]
struct ChatResponse {
    response: String,
    logs: Vec<TraceEntryDto>,
}

#[derive(Serialize)]
struct TraceEntryDto {
    kind: String,
    content: String,
    agent: String,
}

impl From<&TraceEntry> for TraceEntryDto {
    fn from(entry: &TraceEntry) -> Self {
        Self {
            kind: entry.kind.as_str().into(),
            content: entry.content.clone(),
            agent: entry.agent.clone(),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Deserialize)]
struct StatsQuery {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Deserialize)]
struct HistoryQuery {
    user_id: String,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default = "default_limit")]
    limit: usize,
}

#[derive(Deserialize)]
struct SearchQuery {
    user_id: String,
    q: String,
    #[serde(default = "default_limit")]
    limit: usize,
}

#[derive(Deserialize)]
struct ClearQuery {
    #[serde(default)]
    session_id: Option<String>,
}

fn default_limit() -> usize {
    10
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn validate_chat(payload: &ChatRequest) -> Result<(), ApiError> {
    if payload.user_id.trim().is_empty() {
        return Err(bad_request("user_id must not be empty"));
    }
    if payload.message.trim().is_empty() {
        return Err(bad_request("message must not be empty"));
    }
    Ok(())
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn chat_handler(
    State(chat): State<Arc<ChatService>>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    validate_chat(&payload)?;
    let session_id = payload
        .session_id
        .as_deref()
        .unwrap_or(pili_agent::service::DEFAULT_SESSION);

    info!(user_id = %payload.user_id, session_id, "chat request");

    let outcome = chat
        .chat(&payload.user_id, session_id, &payload.message)
        .await;

    Ok(Json(ChatResponse {
        response: outcome.response,
        logs: outcome.trace.iter().map(TraceEntryDto::from).collect(),
    }))
}

async fn chat_stream_handler(
    State(chat): State<Arc<ChatService>>,
    Json(payload): Json<ChatRequest>,
) -> Result<Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    validate_chat(&payload)?;
    let session_id = payload
        .session_id
        .as_deref()
        .unwrap_or(pili_agent::service::DEFAULT_SESSION);

    info!(user_id = %payload.user_id, session_id, "chat stream request");

    let rx = chat
        .chat_stream(&payload.user_id, session_id, &payload.message)
        .await;

    let stream = ReceiverStream::new(rx).map(|event: TurnEvent| {
        let name = event.event_type();
        let data = serde_json::to_string(&event).unwrap_or_default();
        Ok(SseEvent::default().event(name).data(data))
    });

    Ok(Sse::new(stream))
}

/// Bind `addr` and serve the API until shutdown.
pub async fn serve(chat: Arc<ChatService>, addr: &str) -> std::io::Result<()> {
    let app = router(chat);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr, "Pili server listening");
    axum::serve(listener, app).await
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy", "service": "pili" }))
}

async fn memory_stats_handler(
    State(chat): State<Arc<ChatService>>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let memory = chat.memory();
    match query.user_id {
        Some(user_id) => {
            let session_id = query.session_id.as_deref().unwrap_or("default");
            match memory.session_stats(&user_id, session_id).await {
                Some(stats) => Ok(Json(serde_json::to_value(stats).unwrap_or_default())),
                None => Err((
                    StatusCode::NOT_FOUND,
                    Json(ErrorResponse {
                        error: format!("No conversation for user '{user_id}'"),
                    }),
                )),
            }
        }
        None => {
            let usage = memory.usage().await;
            Ok(Json(serde_json::to_value(usage).unwrap_or_default()))
        }
    }
}

async fn memory_history_handler(
    State(chat): State<Arc<ChatService>>,
    Query(query): Query<HistoryQuery>,
) -> Json<serde_json::Value> {
    let session_id = query.session_id.as_deref().unwrap_or("default");
    let messages = chat
        .memory()
        .history(&query.user_id, session_id, query.limit)
        .await;
    Json(serde_json::json!({
        "user_id": query.user_id,
        "session_id": session_id,
        "messages": messages,
    }))
}

async fn memory_search_handler(
    State(chat): State<Arc<ChatService>>,
    Query(query): Query<SearchQuery>,
) -> Json<serde_json::Value> {
    let hits = chat
        .memory()
        .search(&query.user_id, &query.q, query.limit)
        .await;
    let count = hits.len();
    Json(serde_json::json!({ "results": hits, "count": count }))
}

async fn memory_clear_handler(
    State(chat): State<Arc<ChatService>>,
    Path(user_id): Path<String>,
    Query(query): Query<ClearQuery>,
) -> Json<serde_json::Value> {
    let removed = chat
        .memory()
        .clear(&user_id, query.session_id.as_deref())
        .await;
    Json(serde_json::json!({ "cleared": removed }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, header};
    use http_body_util::BodyExt;
    use pili_agent::{AgentRegistry, SessionBuilder, SessionCache};
    use pili_agent::session::GatewayConnector;
    use pili_config::MemorySettings;
    use pili_core::agent::AgentDefinition;
    use pili_core::completion::{
        CompletionClient, CompletionRequest, CompletionResponse,
    };
    use pili_core::error::{CompletionError, ToolError};
    use pili_core::message::Message;
    use pili_core::tool::{ToolDescriptor, ToolGateway};
    use pili_memory::ConversationMemory;
    use tower::ServiceExt;

    /// Always answers with the same text.
    struct EchoClient;

    #[async_trait]
    impl CompletionClient for EchoClient {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, CompletionError> {
            Ok(CompletionResponse {
                message: Message::assistant("Pili says hi! 💪"),
                usage: None,
                model: "mock".into(),
            })
        }
    }

    struct NoToolGateway;

    #[async_trait]
    impl ToolGateway for NoToolGateway {
        async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
            Ok(vec![])
        }

        async fn call_tool(
            &self,
            name: &str,
            _arguments: serde_json::Value,
        ) -> Result<String, ToolError> {
            Err(ToolError::NotFound(name.to_string()))
        }

        fn close(&self) {}
    }

    fn test_router() -> Router {
        let client: Arc<dyn CompletionClient> = Arc::new(EchoClient);
        let connector: Arc<dyn GatewayConnector> = Arc::new(|| {
            let handle: Arc<dyn ToolGateway> = Arc::new(NoToolGateway);
            handle
        });
        let mut registry = AgentRegistry::new();
        registry
            .insert(AgentDefinition::new("orchestrator", "You are Pili."))
            .unwrap();
        let builder = SessionBuilder::new(
            client.clone(),
            Arc::new(registry),
            connector,
            "mock",
            0.7,
            None,
            25,
        );
        let memory = Arc::new(ConversationMemory::new(MemorySettings {
            backend: "memory".into(),
            ..Default::default()
        }));
        let chat = ChatService::new(
            SessionCache::new(builder, 10),
            memory,
            client,
            "mock",
            false,
        );
        router(chat)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn json_request(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn chat_endpoint_returns_response_and_logs() {
        let app = test_router();
        let response = app
            .oneshot(json_request(
                "/api/chat",
                serde_json::json!({ "user_id": "u1", "message": "hello" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["response"], "Pili says hi! 💪");
        assert!(json["logs"].is_array());
    }

    #[tokio::test]
    async fn chat_rejects_empty_message() {
        let app = test_router();
        let response = app
            .oneshot(json_request(
                "/api/chat",
                serde_json::json!({ "user_id": "u1", "message": "  " }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let app = test_router();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "healthy");
    }

    #[tokio::test]
    async fn memory_roundtrip_through_api() {
        let app = test_router();

        // Produce one exchange
        let response = app
            .clone()
            .oneshot(json_request(
                "/api/chat",
                serde_json::json!({ "user_id": "u1", "message": "I ran 5 km" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Stats
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/memory/stats?user_id=u1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let stats = body_json(response).await;
        assert_eq!(stats["message_count"], 2);

        // History
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/memory/history?user_id=u1&limit=10")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let history = body_json(response).await;
        assert_eq!(history["messages"].as_array().unwrap().len(), 2);

        // Search
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/memory/search?user_id=u1&q=ran")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let search = body_json(response).await;
        assert_eq!(search["count"], 1);

        // Clear
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/memory/u1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let cleared = body_json(response).await;
        assert_eq!(cleared["cleared"], 1);

        // Stats now 404s
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/memory/stats?user_id=u1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn global_stats_without_user_id() {
        let app = test_router();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/memory/stats")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["total_users"], 0);
    }
}
