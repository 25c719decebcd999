//! The chat service — the explicit context object behind the API surface.
//!
//! One instance is constructed at process start and threaded through: it
//! owns the session cache and conversation memory, and runs the full
//! pipeline for a turn — resolve session, prepend prior-turn context, run
//! the state machine, append the exchange to memory exactly once.
//!
//! The streaming variant drives the same pipeline in a spawned task,
//! emitting [`TurnEvent`]s over a bounded channel. The memory append uses
//! the fully reconstructed content and happens before the `completed` event
//! is delivered — never partially.

use crate::session::SessionCache;
use crate::stream::{TurnEvent, content_deltas};
use crate::turn::TraceEntry;
use pili_core::completion::{CompletionClient, CompletionRequest};
use pili_core::message::Message;
use pili_memory::ConversationMemory;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Session id used when the caller doesn't supply one.
pub const DEFAULT_SESSION: &str = "default";

/// Prompt for the optional finalization pass.
const FINALIZE_PROMPT: &str = "\
You are Pili, an enthusiastic and friendly fitness chatbot. Rewrite the draft \
reply below into a warm, natural response in your own voice. Keep it concise, \
keep every fact from the draft, and use fitness emojis sparingly. Reply with \
the rewritten text only.";

/// A completed chat turn.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub response: String,
    pub trace: Vec<TraceEntry>,
}

/// Runs chat turns end to end.
pub struct ChatService {
    sessions: SessionCache,
    memory: Arc<ConversationMemory>,
    client: Arc<dyn CompletionClient>,
    model: String,
    finalize_responses: bool,
}

impl ChatService {
    pub fn new(
        sessions: SessionCache,
        memory: Arc<ConversationMemory>,
        client: Arc<dyn CompletionClient>,
        model: impl Into<String>,
        finalize_responses: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            sessions,
            memory,
            client,
            model: model.into(),
            finalize_responses,
        })
    }

    pub fn memory(&self) -> &Arc<ConversationMemory> {
        &self.memory
    }

    pub fn sessions(&self) -> &SessionCache {
        &self.sessions
    }

    /// Process one turn and return the final response with its trace.
    pub async fn chat(&self, user_id: &str, session_id: &str, message: &str) -> ChatOutcome {
        let session = self.sessions.get_or_create(user_id).await;
        let context = self.memory.get_context(user_id, session_id).await;

        let mut turn = session.executor.new_turn(&context, message);
        let outcome = session.executor.run(&mut turn).await;

        let response = self.maybe_finalize(message, outcome.response).await;
        self.memory
            .append_exchange(user_id, session_id, message, &response)
            .await;

        ChatOutcome {
            response,
            trace: outcome.trace,
        }
    }

    /// Process one turn, streaming events as they happen.
    ///
    /// The returned receiver yields `started`, agent/tool notifications,
    /// content deltas that concatenate to exactly the non-streaming
    /// response, and a terminal `completed`.
    pub async fn chat_stream(
        self: Arc<Self>,
        user_id: &str,
        session_id: &str,
        message: &str,
    ) -> mpsc::Receiver<TurnEvent> {
        let (tx, rx) = mpsc::channel::<TurnEvent>(64);

        let service = self;
        let user_id = user_id.to_string();
        let session_id = session_id.to_string();
        let message = message.to_string();

        tokio::spawn(async move {
            let _ = tx.send(TurnEvent::Started).await;

            let session = service.sessions.get_or_create(&user_id).await;
            let context = service.memory.get_context(&user_id, &session_id).await;

            let mut turn = session.executor.new_turn(&context, &message);
            let outcome = session.executor.run_with_events(&mut turn, &tx).await;

            let response = service.maybe_finalize(&message, outcome.response).await;

            // Append exactly once, with the full reconstructed content,
            // before the consumer sees the terminal event.
            service
                .memory
                .append_exchange(&user_id, &session_id, &message, &response)
                .await;

            for delta in content_deltas(&response) {
                let _ = tx.send(TurnEvent::ContentDelta { content: delta }).await;
            }
            let _ = tx
                .send(TurnEvent::Completed {
                    steps: outcome.steps,
                    tool_calls_made: outcome.tool_calls_made,
                })
                .await;
        });

        rx
    }

    /// Optional second pass: rewrite the raw turn response in Pili's voice.
    /// Falls back to the raw response on any failure.
    async fn maybe_finalize(&self, user_message: &str, response: String) -> String {
        if !self.finalize_responses || response.is_empty() {
            return response;
        }

        let request = CompletionRequest {
            model: self.model.clone(),
            messages: vec![
                Message::system(FINALIZE_PROMPT),
                Message::user(format!(
                    "User message: \"{user_message}\"\n\nDraft reply:\n{response}"
                )),
            ],
            temperature: 0.7,
            max_tokens: None,
            tools: vec![],
            stop: vec![],
        };

        match self.client.complete(request).await {
            Ok(completion) if !completion.message.content.is_empty() => {
                debug!("Finalization pass rewrote response");
                completion.message.content
            }
            Ok(_) => response,
            Err(e) => {
                warn!(error = %e, "Finalization pass failed, keeping raw response");
                response
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::fitness_registry;
    use crate::session::{GatewayConnector, SessionBuilder};
    use crate::test_helpers::*;
    use pili_config::MemorySettings;
    use pili_core::tool::ToolGateway;

    fn service_with(client: ScriptedClient, finalize: bool) -> Arc<ChatService> {
        let client: Arc<dyn CompletionClient> = Arc::new(client);
        let connector: Arc<dyn GatewayConnector> = Arc::new(|| {
            let handle: Arc<dyn ToolGateway> = MockGateway::with_tools(&["log_activity"]);
            handle
        });
        let builder = SessionBuilder::new(
            client.clone(),
            Arc::new(fitness_registry()),
            connector,
            "mock-model",
            0.7,
            None,
            25,
        );
        let memory = Arc::new(ConversationMemory::new(MemorySettings {
            backend: "memory".into(),
            ..Default::default()
        }));
        ChatService::new(
            SessionCache::new(builder, 100),
            memory,
            client,
            "mock-model",
            finalize,
        )
    }

    #[tokio::test]
    async fn chat_appends_exactly_one_exchange_per_turn() {
        let client = ScriptedClient::new(vec![
            text_response("reply one"),
            text_response("reply two"),
            text_response("reply three"),
        ]);
        let service = service_with(client, false);

        for i in 0..3 {
            service.chat("u1", DEFAULT_SESSION, &format!("msg {i}")).await;
        }

        let history = service.memory().history("u1", DEFAULT_SESSION, 100).await;
        assert_eq!(history.len(), 6);
        assert_eq!(history[1].content, "reply one");
        assert_eq!(history[5].content, "reply three");
    }

    #[tokio::test]
    async fn second_turn_sees_first_turn_context() {
        let client = ScriptedClient::new(vec![
            text_response("Nice run!"),
            text_response("You ran 5 km earlier."),
        ]);
        let service = service_with(client, false);

        service.chat("u1", DEFAULT_SESSION, "I ran 5 km").await;
        let outcome = service.chat("u1", DEFAULT_SESSION, "what did I do?").await;

        assert_eq!(outcome.response, "You ran 5 km earlier.");
        // Context was rendered from memory for the second turn
        let context = service.memory().get_context("u1", DEFAULT_SESSION).await;
        assert!(context.contains("I ran 5 km"));
        assert!(context.contains("Nice run!"));
    }

    #[tokio::test]
    async fn stream_deltas_reconstruct_nonstream_response() {
        let long_reply = "Keep it up! ".repeat(30);
        let client = ScriptedClient::new(vec![text_response(&long_reply)]);
        let service = service_with(client, false);

        let mut rx = service
            .clone()
            .chat_stream("u1", DEFAULT_SESSION, "hello")
            .await;
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }

        assert!(matches!(events.first(), Some(TurnEvent::Started)));
        assert!(matches!(events.last(), Some(TurnEvent::Completed { .. })));

        let reconstructed: String = events
            .iter()
            .filter_map(|e| match e {
                TurnEvent::ContentDelta { content } => Some(content.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(reconstructed, long_reply);

        // Memory was appended exactly once, with the full content
        let history = service.memory().history("u1", DEFAULT_SESSION, 10).await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].content, long_reply);
    }

    #[tokio::test]
    async fn stream_event_order_for_handoff_scenario() {
        let client = ScriptedClient::new(vec![
            tool_call_response(vec![handoff_call("logger")], ""),
            tool_call_response(
                vec![domain_call("log_activity", serde_json::json!({"activity": "run"}))],
                "",
            ),
            tool_call_response(vec![handoff_call("orchestrator")], ""),
            text_response("Logged! 🎉"),
        ]);
        let service = service_with(client, false);

        let mut rx = service
            .clone()
            .chat_stream("u1", DEFAULT_SESSION, "I ran 5 km")
            .await;
        let mut names = Vec::new();
        while let Some(event) = rx.recv().await {
            names.push(match &event {
                TurnEvent::Started => "started".to_string(),
                TurnEvent::AgentChanged { agent } => format!("agent:{agent}"),
                TurnEvent::ToolCalled { name } => format!("tool:{name}"),
                TurnEvent::ContentDelta { .. } => "delta".to_string(),
                TurnEvent::Completed { .. } => "completed".to_string(),
                TurnEvent::Error { .. } => "error".to_string(),
            });
        }

        assert_eq!(
            names,
            vec![
                "started",
                "agent:orchestrator",
                "agent:logger",
                "tool:log_activity",
                "agent:orchestrator",
                "delta",
                "completed",
            ]
        );
    }

    #[tokio::test]
    async fn finalization_rewrites_response() {
        let client = ScriptedClient::new(vec![
            text_response("raw draft"),
            text_response("Warm rewritten reply! 💪"),
        ]);
        let service = service_with(client, true);

        let outcome = service.chat("u1", DEFAULT_SESSION, "hello").await;
        assert_eq!(outcome.response, "Warm rewritten reply! 💪");

        // Memory stores the finalized text, not the draft
        let history = service.memory().history("u1", DEFAULT_SESSION, 10).await;
        assert_eq!(history[1].content, "Warm rewritten reply! 💪");
    }

    #[tokio::test]
    async fn different_sessions_are_isolated() {
        let client = ScriptedClient::new(vec![
            text_response("for s1"),
            text_response("for s2"),
        ]);
        let service = service_with(client, false);

        service.chat("u1", "s1", "first").await;
        service.chat("u1", "s2", "second").await;

        assert_eq!(service.memory().history("u1", "s1", 10).await.len(), 2);
        assert_eq!(service.memory().history("u1", "s2", 10).await.len(), 2);
        let context = service.memory().get_context("u1", "s1").await;
        assert!(!context.contains("second"));
    }
}
