//! Shared test helpers: scripted completion clients and a mock gateway.

use async_trait::async_trait;
use pili_core::completion::{
    CompletionClient, CompletionRequest, CompletionResponse, Usage,
};
use pili_core::error::{CompletionError, ToolError};
use pili_core::message::{Message, MessageToolCall};
use pili_core::tool::{ToolDescriptor, ToolGateway};
use pili_tools::{BoundToolSet, QuickResponseTool};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// A completion client that replays a fixed script of responses, one per
/// `complete` call. Panics when the script runs out.
pub struct ScriptedClient {
    responses: Mutex<Vec<CompletionResponse>>,
    call_count: Mutex<usize>,
    failure: Option<CompletionError>,
}

impl ScriptedClient {
    pub fn new(responses: Vec<CompletionResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            call_count: Mutex::new(0),
            failure: None,
        }
    }

    /// A client whose every call fails with the given error.
    pub fn failing(error: CompletionError) -> Self {
        Self {
            responses: Mutex::new(vec![]),
            call_count: Mutex::new(0),
            failure: Some(error),
        }
    }

    #[allow(dead_code)]
    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        _request: CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError> {
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }

        let mut count = self.call_count.lock().unwrap();
        let responses = self.responses.lock().unwrap();
        if *count >= responses.len() {
            panic!(
                "ScriptedClient: no more responses (call #{}, have {})",
                *count,
                responses.len()
            );
        }
        let response = responses[*count].clone();
        *count += 1;
        Ok(response)
    }
}

/// Create a plain text response (no tool calls).
pub fn text_response(text: &str) -> CompletionResponse {
    CompletionResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

/// Create a response carrying tool calls and optional text content.
pub fn tool_call_response(
    tool_calls: Vec<MessageToolCall>,
    content: &str,
) -> CompletionResponse {
    let mut message = Message::assistant(content);
    message.tool_calls = tool_calls;
    CompletionResponse {
        message,
        usage: None,
        model: "mock-model".into(),
    }
}

/// A domain tool call with JSON arguments.
pub fn domain_call(name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: format!("call_{name}"),
        name: name.to_string(),
        arguments: serde_json::to_string(&args).unwrap(),
    }
}

/// A synthetic handoff call to `target`.
pub fn handoff_call(target: &str) -> MessageToolCall {
    MessageToolCall {
        id: format!("call_transfer_{target}"),
        name: pili_core::agent::handoff_tool_name(target),
        arguments: "{}".into(),
    }
}

/// A gateway serving fixed descriptors; tracks calls and close count.
pub struct MockGateway {
    descriptors: Vec<ToolDescriptor>,
    list_fails: bool,
    fail_next_call: AtomicBool,
    pub close_count: AtomicUsize,
}

impl MockGateway {
    pub fn with_tools(names: &[&str]) -> Arc<Self> {
        let descriptors = names
            .iter()
            .map(|name| ToolDescriptor {
                name: name.to_string(),
                description: format!("Mock tool {name}"),
                input_schema: serde_json::json!({ "type": "object", "properties": {} }),
            })
            .collect();
        Arc::new(Self {
            descriptors,
            list_fails: false,
            fail_next_call: AtomicBool::new(false),
            close_count: AtomicUsize::new(0),
        })
    }

    /// A gateway whose `tools/list` always fails.
    pub fn unavailable() -> Arc<Self> {
        Arc::new(Self {
            descriptors: vec![],
            list_fails: true,
            fail_next_call: AtomicBool::new(false),
            close_count: AtomicUsize::new(0),
        })
    }

    pub fn fail_next_call_with_timeout(&self) {
        self.fail_next_call.store(true, Ordering::SeqCst);
    }

    pub fn closes(&self) -> usize {
        self.close_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolGateway for MockGateway {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
        if self.list_fails {
            return Err(ToolError::Unavailable("mock outage".into()));
        }
        Ok(self.descriptors.clone())
    }

    async fn call_tool(
        &self,
        name: &str,
        _arguments: serde_json::Value,
    ) -> Result<String, ToolError> {
        if self.fail_next_call.swap(false, Ordering::SeqCst) {
            return Err(ToolError::Timeout {
                tool_name: name.to_string(),
                timeout_secs: 30,
            });
        }
        Ok(format!("ok:{name}"))
    }

    fn close(&self) {
        self.close_count.fetch_add(1, Ordering::SeqCst);
    }
}

/// A bound tool set over a [`MockGateway`] with `quick_response` registered.
pub fn bound_tools(user_id: &str, gateway_tools: Vec<&str>) -> (BoundToolSet, Arc<MockGateway>) {
    let gateway = MockGateway::with_tools(&gateway_tools);
    let descriptors = gateway
        .descriptors
        .clone();
    let mut bound = BoundToolSet::new(user_id, gateway.clone(), descriptors);
    bound.register_local(Box::new(QuickResponseTool::new()));
    (bound, gateway)
}
