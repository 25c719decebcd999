//! HTTP client for the external MCP tool server.
//!
//! The server exposes a single endpoint speaking a JSON-RPC-like protocol:
//!
//! - `{"method": "tools/list", "params": {}}` →
//!   `{"result": {"tools": [{name, description, inputSchema}]}}`
//! - `{"method": "tools/call", "params": {name, arguments}}` →
//!   `{"result": {"content": ...}}` or `{"error": {"message": ...}}`
//!
//! Timeouts on `tools/call` map to [`ToolError::Timeout`]; protocol errors
//! map to [`ToolError::Execution`]; failures to reach the server at all map
//! to [`ToolError::Unavailable`].

use async_trait::async_trait;
use pili_core::error::ToolError;
use pili_core::tool::{ToolDescriptor, ToolGateway};
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// A reqwest-backed tool gateway.
pub struct HttpToolGateway {
    base_url: String,
    timeout_secs: u64,
    client: reqwest::Client,
    closed: AtomicBool,
}

impl HttpToolGateway {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            base_url: base_url.into(),
            timeout_secs: timeout.as_secs(),
            client,
            closed: AtomicBool::new(false),
        }
    }

    async fn post(&self, method: &str, params: serde_json::Value) -> Result<RpcResponse, ToolError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ToolError::Unavailable("gateway handle closed".into()));
        }

        let body = serde_json::json!({ "method": method, "params": params });

        let response = self
            .client
            .post(&self.base_url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ToolError::Timeout {
                        tool_name: method.to_string(),
                        timeout_secs: self.timeout_secs,
                    }
                } else {
                    ToolError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(ToolError::Unavailable(format!(
                "tool server returned status {status}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ToolError::Unavailable(format!("invalid tool server response: {e}")))
    }
}

#[async_trait]
impl ToolGateway for HttpToolGateway {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
        let response = self.post("tools/list", serde_json::json!({})).await?;
        let tools = response
            .result
            .and_then(|r| r.tools)
            .unwrap_or_default();
        debug!(count = tools.len(), url = %self.base_url, "Fetched tool list");
        Ok(tools)
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<String, ToolError> {
        let params = serde_json::json!({ "name": name, "arguments": arguments });
        let response = match self.post("tools/call", params).await {
            Ok(r) => r,
            Err(ToolError::Timeout { timeout_secs, .. }) => {
                return Err(ToolError::Timeout {
                    tool_name: name.to_string(),
                    timeout_secs,
                });
            }
            Err(e) => return Err(e),
        };

        if let Some(error) = response.error {
            warn!(tool = %name, error = %error.message, "Tool call failed");
            return Err(ToolError::Execution {
                tool_name: name.to_string(),
                reason: error.message,
            });
        }

        let content = response
            .result
            .and_then(|r| r.content)
            .unwrap_or(serde_json::Value::Null);

        // String results pass through verbatim; structured results are
        // JSON-encoded so the LLM sees them as text.
        Ok(match content {
            serde_json::Value::String(s) => s,
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        })
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<RpcResult>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcResult {
    #[serde(default)]
    tools: Option<Vec<ToolDescriptor>>,
    #[serde(default)]
    content: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct RpcError {
    #[serde(default)]
    message: String,
}
