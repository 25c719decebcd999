//! Tool traits — the abstraction over agent capabilities.
//!
//! Most tools live on an external MCP server reached through a
//! [`ToolGateway`]; a few (like `quick_response`) run in-process and
//! implement [`Tool`] directly. Both are bound per-user into a single
//! tool set in `pili-tools`.

use crate::completion::ToolSpec;
use crate::error::ToolError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A tool advertised by the tool server (`tools/list` entry).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// The unique tool name
    pub name: String,

    /// Description of what the tool does (sent to the LLM)
    #[serde(default)]
    pub description: String,

    /// JSON Schema describing the tool's input
    #[serde(default, rename = "inputSchema")]
    pub input_schema: serde_json::Value,
}

impl ToolDescriptor {
    /// Convert this descriptor into a ToolSpec for sending to the LLM.
    pub fn to_spec(&self) -> ToolSpec {
        let parameters = if self.input_schema.is_object() {
            self.input_schema.clone()
        } else {
            serde_json::json!({ "type": "object", "properties": {} })
        };
        ToolSpec {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters,
        }
    }
}

/// A request to execute a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the LLM's tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: serde_json::Value,
}

/// Client for the external tool server.
///
/// The gateway speaks a JSON-RPC-like protocol over HTTP POST to a single
/// endpoint: `tools/list` enumerates tools, `tools/call` executes one.
/// Listing failures map to [`ToolError::Unavailable`] — callers building a
/// session degrade to a no-tool binding rather than failing the request.
/// Call timeouts map to [`ToolError::Timeout`], distinct from
/// [`ToolError::Execution`].
#[async_trait]
pub trait ToolGateway: Send + Sync {
    /// List the tools the server advertises. Side-effect-free.
    async fn list_tools(&self) -> std::result::Result<Vec<ToolDescriptor>, ToolError>;

    /// Execute a named tool. Arguments must carry the acting user's id;
    /// the binding layer injects it when absent.
    async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> std::result::Result<String, ToolError>;

    /// Release the gateway handle. Idempotent; called on session eviction.
    fn close(&self);
}

/// An in-process tool.
///
/// Implementations run locally instead of being proxied to the tool server.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool.
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Whether this tool's output ends the turn verbatim, bypassing
    /// further agent reasoning.
    fn return_direct(&self) -> bool {
        false
    }

    /// Execute the tool with the given arguments.
    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> std::result::Result<String, ToolError>;

    /// Convert this tool into a ToolSpec for sending to the LLM.
    fn to_spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_deserializes_mcp_shape() {
        let json = r#"{
            "name": "log_activity",
            "description": "Record an activity",
            "inputSchema": {
                "type": "object",
                "properties": { "user_id": { "type": "string" } }
            }
        }"#;
        let desc: ToolDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(desc.name, "log_activity");
        assert!(desc.input_schema["properties"]["user_id"].is_object());
    }

    #[test]
    fn descriptor_without_schema_gets_empty_object_spec() {
        let desc = ToolDescriptor {
            name: "ping".into(),
            description: String::new(),
            input_schema: serde_json::Value::Null,
        };
        let spec = desc.to_spec();
        assert_eq!(spec.parameters["type"], "object");
    }
}
