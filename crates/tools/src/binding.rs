//! Per-user tool binding.
//!
//! A [`BoundToolSet`] fixes the acting user for a set of gateway tools and
//! in-process tools. Gateway calls always carry the user's id (injected when
//! the model leaves it out), and tool specs are assembled per agent:
//! gateway tools filtered by the agent's allow-list, in-process tools, and
//! one synthetic `transfer_to_X` spec per handoff target.

use pili_core::agent::{AgentDefinition, handoff_tool_name};
use pili_core::completion::ToolSpec;
use pili_core::error::ToolError;
use pili_core::tool::{Tool, ToolCall, ToolDescriptor, ToolGateway};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// The tools available to one user's agent runtime.
pub struct BoundToolSet {
    user_id: String,
    gateway: Arc<dyn ToolGateway>,
    remote: Vec<ToolDescriptor>,
    local: HashMap<String, Box<dyn Tool>>,
}

impl BoundToolSet {
    /// Bind `descriptors` (from `tools/list`) and the gateway to a user.
    pub fn new(
        user_id: impl Into<String>,
        gateway: Arc<dyn ToolGateway>,
        descriptors: Vec<ToolDescriptor>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            gateway,
            remote: descriptors,
            local: HashMap::new(),
        }
    }

    /// Register an in-process tool. Replaces any existing tool of that name.
    pub fn register_local(&mut self, tool: Box<dyn Tool>) {
        self.local.insert(tool.name().to_string(), tool);
    }

    /// Whether any tool (remote or local) with this name is bound.
    pub fn contains(&self, name: &str) -> bool {
        self.local.contains_key(name) || self.remote.iter().any(|d| d.name == name)
    }

    /// Whether calling this tool should end the turn with its output.
    pub fn is_return_direct(&self, name: &str) -> bool {
        self.local
            .get(name)
            .map(|t| t.return_direct())
            .unwrap_or(false)
    }

    /// Names of all bound tools.
    pub fn names(&self) -> Vec<&str> {
        self.remote
            .iter()
            .map(|d| d.name.as_str())
            .chain(self.local.keys().map(|s| s.as_str()))
            .collect()
    }

    /// Assemble the tool specs the given agent may see: allowed gateway
    /// tools, in-process tools, and its handoff tools.
    pub fn specs_for(&self, agent: &AgentDefinition) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self
            .remote
            .iter()
            .filter(|d| agent.allows_tool(&d.name))
            .map(|d| d.to_spec())
            .collect();

        for tool in self.local.values() {
            if agent.allows_tool(tool.name()) {
                specs.push(tool.to_spec());
            }
        }

        for target in &agent.handoff_targets {
            specs.push(ToolSpec {
                name: handoff_tool_name(target),
                description: format!("Transfer the conversation to the {target} agent."),
                parameters: serde_json::json!({ "type": "object", "properties": {} }),
            });
        }

        specs
    }

    /// Execute a tool call, routing to an in-process tool or the gateway.
    ///
    /// Gateway arguments are guaranteed to carry `user_id` on exit.
    pub async fn execute(&self, call: &ToolCall) -> Result<String, ToolError> {
        if let Some(tool) = self.local.get(&call.name) {
            return tool.execute(self.with_user_id(call.arguments.clone())).await;
        }

        if !self.remote.iter().any(|d| d.name == call.name) {
            return Err(ToolError::NotFound(call.name.clone()));
        }

        let arguments = self.with_user_id(call.arguments.clone());
        debug!(tool = %call.name, user_id = %self.user_id, "Dispatching gateway tool call");
        self.gateway.call_tool(&call.name, arguments).await
    }

    /// Ensure `user_id` is present in the argument object.
    fn with_user_id(&self, arguments: serde_json::Value) -> serde_json::Value {
        let mut map = match arguments {
            serde_json::Value::Object(map) => map,
            serde_json::Value::Null => serde_json::Map::new(),
            other => {
                // Non-object arguments are wrapped rather than discarded.
                let mut map = serde_json::Map::new();
                map.insert("input".into(), other);
                map
            }
        };
        map.entry("user_id")
            .or_insert_with(|| serde_json::Value::String(self.user_id.clone()));
        serde_json::Value::Object(map)
    }
}
