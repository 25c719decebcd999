//! Agent definitions and handoff tool naming.
//!
//! Agents are tagged data, not subclasses: a definition binds a name to a
//! system prompt and a capability set. The turn state machine is one
//! generic loop parameterized by the active definition. All mutable state
//! lives in the turn's shared message list — an agent is stateless besides
//! its definition.

use serde::{Deserialize, Serialize};

/// Prefix for the synthetic tools that transfer control between agents.
pub const HANDOFF_PREFIX: &str = "transfer_to_";

/// The definition of one specialized agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefinition {
    /// Unique agent name (e.g., "orchestrator", "logger", "coach")
    pub name: String,

    /// System prompt. May contain a `{user_id}` placeholder resolved when
    /// the per-user session is built.
    pub system_prompt: String,

    /// Gateway tools this agent may invoke. `None` means every bound tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_names: Option<Vec<String>>,

    /// Peer agents this agent may transfer control to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub handoff_targets: Vec<String>,
}

impl AgentDefinition {
    pub fn new(name: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            system_prompt: system_prompt.into(),
            tool_names: None,
            handoff_targets: Vec::new(),
        }
    }

    /// Restrict this agent to the named gateway tools.
    pub fn with_tools(mut self, tools: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tool_names = Some(tools.into_iter().map(Into::into).collect());
        self
    }

    /// Allow this agent to hand control to the named peers.
    pub fn with_handoffs(mut self, targets: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.handoff_targets = targets.into_iter().map(Into::into).collect();
        self
    }

    /// Whether this agent may invoke the named gateway tool.
    pub fn allows_tool(&self, name: &str) -> bool {
        match &self.tool_names {
            None => true,
            Some(names) => names.iter().any(|n| n == name),
        }
    }

    /// Resolve the `{user_id}` placeholder in the system prompt.
    pub fn prompt_for(&self, user_id: &str) -> String {
        self.system_prompt.replace("{user_id}", user_id)
    }
}

/// The synthetic tool name that transfers control to `target`.
pub fn handoff_tool_name(target: &str) -> String {
    format!("{HANDOFF_PREFIX}{target}")
}

/// If `tool_name` is a handoff tool, return the target agent name.
pub fn handoff_target(tool_name: &str) -> Option<&str> {
    tool_name.strip_prefix(HANDOFF_PREFIX)
}
