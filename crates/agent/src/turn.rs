//! The turn state machine.
//!
//! A turn is one full cycle from user message to final response, potentially
//! spanning multiple completion/tool/handoff steps. All agents operate on
//! one shared, append-only message list owned by the turn; switching agents
//! changes only which system prompt and tool specs go into the next
//! completion call.
//!
//! Termination rules, per step:
//! - a completion with no tool calls is the final response
//! - a `transfer_to_X` call switches the active agent and loops
//! - domain tool calls are executed and their results appended, then loop —
//!   unless a return-direct tool fires, which ends the turn with its output
//! - once the step budget is exhausted with tool calls still pending, the
//!   response is overridden with a fixed message and the turn is forced done
//!
//! A completion failure aborts the turn with a fixed apology (never retried
//! within the turn). A tool failure does NOT abort — it is surfaced as the
//! tool's result text so the next completion can react to it.

use crate::registry::AgentRegistry;
use crate::stream::TurnEvent;
use pili_core::agent::{AgentDefinition, handoff_target};
use pili_core::completion::{CompletionClient, CompletionRequest};
use pili_core::message::Message;
use pili_core::tool::ToolCall;
use pili_tools::BoundToolSet;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Fixed response when the step budget runs out mid-reasoning.
pub const NEED_MORE_STEPS: &str = "Sorry, need more steps to process this request.";

/// Fixed response when the completion backend fails.
pub const COMPLETION_FALLBACK: &str =
    "I'm sorry, something went wrong. Please try again! 💪";

/// The mutable state of one in-flight turn.
#[derive(Debug)]
pub struct TurnState {
    /// Shared message list, grows monotonically during the turn.
    pub messages: Vec<Message>,
    /// Which agent's prompt and tools the next completion uses.
    pub active_agent: String,
    /// Completion round-trips consumed so far.
    pub steps_taken: u32,
    /// Budget before forced termination.
    pub max_steps: u32,
}

impl TurnState {
    /// Open a turn: prior-turn context (possibly empty) is prepended
    /// verbatim to the new user message.
    pub fn open(
        context: &str,
        user_message: &str,
        initial_agent: impl Into<String>,
        max_steps: u32,
    ) -> Self {
        let content = if context.is_empty() {
            user_message.to_string()
        } else {
            format!("{context}{user_message}")
        };
        Self {
            messages: vec![Message::user(content)],
            active_agent: initial_agent.into(),
            steps_taken: 0,
            max_steps,
        }
    }
}

/// What happened during a turn, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceKind {
    AgentChanged,
    ToolCalled,
    Assistant,
    Failure,
}

impl TraceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AgentChanged => "agent_changed",
            Self::ToolCalled => "tool_called",
            Self::Assistant => "assistant",
            Self::Failure => "failure",
        }
    }
}

/// One entry in the turn's execution trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    pub kind: TraceKind,
    pub content: String,
    pub agent: String,
}

/// The result of executing one turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// The user-visible response.
    pub response: String,
    /// Ordered record of agent changes, tool calls, and messages.
    pub trace: Vec<TraceEntry>,
    /// Completion round-trips consumed.
    pub steps: u32,
    /// Domain tool invocations made.
    pub tool_calls_made: usize,
}

/// Executes turns for one user against a fixed agent graph and tool set.
pub struct TurnExecutor {
    user_id: String,
    client: Arc<dyn CompletionClient>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    tools: Arc<BoundToolSet>,
    agents: Arc<AgentRegistry>,
    max_steps: u32,
}

impl TurnExecutor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: impl Into<String>,
        client: Arc<dyn CompletionClient>,
        model: impl Into<String>,
        temperature: f32,
        max_tokens: Option<u32>,
        tools: Arc<BoundToolSet>,
        agents: Arc<AgentRegistry>,
        max_steps: u32,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            client,
            model: model.into(),
            temperature,
            max_tokens,
            tools,
            agents,
            max_steps,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn agents(&self) -> &AgentRegistry {
        &self.agents
    }

    /// Open a turn starting at the registry's default agent.
    pub fn new_turn(&self, context: &str, user_message: &str) -> TurnState {
        let initial = self.agents.default_agent().unwrap_or("orchestrator");
        TurnState::open(context, user_message, initial, self.max_steps)
    }

    /// Run a turn to completion.
    pub async fn run(&self, turn: &mut TurnState) -> TurnOutcome {
        self.execute(turn, None).await
    }

    /// Run a turn, emitting agent-change and tool-call events as they occur.
    pub async fn run_with_events(
        &self,
        turn: &mut TurnState,
        sink: &mpsc::Sender<TurnEvent>,
    ) -> TurnOutcome {
        self.execute(turn, Some(sink)).await
    }

    async fn execute(
        &self,
        turn: &mut TurnState,
        sink: Option<&mpsc::Sender<TurnEvent>>,
    ) -> TurnOutcome {
        let mut trace: Vec<TraceEntry> = Vec::new();
        let mut tool_calls_made = 0usize;

        info!(
            user_id = %self.user_id,
            agent = %turn.active_agent,
            max_steps = turn.max_steps,
            "Turn starting"
        );

        self.note_agent(&turn.active_agent, &mut trace, sink).await;

        loop {
            let Some(agent) = self.agents.get(&turn.active_agent).cloned() else {
                // Registry validation makes this unreachable in practice.
                warn!(agent = %turn.active_agent, "Active agent not registered");
                trace.push(TraceEntry {
                    kind: TraceKind::Failure,
                    content: format!("Unknown agent: {}", turn.active_agent),
                    agent: turn.active_agent.clone(),
                });
                return self.finish(turn, trace, tool_calls_made, COMPLETION_FALLBACK.into());
            };

            let response = match self.complete_for(&agent, turn).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(user_id = %self.user_id, agent = %agent.name, error = %e,
                        "Completion failed, aborting turn");
                    trace.push(TraceEntry {
                        kind: TraceKind::Failure,
                        content: e.to_string(),
                        agent: agent.name.clone(),
                    });
                    turn.messages
                        .push(Message::assistant(COMPLETION_FALLBACK).with_agent(&agent.name));
                    return self.finish(turn, trace, tool_calls_made, COMPLETION_FALLBACK.into());
                }
            };

            turn.steps_taken += 1;
            let message = response.message.with_agent(&agent.name);

            // Final response: no tool calls requested.
            if message.tool_calls.is_empty() {
                let content = message.content.clone();
                trace.push(TraceEntry {
                    kind: TraceKind::Assistant,
                    content: content.clone(),
                    agent: agent.name.clone(),
                });
                turn.messages.push(message);
                return self.finish(turn, trace, tool_calls_made, content);
            }

            // Step budget exhausted with tool calls still pending: override
            // the response instead of executing them. This is what keeps
            // handoff loops and runaway tool-calling from hanging a request.
            if turn.steps_taken >= turn.max_steps {
                warn!(user_id = %self.user_id, steps = turn.steps_taken,
                    "Step budget exhausted, forcing termination");
                trace.push(TraceEntry {
                    kind: TraceKind::Assistant,
                    content: NEED_MORE_STEPS.into(),
                    agent: agent.name.clone(),
                });
                turn.messages
                    .push(Message::assistant(NEED_MORE_STEPS).with_agent(&agent.name));
                return self.finish(turn, trace, tool_calls_made, NEED_MORE_STEPS.into());
            }

            let tool_calls = message.tool_calls.clone();
            turn.messages.push(message);

            // Handoff: the first transfer_to_X call wins. Every call id still
            // gets a tool result so the next completion sees a well-formed
            // history.
            if let Some(target) = tool_calls
                .iter()
                .find_map(|tc| handoff_target(&tc.name))
                .map(str::to_string)
            {
                let allowed = agent.handoff_targets.iter().any(|t| *t == target)
                    && self.agents.get(&target).is_some();

                for tc in &tool_calls {
                    let ack = match handoff_target(&tc.name) {
                        Some(t) if t == target && allowed => {
                            format!("Transferred to {target}")
                        }
                        Some(t) if t == target => {
                            format!("Cannot transfer to '{target}': not an allowed handoff target")
                        }
                        _ => format!("Skipped: a transfer to {target} was requested"),
                    };
                    turn.messages.push(Message::tool_result(&tc.id, ack));
                }

                if allowed {
                    debug!(from = %agent.name, to = %target, "Agent handoff");
                    turn.active_agent = target.clone();
                    self.note_agent(&target, &mut trace, sink).await;
                } else {
                    // The refusal ack above lets the model see the transfer
                    // didn't happen and pick another route.
                    warn!(from = %agent.name, to = %target, "Handoff target not allowed");
                }
                continue;
            }

            // Domain tool calls: execute each in order, append results
            // paired by call id, and keep looping in the same agent — unless
            // a return-direct tool ends the turn.
            for tc in &tool_calls {
                tool_calls_made += 1;
                trace.push(TraceEntry {
                    kind: TraceKind::ToolCalled,
                    content: tc.name.clone(),
                    agent: agent.name.clone(),
                });
                if let Some(sink) = sink {
                    let _ = sink
                        .send(TurnEvent::ToolCalled {
                            name: tc.name.clone(),
                        })
                        .await;
                }

                let call = ToolCall {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    arguments: serde_json::from_str(&tc.arguments).unwrap_or_default(),
                };

                let output = match self.tools.execute(&call).await {
                    Ok(output) => output,
                    // Surfaced as the tool's result text, recoverable
                    // within-turn — the agent's next completion reacts.
                    Err(e) => {
                        warn!(tool = %tc.name, error = %e, "Tool call failed");
                        format!("Error: {e}")
                    }
                };

                turn.messages.push(Message::tool_result(&tc.id, &output));

                if self.tools.is_return_direct(&tc.name) {
                    debug!(tool = %tc.name, "Return-direct tool ended the turn");
                    trace.push(TraceEntry {
                        kind: TraceKind::Assistant,
                        content: output.clone(),
                        agent: agent.name.clone(),
                    });
                    return self.finish(turn, trace, tool_calls_made, output);
                }
            }
        }
    }

    async fn complete_for(
        &self,
        agent: &AgentDefinition,
        turn: &TurnState,
    ) -> Result<pili_core::completion::CompletionResponse, pili_core::error::CompletionError> {
        let mut messages = vec![Message::system(agent.prompt_for(&self.user_id))];
        messages.extend(turn.messages.iter().cloned());

        let request = CompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools: self.tools.specs_for(agent),
            stop: vec![],
        };

        debug!(
            agent = %agent.name,
            step = turn.steps_taken + 1,
            messages = turn.messages.len(),
            "Completion round-trip"
        );
        self.client.complete(request).await
    }

    async fn note_agent(
        &self,
        agent: &str,
        trace: &mut Vec<TraceEntry>,
        sink: Option<&mpsc::Sender<TurnEvent>>,
    ) {
        trace.push(TraceEntry {
            kind: TraceKind::AgentChanged,
            content: agent.to_string(),
            agent: agent.to_string(),
        });
        if let Some(sink) = sink {
            let _ = sink
                .send(TurnEvent::AgentChanged {
                    agent: agent.to_string(),
                })
                .await;
        }
    }

    fn finish(
        &self,
        turn: &TurnState,
        trace: Vec<TraceEntry>,
        tool_calls_made: usize,
        response: String,
    ) -> TurnOutcome {
        info!(
            user_id = %self.user_id,
            steps = turn.steps_taken,
            tool_calls = tool_calls_made,
            "Turn completed"
        );
        TurnOutcome {
            response,
            trace,
            steps: turn.steps_taken,
            tool_calls_made,
        }
    }
}
