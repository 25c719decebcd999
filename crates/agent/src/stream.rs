//! Typed stream events for turn execution.
//!
//! A streaming turn emits a strictly ordered sequence: `started`, then
//! agent-change and tool-call notifications as they occur, then one or more
//! content deltas whose concatenation equals exactly the non-streaming
//! response, then `completed`. The gateway forwards these to clients as SSE
//! frames.

use serde::{Deserialize, Serialize};

/// Events emitted while a turn executes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    /// The turn has begun.
    Started,

    /// Control moved to (or started in) the named agent.
    AgentChanged { agent: String },

    /// The active agent invoked a tool.
    ToolCalled { name: String },

    /// A piece of the final response text.
    ContentDelta { content: String },

    /// The turn finished; memory has been updated.
    Completed { steps: u32, tool_calls_made: usize },

    /// The turn could not run at all.
    Error { message: String },
}

impl TurnEvent {
    /// SSE event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::AgentChanged { .. } => "agent_changed",
            Self::ToolCalled { .. } => "tool_called",
            Self::ContentDelta { .. } => "content_delta",
            Self::Completed { .. } => "completed",
            Self::Error { .. } => "error",
        }
    }
}

/// How many characters of response text go into each delta.
const DELTA_CHUNK_CHARS: usize = 64;

/// Split a response into delta payloads on char boundaries.
///
/// Concatenating the result reconstructs the input exactly. An empty
/// response yields no deltas.
pub fn content_deltas(response: &str) -> Vec<String> {
    let chars: Vec<char> = response.chars().collect();
    chars
        .chunks(DELTA_CHUNK_CHARS)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serialization_tagged() {
        let event = TurnEvent::AgentChanged {
            agent: "logger".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"agent_changed""#));
        assert!(json.contains(r#""agent":"logger""#));
    }

    #[test]
    fn event_type_names() {
        assert_eq!(TurnEvent::Started.event_type(), "started");
        assert_eq!(
            TurnEvent::ContentDelta {
                content: "x".into()
            }
            .event_type(),
            "content_delta"
        );
        assert_eq!(
            TurnEvent::Completed {
                steps: 1,
                tool_calls_made: 0
            }
            .event_type(),
            "completed"
        );
    }

    #[test]
    fn deltas_concatenate_to_original() {
        let response = "a".repeat(200);
        let deltas = content_deltas(&response);
        assert!(deltas.len() > 1);
        assert_eq!(deltas.concat(), response);
    }

    #[test]
    fn deltas_respect_char_boundaries() {
        let response = "💪".repeat(100);
        let deltas = content_deltas(&response);
        assert_eq!(deltas.concat(), response);
        for delta in &deltas {
            assert!(delta.chars().count() <= 64);
        }
    }

    #[test]
    fn empty_response_yields_no_deltas() {
        assert!(content_deltas("").is_empty());
    }

    #[test]
    fn event_deserialization() {
        let json = r#"{"type":"tool_called","name":"log_activity"}"#;
        let event: TurnEvent = serde_json::from_str(json).unwrap();
        match event {
            TurnEvent::ToolCalled { name } => assert_eq!(name, "log_activity"),
            _ => panic!("Wrong variant"),
        }
    }
}
