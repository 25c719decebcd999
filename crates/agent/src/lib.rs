//! The Pili agent runtime — the heart of the system.
//!
//! One user turn runs as a bounded state machine:
//!
//! 1. **Receive** a user message (with prior-turn context prepended)
//! 2. **Send to LLM** with the active agent's prompt and tool specs
//! 3. **If handoff**: switch the active agent, same shared message list
//! 4. **If tool calls**: execute them, append results, loop back to step 2
//! 5. **If text response**: the turn is done
//!
//! The loop continues until the LLM responds with text only, a return-direct
//! tool fires, or the step budget forces termination. Agents share the full
//! message history — "switching agents" only changes which system prompt and
//! tool set is consulted next.

pub mod prompts;
pub mod registry;
pub mod service;
pub mod session;
pub mod stream;
pub mod turn;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use registry::AgentRegistry;
pub use service::{ChatOutcome, ChatService};
pub use session::{AgentSession, GatewayConnector, SessionBuilder, SessionCache};
pub use stream::{TurnEvent, content_deltas};
pub use turn::{TraceEntry, TraceKind, TurnExecutor, TurnOutcome, TurnState};
