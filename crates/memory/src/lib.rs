//! Conversation memory for Pili.
//!
//! Each (user, session) pair owns an ordered message log, trimmed to a
//! configured cap (oldest dropped first). The service renders recent
//! history as a context string for prompt injection, supports clear /
//! search / stats, and sweeps idle conversations on a background interval.
//!
//! Persistence is best-effort: storage errors are logged and swallowed so a
//! broken disk never fails a user-visible turn.

pub mod file_store;
mod service;

pub use file_store::FileStore;
pub use service::ConversationMemory;
