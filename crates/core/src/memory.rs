//! Conversation record types owned by the memory service.
//!
//! A `ConversationRecord` is the per-(user, session) ordered message log.
//! It is mutated only through the memory service's append-exchange path and
//! trimmed to a configured cap (oldest dropped first).

use crate::message::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The ordered message log for one (user, session) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub user_id: String,
    pub session_id: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationRecord {
    pub fn new(user_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            session_id: session_id.into(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Add a message and bump the update timestamp.
    pub fn push(&mut self, message: Message) {
        self.updated_at = Utc::now();
        self.messages.push(message);
    }

    /// Drop the oldest messages beyond `cap`.
    pub fn trim_to(&mut self, cap: usize) {
        if self.messages.len() > cap {
            let excess = self.messages.len() - cap;
            self.messages.drain(..excess);
        }
    }
}

/// Per-session statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub user_id: String,
    pub session_id: String,
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
}

/// Global aggregate statistics across all conversations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryUsage {
    pub total_users: usize,
    pub total_conversations: usize,
    pub total_messages: usize,
}

/// A single conversation-search match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub session_id: String,
    pub message: Message,
    /// Fraction of query terms found in the message content.
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_tracks_updates() {
        let mut record = ConversationRecord::new("u1", "default");
        let created = record.created_at;

        record.push(Message::user("First message"));
        assert_eq!(record.messages.len(), 1);
        assert!(record.updated_at >= created);
    }

    #[test]
    fn trim_drops_oldest_first() {
        let mut record = ConversationRecord::new("u1", "default");
        for i in 0..6 {
            record.push(Message::user(format!("msg {i}")));
        }
        record.trim_to(4);
        assert_eq!(record.messages.len(), 4);
        assert_eq!(record.messages[0].content, "msg 2");
        assert_eq!(record.messages[3].content, "msg 5");
    }

    #[test]
    fn trim_noop_under_cap() {
        let mut record = ConversationRecord::new("u1", "default");
        record.push(Message::user("only"));
        record.trim_to(10);
        assert_eq!(record.messages.len(), 1);
    }
}
