//! The conversation memory service.

use crate::file_store::FileStore;
use chrono::{Duration as ChronoDuration, Utc};
use pili_config::MemorySettings;
use pili_core::memory::{ConversationRecord, MemoryUsage, SearchHit, SessionStats};
use pili_core::message::Message;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

type SessionKey = (String, String);

/// Per-(user, session) conversation memory with bounded logs.
///
/// The lock is held only for map operations, never across I/O awaits on the
/// turn path, so concurrent turns for different users proceed independently.
pub struct ConversationMemory {
    settings: MemorySettings,
    conversations: RwLock<HashMap<SessionKey, ConversationRecord>>,
    store: Option<FileStore>,
}

impl ConversationMemory {
    /// Create the service, loading existing conversations when file-backed.
    pub fn new(settings: MemorySettings) -> Self {
        let store = match settings.backend.as_str() {
            "file" => Some(FileStore::new(settings.data_dir.clone())),
            _ => None,
        };

        let mut conversations = HashMap::new();
        if let Some(store) = &store {
            for record in store.load_all() {
                conversations.insert(
                    (record.user_id.clone(), record.session_id.clone()),
                    record,
                );
            }
        }

        Self {
            settings,
            conversations: RwLock::new(conversations),
            store,
        }
    }

    /// Atomically append a user message then an assistant message.
    ///
    /// Each text is truncated to the configured char cap before storing, and
    /// the log is trimmed to the message cap (oldest dropped first).
    pub async fn append_exchange(
        &self,
        user_id: &str,
        session_id: &str,
        user_text: &str,
        ai_text: &str,
    ) {
        let user_msg = Message::user(self.truncate(user_text));
        let ai_msg = Message::assistant(self.truncate(ai_text));

        let mut conversations = self.conversations.write().await;
        let record = conversations
            .entry((user_id.to_string(), session_id.to_string()))
            .or_insert_with(|| ConversationRecord::new(user_id, session_id));

        record.push(user_msg);
        record.push(ai_msg);
        record.trim_to(self.settings.max_messages_per_session);

        self.persist(record);
    }

    /// Render recent history for prompt injection, or an empty string when
    /// there is none. The result is prepended verbatim to the next turn's
    /// user message.
    pub async fn get_context(&self, user_id: &str, session_id: &str) -> String {
        let conversations = self.conversations.read().await;
        let Some(record) = conversations.get(&key(user_id, session_id)) else {
            return String::new();
        };
        if record.messages.is_empty() {
            return String::new();
        }

        let recent = record
            .messages
            .iter()
            .rev()
            .take(self.settings.context_messages)
            .collect::<Vec<_>>();

        let mut lines = Vec::with_capacity(recent.len());
        for message in recent.into_iter().rev() {
            lines.push(format!("{}: {}", message.role, message.content));
        }

        format!("## Previous Conversation:\n{}\n\n", lines.join("\n"))
    }

    /// The most recent `limit` messages for a session.
    pub async fn history(
        &self,
        user_id: &str,
        session_id: &str,
        limit: usize,
    ) -> Vec<Message> {
        let conversations = self.conversations.read().await;
        match conversations.get(&key(user_id, session_id)) {
            Some(record) => {
                let start = record.messages.len().saturating_sub(limit);
                record.messages[start..].to_vec()
            }
            None => Vec::new(),
        }
    }

    /// Drop one session, or every session for the user when `session_id` is
    /// `None`. Backing files are removed.
    pub async fn clear(&self, user_id: &str, session_id: Option<&str>) -> usize {
        let mut conversations = self.conversations.write().await;
        let removed: Vec<SessionKey> = match session_id {
            Some(session) => conversations
                .remove(&key(user_id, session))
                .map(|_| vec![key(user_id, session)])
                .unwrap_or_default(),
            None => {
                let keys: Vec<SessionKey> = conversations
                    .keys()
                    .filter(|(u, _)| u == user_id)
                    .cloned()
                    .collect();
                for k in &keys {
                    conversations.remove(k);
                }
                keys
            }
        };
        drop(conversations);

        if let Some(store) = &self.store {
            for (user, session) in &removed {
                store.remove(user, session);
            }
        }
        if !removed.is_empty() {
            info!(user_id, count = removed.len(), "Cleared conversations");
        }
        removed.len()
    }

    /// Per-session statistics, if the session exists.
    pub async fn session_stats(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Option<SessionStats> {
        let conversations = self.conversations.read().await;
        conversations
            .get(&key(user_id, session_id))
            .map(|record| SessionStats {
                user_id: record.user_id.clone(),
                session_id: record.session_id.clone(),
                message_count: record.messages.len(),
                created_at: record.created_at,
                last_accessed: record.updated_at,
            })
    }

    /// Global aggregate across all users and sessions.
    pub async fn usage(&self) -> MemoryUsage {
        let conversations = self.conversations.read().await;
        let mut users = std::collections::HashSet::new();
        let mut total_messages = 0;
        for ((user, _), record) in conversations.iter() {
            users.insert(user.clone());
            total_messages += record.messages.len();
        }
        MemoryUsage {
            total_users: users.len(),
            total_conversations: conversations.len(),
            total_messages,
        }
    }

    /// Term-match search over a user's stored messages.
    ///
    /// Not a full-text index: relevance is the fraction of query terms found
    /// in the message content. Acceptable because per-user volume is small
    /// and bounded by the trim policy.
    pub async fn search(
        &self,
        user_id: &str,
        query: &str,
        max_results: usize,
    ) -> Vec<SearchHit> {
        let terms: Vec<String> = query
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();
        if terms.is_empty() {
            return Vec::new();
        }

        let conversations = self.conversations.read().await;
        let mut hits = Vec::new();
        for ((user, session), record) in conversations.iter() {
            if user != user_id {
                continue;
            }
            for message in &record.messages {
                let content = message.content.to_lowercase();
                let matched = terms.iter().filter(|t| content.contains(t.as_str())).count();
                if matched > 0 {
                    hits.push(SearchHit {
                        session_id: session.clone(),
                        message: message.clone(),
                        score: matched as f32 / terms.len() as f32,
                    });
                }
            }
        }

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(max_results);
        hits
    }

    /// Remove conversations idle past the configured max age.
    pub async fn sweep_expired(&self) -> usize {
        let cutoff = Utc::now() - ChronoDuration::days(self.settings.max_age_days);

        let mut conversations = self.conversations.write().await;
        let expired: Vec<SessionKey> = conversations
            .iter()
            .filter(|(_, record)| record.updated_at < cutoff)
            .map(|(k, _)| k.clone())
            .collect();
        for k in &expired {
            conversations.remove(k);
        }
        drop(conversations);

        if let Some(store) = &self.store {
            for (user, session) in &expired {
                store.remove(user, session);
            }
        }

        if !expired.is_empty() {
            info!(count = expired.len(), "Swept expired conversations");
        }
        expired.len()
    }

    /// Run the expiry sweep on the configured interval until aborted.
    pub fn spawn_cleanup(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let memory = self;
        let interval =
            std::time::Duration::from_secs(memory.settings.cleanup_interval_hours * 3600);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // First tick fires immediately; skip it.
            loop {
                ticker.tick().await;
                memory.sweep_expired().await;
            }
        })
    }

    fn truncate(&self, text: &str) -> String {
        let cap = self.settings.max_chars_per_message;
        if text.chars().count() <= cap {
            return text.to_string();
        }
        let truncated: String = text.chars().take(cap).collect();
        debug!(cap, "Truncating message content");
        format!("{truncated}... [truncated]")
    }

    fn persist(&self, record: &ConversationRecord) {
        if let Some(store) = &self.store
            && let Err(e) = store.save(record)
        {
            // Conversation continuity is best-effort, not guaranteed-durable.
            warn!(user_id = %record.user_id, session_id = %record.session_id, error = %e,
                "Failed to persist conversation");
        }
    }
}

fn key(user_id: &str, session_id: &str) -> SessionKey {
    (user_id.to_string(), session_id.to_string())
}
