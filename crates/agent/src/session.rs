//! Per-user agent sessions and their bounded LRU cache.
//!
//! Tool bindings are user-scoped (every gateway call carries the user's id),
//! so each user gets an instantiated runtime: a gateway handle, the tools it
//! advertised at build time, and a turn executor over the shared agent
//! graph. Building a session costs a `tools/list` round-trip; the cache
//! amortizes it across turns.
//!
//! Eviction is strict LRU with a fixed capacity. Evicting or clearing an
//! entry releases its gateway handle exactly once. Sessions are handed out
//! as `Arc`, so an in-flight turn keeps its instance alive past eviction —
//! the release is best-effort for turns still running on the evicted entry.

use crate::registry::AgentRegistry;
use crate::turn::TurnExecutor;
use pili_core::completion::CompletionClient;
use pili_core::tool::ToolGateway;
use pili_tools::{BoundToolSet, QuickResponseTool};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Produces a fresh gateway handle for each session.
pub trait GatewayConnector: Send + Sync {
    fn connect(&self) -> Arc<dyn ToolGateway>;
}

impl<F> GatewayConnector for F
where
    F: Fn() -> Arc<dyn ToolGateway> + Send + Sync,
{
    fn connect(&self) -> Arc<dyn ToolGateway> {
        self()
    }
}

/// One user's instantiated, tool-bound runtime.
pub struct AgentSession {
    pub user_id: String,
    pub executor: TurnExecutor,
    gateway: Arc<dyn ToolGateway>,
    released: AtomicBool,
}

impl AgentSession {
    /// Close the gateway handle. Idempotent.
    pub fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            debug!(user_id = %self.user_id, "Releasing session gateway handle");
            self.gateway.close();
        }
    }
}

/// Builds tool-bound sessions for users.
pub struct SessionBuilder {
    client: Arc<dyn CompletionClient>,
    registry: Arc<AgentRegistry>,
    connector: Arc<dyn GatewayConnector>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    max_steps: u32,
}

impl SessionBuilder {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: Arc<dyn CompletionClient>,
        registry: Arc<AgentRegistry>,
        connector: Arc<dyn GatewayConnector>,
        model: impl Into<String>,
        temperature: f32,
        max_tokens: Option<u32>,
        max_steps: u32,
    ) -> Self {
        Self {
            client,
            registry,
            connector,
            model: model.into(),
            temperature,
            max_tokens,
            max_steps,
        }
    }

    /// Build a session: fetch the tool list, bind it to the user, wire the
    /// executor. A failed tool listing degrades to a no-tool session — tool
    /// absence is a normal degraded mode, not a request failure.
    pub async fn build(&self, user_id: &str) -> AgentSession {
        let gateway = self.connector.connect();

        let descriptors = match gateway.list_tools().await {
            Ok(descriptors) => descriptors,
            Err(e) => {
                warn!(user_id, error = %e, "Tool listing failed, building no-tool session");
                Vec::new()
            }
        };

        let mut bound = BoundToolSet::new(user_id, gateway.clone(), descriptors);
        bound.register_local(Box::new(QuickResponseTool::new()));

        let executor = TurnExecutor::new(
            user_id,
            self.client.clone(),
            self.model.clone(),
            self.temperature,
            self.max_tokens,
            Arc::new(bound),
            self.registry.clone(),
            self.max_steps,
        );

        AgentSession {
            user_id: user_id.to_string(),
            executor,
            gateway,
            released: AtomicBool::new(false),
        }
    }
}

struct CacheEntry {
    session: Arc<AgentSession>,
    last_used: u64,
}

/// Bounded LRU cache of per-user sessions.
///
/// The map lock is held only for map operations — session builds and turn
/// execution happen outside it, so unrelated users never serialize on each
/// other.
pub struct SessionCache {
    builder: SessionBuilder,
    capacity: usize,
    entries: Mutex<HashMap<String, CacheEntry>>,
    clock: AtomicU64,
}

impl SessionCache {
    pub fn new(builder: SessionBuilder, capacity: usize) -> Self {
        Self {
            builder,
            capacity: capacity.max(1),
            entries: Mutex::new(HashMap::new()),
            clock: AtomicU64::new(0),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::SeqCst)
    }

    /// Resolve the user's session, building and caching it on miss.
    pub async fn get_or_create(&self, user_id: &str) -> Arc<AgentSession> {
        {
            let mut entries = self.entries.lock().await;
            if let Some(entry) = entries.get_mut(user_id) {
                entry.last_used = self.tick();
                return entry.session.clone();
            }
        }

        // Build outside the lock so one slow tools/list doesn't stall
        // other users' lookups.
        let session = Arc::new(self.builder.build(user_id).await);

        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.get_mut(user_id) {
            // Lost a build race; keep the winner, discard ours.
            session.release();
            entry.last_used = self.tick();
            return entry.session.clone();
        }

        if entries.len() >= self.capacity
            && let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone())
        {
            if let Some(evicted) = entries.remove(&oldest) {
                info!(user_id = %oldest, "Evicting least-recently-used session");
                evicted.session.release();
            }
        }

        entries.insert(
            user_id.to_string(),
            CacheEntry {
                session: session.clone(),
                last_used: self.tick(),
            },
        );
        session
    }

    /// Drop one user's session, releasing its gateway handle.
    pub async fn clear(&self, user_id: &str) -> bool {
        let mut entries = self.entries.lock().await;
        match entries.remove(user_id) {
            Some(entry) => {
                entry.session.release();
                true
            }
            None => false,
        }
    }

    /// Drop every session.
    pub async fn clear_all(&self) {
        let mut entries = self.entries.lock().await;
        for (_, entry) in entries.drain() {
            entry.session.release();
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}
