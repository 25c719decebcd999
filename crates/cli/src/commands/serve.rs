//! The `serve` command — wire everything together and run the HTTP server.
//!
//! All long-lived state is constructed here, once, and passed down
//! explicitly: config, completion client, agent registry, conversation
//! memory, session cache, chat service. No global singletons.

use anyhow::Context;
use pili_agent::session::GatewayConnector;
use pili_agent::{ChatService, SessionBuilder, SessionCache, registry};
use pili_config::AppConfig;
use pili_core::tool::ToolGateway;
use pili_memory::ConversationMemory;
use pili_tools::HttpToolGateway;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub async fn run(port_override: Option<u16>) -> anyhow::Result<()> {
    let mut config = AppConfig::load().context("Failed to load configuration")?;
    if let Some(port) = port_override {
        config.server.port = port;
    }

    let client = pili_providers::from_config(&config.llm);

    let agents = Arc::new(registry::fitness_registry());
    agents
        .validate()
        .context("Built-in agent graph failed validation")?;

    let mcp_url = config.mcp.base_url.clone();
    let mcp_timeout = Duration::from_secs(config.mcp.request_timeout_secs);
    let connector: Arc<dyn GatewayConnector> = Arc::new(move || {
        let handle: Arc<dyn ToolGateway> =
            Arc::new(HttpToolGateway::new(mcp_url.clone(), mcp_timeout));
        handle
    });

    let builder = SessionBuilder::new(
        client.clone(),
        agents,
        connector,
        config.llm.model.clone(),
        config.llm.temperature,
        Some(config.llm.max_tokens),
        config.runtime.max_steps,
    );
    let sessions = SessionCache::new(builder, config.runtime.session_capacity);

    let memory = Arc::new(ConversationMemory::new(config.memory.clone()));
    let _cleanup = memory.clone().spawn_cleanup();

    let chat = ChatService::new(
        sessions,
        memory,
        client,
        config.llm.model.clone(),
        config.runtime.finalize_responses,
    );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!(addr = %addr, model = %config.llm.model, "Starting Pili server");
    pili_gateway::serve(chat, &addr)
        .await
        .with_context(|| format!("Server error on {addr}"))?;

    Ok(())
}
