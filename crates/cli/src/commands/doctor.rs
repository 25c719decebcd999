//! The `doctor` command — check that the external collaborators are
//! reachable: the MCP tool server and the LLM completion backend.

use pili_config::AppConfig;
use pili_core::completion::CompletionClient;
use pili_core::tool::ToolGateway;
use pili_tools::HttpToolGateway;
use std::time::Duration;

pub async fn run() -> anyhow::Result<()> {
    let config = AppConfig::load()?;

    println!("Pili doctor\n");
    println!("Config:");
    println!("  llm.provider   = {}", config.llm.provider);
    println!("  llm.model      = {}", config.llm.model);
    println!("  mcp.base_url   = {}", config.mcp.base_url);
    println!("  memory.backend = {}\n", config.memory.backend);

    // ── Tool server ──
    let gateway = HttpToolGateway::new(
        config.mcp.base_url.clone(),
        Duration::from_secs(config.mcp.request_timeout_secs),
    );
    match gateway.list_tools().await {
        Ok(tools) => {
            println!("✅ Tool server reachable ({} tools)", tools.len());
            for tool in &tools {
                println!("   - {}", tool.name);
            }
        }
        Err(e) => {
            println!("⚠️  Tool server unreachable: {e}");
            println!("   Chat will run in degraded no-tool mode.");
        }
    }

    // ── Completion backend ──
    let client = pili_providers::from_config(&config.llm);
    match client.health_check().await {
        Ok(true) => println!("✅ Completion backend '{}' reachable", client.name()),
        Ok(false) => println!("❌ Completion backend '{}' returned an error", client.name()),
        Err(e) => println!("❌ Completion backend '{}' unreachable: {e}", client.name()),
    }

    Ok(())
}
