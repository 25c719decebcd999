//! Tool layer for Pili.
//!
//! - [`HttpToolGateway`] — RPC client for the external MCP tool server
//! - [`BoundToolSet`] — per-user binding of gateway + in-process tools,
//!   with user-id injection and per-agent spec assembly
//! - [`QuickResponseTool`] — in-process return-direct tool for chit-chat

pub mod binding;
pub mod gateway;
pub mod quick_response;

pub use binding::BoundToolSet;
pub use gateway::HttpToolGateway;
pub use quick_response::QuickResponseTool;
