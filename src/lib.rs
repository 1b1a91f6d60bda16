//! Toolbridge: an MCP tool server in front of third-party REST/GraphQL APIs.
//!
//! The process speaks JSON-RPC over stdio, advertises a fixed catalogue of
//! tools and turns each `tools/call` into one or more authenticated requests
//! against the configured backend.
//!
//! # Architecture
//!
//! - `config`: start-up configuration (backend, credential, tenant)
//! - `api`: authenticated HTTP/GraphQL client and its error type
//! - `tools`: registry, argument validation, dispatch and data-driven operations
//! - `backends`: per-backend profiles and tool catalogues
//! - `mcp`: protocol types, line framing and the server loop
//! - `core`: shared types

pub mod api;
pub mod backends;
pub mod config;
pub mod core;
pub mod mcp;
pub mod tools;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use api::{ApiError, HttpApiClient};
use config::{ConfigError, ServerConfig};
use mcp::types::Implementation;
use mcp::{McpServer, TransportError};
use tools::{Dispatcher, RegistryError};

// ---------------------------------------------------------------------------
// Shared error type
// ---------------------------------------------------------------------------

/// Start-up and serving failures. Tool failures never end up here; they are
/// settled into result envelopes by the dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("tool registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("API client error: {0}")]
    Api(#[from] ApiError),
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

// ---------------------------------------------------------------------------
// Application entry point
// ---------------------------------------------------------------------------

/// Default filter when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "toolbridge=info,warn";

/// Logs go to stderr; stdout carries the protocol.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER));
    // A subscriber may already be installed (tests, embedding); keep it.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}

/// Builds the dispatcher for `config` without touching the network.
pub fn build_dispatcher(config: &ServerConfig) -> Result<Dispatcher, AppError> {
    let registry = config.backend.registry()?;
    let profile = config.backend.profile(config);
    let client = HttpApiClient::new(profile, config.credential.clone(), config.request_timeout)?;
    Ok(Dispatcher::new(Arc::new(registry), Arc::new(client)))
}

pub fn server_info() -> Implementation {
    Implementation::new(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

/// Runs the server on stdin/stdout until the client closes its end.
///
/// `args` are the positional command-line arguments, program name excluded.
pub async fn run(args: Vec<String>) -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ServerConfig::from_env(&args)?;
    tracing::info!(
        backend = %config.backend,
        tenant = config.tenant.as_deref().unwrap_or("-"),
        "starting tool server"
    );

    let dispatcher = build_dispatcher(&config)?;
    let server = McpServer::new(dispatcher, server_info());
    server.serve(tokio::io::stdin(), tokio::io::stdout()).await?;
    Ok(())
}
