//! Shared types and traits for the tool system.
//!
//! This module defines the core abstractions for tools:
//! - Tool call input type
//! - `OperationAdapter` trait implemented by every tool body
//! - Error types for tool execution

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::api::{ApiClient, ApiError};
use crate::mcp::types::CallToolResult;
use crate::tools::validation::ValidationError;

/// Input to a tool invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolCallInput {
    pub name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl ToolCallInput {
    pub fn new(name: impl Into<String>, args: Value) -> Self {
        let args = match args {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            name: name.into(),
            args,
        }
    }
}

/// Errors that can occur during tool execution.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("invalid arguments: {0}")]
    InvalidArguments(#[from] ValidationError),
    #[error("{0}")]
    Api(#[from] ApiError),
    #[error("execution failed: {0}")]
    Execution(String),
}

/// The body of one tool: turns validated arguments into backend calls and a
/// result payload.
///
/// Implementations are registered once at start-up and shared across
/// concurrently running calls, so they must be `Send + Sync`.
#[async_trait]
pub trait OperationAdapter: Send + Sync {
    async fn invoke(
        &self,
        args: &Map<String, Value>,
        client: &dyn ApiClient,
    ) -> Result<CallToolResult, ToolError>;
}

/// Reads a required string argument.
pub fn arg_str<'a>(args: &'a Map<String, Value>, name: &str) -> Result<&'a str, ToolError> {
    args.get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| ValidationError::MissingField(name.to_string()).into())
}

/// Reads an optional string argument; `null` counts as absent.
pub fn opt_str<'a>(args: &'a Map<String, Value>, name: &str) -> Option<&'a str> {
    args.get(name).and_then(Value::as_str)
}
