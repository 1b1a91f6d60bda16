//! Dispatch core: turns a tool call into a result envelope.
//!
//! Per call: look the name up, validate the arguments against the declared
//! schema, invoke the adapter with the shared client, and settle. Every
//! failure, including an adapter panic, is settled into an error envelope; no
//! error leaves this module.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, warn};

use crate::api::ApiClient;
use crate::core::tool::ToolDescriptor;
use crate::mcp::types::CallToolResult;
use crate::tools::registry::ToolRegistry;
use crate::tools::types::{ToolCallInput, ToolError};
use crate::tools::validation::validate_arguments;

/// Terminal state of one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Ok,
    UnknownTool,
    InvalidArguments,
    Failed,
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchState::Ok => write!(f, "ok"),
            DispatchState::UnknownTool => write!(f, "unknown_tool"),
            DispatchState::InvalidArguments => write!(f, "invalid_arguments"),
            DispatchState::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dispatched {
    pub state: DispatchState,
    pub result: CallToolResult,
}

impl Dispatched {
    fn settle(state: DispatchState, result: CallToolResult) -> Self {
        Self { state, result }
    }

    fn failure(state: DispatchState, err: &ToolError) -> Self {
        Self::settle(state, CallToolResult::error(err))
    }
}

/// Shared, cheaply clonable entry point; one per server process.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    client: Arc<dyn ApiClient>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ToolRegistry>, client: Arc<dyn ApiClient>) -> Self {
        Self { registry, client }
    }

    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.registry.list()
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub async fn call_tool(&self, call: ToolCallInput) -> CallToolResult {
        self.dispatch(call).await.result
    }

    pub async fn dispatch(&self, call: ToolCallInput) -> Dispatched {
        let Some(tool) = self.registry.get(&call.name) else {
            warn!(tool = %call.name, "call for unknown tool");
            return Dispatched::failure(
                DispatchState::UnknownTool,
                &ToolError::UnknownTool(call.name),
            );
        };

        if let Err(err) = validate_arguments(&tool.descriptor, &call.args) {
            debug!(tool = %call.name, field = err.field(), "rejected arguments");
            return Dispatched::failure(DispatchState::InvalidArguments, &err.into());
        }

        let invocation = tool.adapter.invoke(&call.args, self.client.as_ref());
        let outcome = match AssertUnwindSafe(invocation).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => Err(ToolError::Execution(format!(
                "adapter panicked: {}",
                panic_message(panic.as_ref())
            ))),
        };

        match outcome {
            Ok(result) if result.is_error() => {
                warn!(tool = %call.name, "tool reported an error");
                Dispatched::settle(DispatchState::Failed, non_empty(result, &call.name))
            }
            Ok(result) => {
                debug!(tool = %call.name, "tool call succeeded");
                Dispatched::settle(DispatchState::Ok, non_empty(result, &call.name))
            }
            Err(err @ ToolError::InvalidArguments(_)) => {
                debug!(tool = %call.name, error = %err, "adapter rejected arguments");
                Dispatched::failure(DispatchState::InvalidArguments, &err)
            }
            Err(err) => {
                warn!(tool = %call.name, error = %err, "tool call failed");
                Dispatched::failure(DispatchState::Failed, &err)
            }
        }
    }
}

/// Adapters are expected to produce content; an empty list still has to reach
/// the caller as a readable entry, with its error flag intact.
fn non_empty(result: CallToolResult, name: &str) -> CallToolResult {
    match (result.content.is_empty(), result.is_error()) {
        (false, _) => result,
        (true, false) => CallToolResult::text(format!("{name} completed successfully.")),
        (true, true) => CallToolResult::error(format!("{name} failed without details")),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
