//! Tool registry, validation and dispatch.
//!
//! This module provides:
//! - `ToolRegistry` holding every descriptor together with its adapter
//! - Argument validation against the declared input schema
//! - The `Dispatcher` that settles every call into a result envelope
//! - Data-driven operations (`OperationSpec`) so catalogues are tables,
//!   not hand-written functions
//!
//! # Tool Lifecycle
//!
//! 1. A `tools/call` arrives and is handed to the dispatcher
//! 2. The name is resolved in the registry
//! 3. Arguments are validated; no network I/O happens before this passes
//! 4. The adapter runs against the shared API client
//! 5. Success or failure is wrapped into the envelope
//!
//! # Adding New Tools
//!
//! 1. Describe the tool as an `OperationSpec` in its backend catalogue
//! 2. If it needs more than one request, implement `OperationAdapter` instead
//!    and `register` it next to the specs

pub use dispatch::{DispatchState, Dispatched, Dispatcher};
pub use operation::{FieldMapping, OperationSpec, ResponseShape};
pub use registry::{RegistryError, ToolRegistry};
pub use schema::ObjectSchema;
pub use types::{OperationAdapter, ToolCallInput, ToolError};
pub use validation::{validate_arguments, ValidationError};

pub mod dispatch;
pub mod operation;
pub mod registry;
pub mod schema;
pub mod types;
pub mod validation;
